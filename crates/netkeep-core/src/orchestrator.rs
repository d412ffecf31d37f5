//! Connection orchestrator.
//!
//! One connection cycle walks this state machine:
//!
//! ```text
//! Idle → Scanning → Ranking → Attempting(i) → Connected
//!                                           → Attempting(i + 1)
//!                                           → Exhausted → (fallback) Scanning …
//! ```
//!
//! The saved credentials are tried first. Only when that pass is exhausted is
//! a second, complete pass run against the compiled-in fallback list. Each
//! pass rescans, so the fallback ranking reflects current signal strengths.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{FallbackNetwork, OrchestratorConfig};
use crate::credentials::CredentialTable;
use crate::radio::{LinkStatus, Radio, ScanResult};

/// Which credential list produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Saved,
    Fallback,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Saved => write!(f, "saved"),
            CredentialSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// A credential the device may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownNetwork<'a> {
    /// 1-based slot for saved networks, 0-based position for fallbacks.
    pub index: usize,
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Saved networks in slot order.
pub fn saved_networks(table: &CredentialTable) -> Vec<KnownNetwork<'_>> {
    table
        .filled()
        .map(|(slot, c)| KnownNetwork {
            index: slot,
            ssid: &c.ssid,
            password: &c.password,
        })
        .collect()
}

/// Fallback networks in list order.
pub fn fallback_networks(list: &[FallbackNetwork]) -> Vec<KnownNetwork<'_>> {
    list.iter()
        .enumerate()
        .map(|(i, n)| KnownNetwork {
            index: i,
            ssid: n.ssid,
            password: n.password,
        })
        .collect()
}

/// A known network seen in the current scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub index: usize,
    pub rssi: i8,
    pub ssid: String,
}

/// Intersect `scan` with `known` and order by signal strength.
///
/// The sort is stable, so equal signal strengths keep scan order. Access
/// points sharing an SSID collapse into one candidate at the first-seen
/// position with the strongest reading. At most `max` candidates are kept,
/// taken in scan order.
pub fn rank_candidates(
    scan: &[ScanResult],
    known: &[KnownNetwork<'_>],
    max: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for ap in scan {
        let Some(network) = known.iter().find(|k| k.ssid == ap.ssid) else {
            continue;
        };
        if let Some(existing) = candidates.iter_mut().find(|c| c.ssid == ap.ssid) {
            existing.rssi = existing.rssi.max(ap.rssi);
            continue;
        }
        if candidates.len() >= max {
            debug!("Candidate list full, skipping '{}'", ap.ssid);
            continue;
        }
        debug!("  known: '{}' rssi={}", ap.ssid, ap.rssi);
        candidates.push(Candidate {
            index: network.index,
            rssi: ap.rssi,
            ssid: ap.ssid.clone(),
        });
    }

    candidates.sort_by(|a, b| b.rssi.cmp(&a.rssi));
    candidates
}

/// How a single pass ended without connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum PassResult {
    /// No known network was visible.
    NoCandidates,
    /// Every candidate timed out or was rejected.
    Exhausted { tried: usize },
}

/// A successful cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectOutcome {
    pub source: CredentialSource,
    pub ssid: String,
    /// Connection attempts made across both passes, including the winner.
    pub attempts: usize,
}

/// A failed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The radio could not scan; no attempts were made in that pass.
    #[error("Scan failed during {pass} pass: {reason}")]
    ScanFailed {
        pass: CredentialSource,
        reason: String,
        attempts: usize,
    },

    /// Both passes ended without a connection.
    #[error("No network joined after {attempts} attempts")]
    ConnectFailed {
        attempts: usize,
        saved: PassResult,
        fallback: PassResult,
    },
}

impl ConnectError {
    pub fn attempts(&self) -> usize {
        match self {
            ConnectError::ScanFailed { attempts, .. } => *attempts,
            ConnectError::ConnectFailed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug)]
enum CycleState {
    Idle,
    Scanning {
        source: CredentialSource,
    },
    Ranking {
        source: CredentialSource,
        scan: Vec<ScanResult>,
    },
    Attempting {
        source: CredentialSource,
        candidates: Vec<Candidate>,
        index: usize,
    },
    Exhausted {
        source: CredentialSource,
        result: PassResult,
    },
    Connected {
        source: CredentialSource,
        ssid: String,
    },
    Failed(ConnectError),
}

struct Cycle<'a> {
    saved: Vec<KnownNetwork<'a>>,
    fallback: Vec<KnownNetwork<'a>>,
    timeout: Duration,
    attempts: usize,
    saved_result: Option<PassResult>,
}

impl<'a> Cycle<'a> {
    fn known(&self, source: CredentialSource) -> &[KnownNetwork<'a>] {
        match source {
            CredentialSource::Saved => &self.saved,
            CredentialSource::Fallback => &self.fallback,
        }
    }
}

/// Drives the radio through connection cycles.
///
/// The orchestrator owns the radio; callers serialize cycles by holding the
/// orchestrator exclusively.
pub struct Orchestrator<R, C> {
    radio: R,
    clock: C,
    config: OrchestratorConfig,
}

impl<R: Radio, C: Clock> Orchestrator<R, C> {
    pub fn new(radio: R, clock: C, config: OrchestratorConfig) -> Self {
        Self {
            radio,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Run one cycle: the saved pass, then the fallback pass if needed.
    ///
    /// Per-attempt timeouts only advance to the next candidate. The cycle
    /// fails on a scan error or when both passes are exhausted.
    pub fn connect_preferring_saved(
        &mut self,
        saved: &CredentialTable,
        fallback: &[FallbackNetwork],
        timeout_per_attempt: Duration,
    ) -> Result<ConnectOutcome, ConnectError> {
        let mut cycle = Cycle {
            saved: saved_networks(saved),
            fallback: fallback_networks(fallback),
            timeout: timeout_per_attempt,
            attempts: 0,
            saved_result: None,
        };

        let mut state = CycleState::Idle;
        loop {
            state = match self.step(&mut cycle, state) {
                CycleState::Connected { source, ssid } => {
                    return Ok(ConnectOutcome {
                        source,
                        ssid,
                        attempts: cycle.attempts,
                    });
                }
                CycleState::Failed(e) => return Err(e),
                next => next,
            };
        }
    }

    fn step(&mut self, cycle: &mut Cycle<'_>, state: CycleState) -> CycleState {
        match state {
            CycleState::Idle => CycleState::Scanning {
                source: CredentialSource::Saved,
            },

            CycleState::Scanning { source } => match self.scan() {
                Ok(scan) => CycleState::Ranking { source, scan },
                Err(reason) => {
                    warn!("Scan failed: {}", reason);
                    CycleState::Failed(ConnectError::ScanFailed {
                        pass: source,
                        reason,
                        attempts: cycle.attempts,
                    })
                }
            },

            CycleState::Ranking { source, scan } => {
                let candidates =
                    rank_candidates(&scan, cycle.known(source), self.config.max_candidates);
                if candidates.is_empty() {
                    info!("No known {} networks found", source);
                    CycleState::Exhausted {
                        source,
                        result: PassResult::NoCandidates,
                    }
                } else {
                    CycleState::Attempting {
                        source,
                        candidates,
                        index: 0,
                    }
                }
            }

            CycleState::Attempting {
                source,
                candidates,
                index,
            } => {
                let candidate = &candidates[index];
                let password = cycle
                    .known(source)
                    .iter()
                    .find(|k| k.index == candidate.index)
                    .map(|k| k.password)
                    .unwrap_or_default();

                info!("Trying: '{}' (rssi={})", candidate.ssid, candidate.rssi);
                cycle.attempts += 1;
                if self.attempt(&candidate.ssid, password, cycle.timeout) {
                    let ssid = candidate.ssid.clone();
                    CycleState::Connected { source, ssid }
                } else if index + 1 < candidates.len() {
                    CycleState::Attempting {
                        source,
                        candidates,
                        index: index + 1,
                    }
                } else {
                    info!("Tried all known {} networks, none connected", source);
                    CycleState::Exhausted {
                        source,
                        result: PassResult::Exhausted {
                            tried: candidates.len(),
                        },
                    }
                }
            }

            CycleState::Exhausted {
                source: CredentialSource::Saved,
                result,
            } => {
                cycle.saved_result = Some(result);
                info!("Saved networks exhausted, trying fallback list");
                CycleState::Scanning {
                    source: CredentialSource::Fallback,
                }
            }

            CycleState::Exhausted {
                source: CredentialSource::Fallback,
                result,
            } => CycleState::Failed(ConnectError::ConnectFailed {
                attempts: cycle.attempts,
                saved: cycle.saved_result.unwrap_or(PassResult::NoCandidates),
                fallback: result,
            }),

            terminal @ (CycleState::Connected { .. } | CycleState::Failed(_)) => terminal,
        }
    }

    fn scan(&mut self) -> Result<Vec<ScanResult>, String> {
        if let Err(e) = self.radio.disconnect() {
            debug!("Disconnect before scan failed: {}", e);
        }
        self.clock.sleep(self.config.scan_settle());

        info!("Scanning WiFi...");
        let results = self
            .radio
            .scan(self.config.include_hidden)
            .map_err(|e| e.to_string())?;
        info!("Scan done: {} networks", results.len());
        Ok(results)
    }

    /// Connect to one network, polling until linked or `timeout` elapses.
    fn attempt(&mut self, ssid: &str, password: &str, timeout: Duration) -> bool {
        if let Err(e) = self.radio.disconnect() {
            debug!("Disconnect before connect failed: {}", e);
        }
        self.clock.sleep(self.config.connect_settle());

        if let Err(e) = self.radio.configure_and_connect(ssid, password) {
            warn!("Failed to start connection to '{}': {}", ssid, e);
            return false;
        }

        let start = self.clock.now();
        loop {
            if self.radio.status() == LinkStatus::Connected {
                info!(
                    "WiFi connected. SSID='{}' RSSI={}",
                    ssid,
                    self.radio
                        .current_signal_strength()
                        .map_or_else(|| "?".to_string(), |r| r.to_string())
                );
                return true;
            }
            if self.clock.now().saturating_sub(start) >= timeout {
                warn!("Failed to connect to '{}' within {:?}", ssid, timeout);
                return false;
            }
            self.clock.sleep(self.config.poll_interval());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;
    use crate::testing::{Join, ManualClock, ScriptedRadio};
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_millis(15_000);

    fn orchestrator(radio: ScriptedRadio) -> Orchestrator<ScriptedRadio, ManualClock> {
        Orchestrator::new(radio, ManualClock::new(), OrchestratorConfig::default())
    }

    fn table(entries: &[(usize, &str, &str)]) -> CredentialTable {
        let mut table = CredentialTable::new();
        for (slot, ssid, password) in entries {
            table.insert(*slot, Credential::new(ssid, password));
        }
        table
    }

    fn known<'a>(ssids: &[&'a str]) -> Vec<KnownNetwork<'a>> {
        ssids
            .iter()
            .enumerate()
            .map(|(i, ssid)| KnownNetwork {
                index: i + 1,
                ssid: *ssid,
                password: "",
            })
            .collect()
    }

    #[test]
    fn test_rank_by_signal_with_stable_ties() {
        let scan = vec![
            ScanResult::new("A", -70),
            ScanResult::new("B", -40),
            ScanResult::new("C", -40),
        ];
        let ranked = rank_candidates(&scan, &known(&["C", "B"]), 16);
        let order: Vec<&str> = ranked.iter().map(|c| c.ssid.as_str()).collect();
        assert_eq!(order, vec!["B", "C"]);

        // Same input, same output
        assert_eq!(rank_candidates(&scan, &known(&["C", "B"]), 16), ranked);
    }

    #[test]
    fn test_rank_keeps_source_index() {
        let scan = vec![ScanResult::new("Office", -30), ScanResult::new("Home", -60)];
        let ranked = rank_candidates(&scan, &known(&["Home", "Office"]), 16);
        assert_eq!(
            ranked,
            vec![
                Candidate {
                    index: 2,
                    rssi: -30,
                    ssid: "Office".to_string()
                },
                Candidate {
                    index: 1,
                    rssi: -60,
                    ssid: "Home".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_rank_collapses_duplicate_ssids() {
        let scan = vec![
            ScanResult::new("Mesh", -80),
            ScanResult::new("Other", -60),
            ScanResult::new("Mesh", -50),
        ];
        let ranked = rank_candidates(&scan, &known(&["Mesh", "Other"]), 16);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].ssid, "Mesh");
        assert_eq!(ranked[0].rssi, -50);
    }

    #[test]
    fn test_rank_caps_in_scan_order() {
        let scan = vec![
            ScanResult::new("a", -90),
            ScanResult::new("b", -80),
            ScanResult::new("c", -10),
        ];
        let ranked = rank_candidates(&scan, &known(&["a", "b", "c"]), 2);
        let order: Vec<&str> = ranked.iter().map(|c| c.ssid.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_saved_success_skips_fallback() {
        let radio = ScriptedRadio::new(vec![
            ScanResult::new("HomeNet", -55),
            ScanResult::new("Office", -30),
        ])
        .join("HomeNet", Join::AfterPolls(3))
        .join("Office", Join::AfterPolls(0));
        let mut orch = orchestrator(radio);

        let outcome = orch
            .connect_preferring_saved(
                &table(&[(1, "HomeNet", "secret1")]),
                &[FallbackNetwork::new("Office", "fb-pass")],
                TIMEOUT,
            )
            .unwrap();

        assert_eq!(
            outcome,
            ConnectOutcome {
                source: CredentialSource::Saved,
                ssid: "HomeNet".to_string(),
                attempts: 1,
            }
        );
        assert_eq!(orch.radio().attempted(), vec!["HomeNet"]);
        assert_eq!(orch.radio().scan_count(), 1);
    }

    #[test]
    fn test_saved_timeout_falls_back() {
        let radio = ScriptedRadio::new(vec![
            ScanResult::new("HomeNet", -55),
            ScanResult::new("Office", -30),
        ])
        .join("HomeNet", Join::Never)
        .join("Office", Join::AfterPolls(2));
        let mut orch = orchestrator(radio);

        let outcome = orch
            .connect_preferring_saved(
                &table(&[(1, "HomeNet", "secret1")]),
                &[FallbackNetwork::new("Office", "fb-pass")],
                TIMEOUT,
            )
            .unwrap();

        assert_eq!(outcome.source, CredentialSource::Fallback);
        assert_eq!(outcome.ssid, "Office");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(orch.radio().attempted(), vec!["HomeNet", "Office"]);
        assert_eq!(orch.radio().scan_count(), 2);
    }

    #[test]
    fn test_no_saved_match_runs_fallback_pass() {
        let radio = ScriptedRadio::new(vec![ScanResult::new("Cafe", -40)])
            .join("Cafe", Join::AfterPolls(0));
        let mut orch = orchestrator(radio);

        let outcome = orch
            .connect_preferring_saved(
                &table(&[(3, "HomeNet", "secret1")]),
                &[FallbackNetwork::new("Cafe", "espresso")],
                TIMEOUT,
            )
            .unwrap();

        assert_eq!(outcome.source, CredentialSource::Fallback);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(orch.radio().scan_count(), 2);
    }

    #[test]
    fn test_tries_candidates_in_rank_order() {
        let radio = ScriptedRadio::new(vec![
            ScanResult::new("Weak", -85),
            ScanResult::new("Strong", -35),
            ScanResult::new("Mid", -60),
        ])
        .join("Weak", Join::AfterPolls(0))
        .join("Strong", Join::Reject)
        .join("Mid", Join::Never);
        let mut orch = orchestrator(radio);

        let outcome = orch
            .connect_preferring_saved(
                &table(&[(1, "Weak", "a"), (2, "Mid", "b"), (3, "Strong", "c")]),
                &[],
                TIMEOUT,
            )
            .unwrap();

        assert_eq!(outcome.ssid, "Weak");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(orch.radio().attempted(), vec!["Strong", "Mid", "Weak"]);
    }

    #[test]
    fn test_both_passes_exhausted() {
        let radio = ScriptedRadio::new(vec![
            ScanResult::new("HomeNet", -55),
            ScanResult::new("Office", -30),
        ]);
        let mut orch = orchestrator(radio);

        let err = orch
            .connect_preferring_saved(
                &table(&[(1, "HomeNet", "secret1")]),
                &[FallbackNetwork::new("Guest", "pw")],
                TIMEOUT,
            )
            .unwrap_err();

        assert_eq!(
            err,
            ConnectError::ConnectFailed {
                attempts: 1,
                saved: PassResult::Exhausted { tried: 1 },
                fallback: PassResult::NoCandidates,
            }
        );
    }

    #[test]
    fn test_scan_failure_aborts_without_attempts() {
        let radio = ScriptedRadio::new(vec![ScanResult::new("HomeNet", -55)])
            .join("HomeNet", Join::AfterPolls(0))
            .fail_next_scan("radio busy");
        let mut orch = orchestrator(radio);

        let err = orch
            .connect_preferring_saved(&table(&[(1, "HomeNet", "secret1")]), &[], TIMEOUT)
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectError::ScanFailed {
                pass: CredentialSource::Saved,
                attempts: 0,
                ..
            }
        ));
        assert!(orch.radio().attempted().is_empty());
        assert_eq!(orch.radio().scan_count(), 1);
    }

    #[test]
    fn test_fallback_scan_failure() {
        let radio = ScriptedRadio::new(vec![ScanResult::new("HomeNet", -55)])
            .queue_scan(vec![ScanResult::new("HomeNet", -55)])
            .fail_next_scan("radio busy");
        let mut orch = orchestrator(radio);

        let err = orch
            .connect_preferring_saved(&table(&[(1, "HomeNet", "secret1")]), &[], TIMEOUT)
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectError::ScanFailed {
                pass: CredentialSource::Fallback,
                attempts: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_attempt_respects_timeout_and_poll_interval() {
        let radio = ScriptedRadio::new(vec![ScanResult::new("Slow", -50)])
            .join("Slow", Join::Never);
        let mut orch = orchestrator(radio);

        let _ = orch.connect_preferring_saved(
            &table(&[(1, "Slow", "pw")]),
            &[],
            Duration::from_millis(1_000),
        );

        // Two scans settle 50 ms each, one attempt settles 100 ms and polls
        // every 250 ms until 1 s has passed.
        assert_eq!(orch.clock.now(), Duration::from_millis(50 + 100 + 1_000 + 50));
    }

    #[test]
    fn test_join_just_inside_timeout() {
        // Polls at 0, 250, 500, 750, 1000 ms; the fifth poll succeeds
        let radio = ScriptedRadio::new(vec![ScanResult::new("Edge", -50)])
            .join("Edge", Join::AfterPolls(4));
        let mut orch = orchestrator(radio);

        let outcome = orch.connect_preferring_saved(
            &table(&[(1, "Edge", "pw")]),
            &[],
            Duration::from_millis(1_000),
        );
        assert!(outcome.is_ok());
    }
}
