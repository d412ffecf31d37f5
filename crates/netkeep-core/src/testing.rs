//! Test doubles for the radio and clock.
//!
//! `ScriptedRadio` replays scan results and joins networks after a chosen
//! number of status polls. `ManualClock` advances only when slept on, so
//! connect timeouts run instantly.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::clock::Clock;
use crate::radio::{strongest_signal, LinkStatus, Radio, RadioError, ScanResult};

/// How a scripted network responds to a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// Link comes up on the status poll after `n` unsuccessful polls.
    AfterPolls(u32),
    /// Link never comes up.
    Never,
    /// `configure_and_connect` itself fails.
    Reject,
}

/// Radio whose behaviour is fixed up front.
#[derive(Debug, Default)]
pub struct ScriptedRadio {
    visible: Vec<ScanResult>,
    queued_scans: VecDeque<Result<Vec<ScanResult>, RadioError>>,
    joins: HashMap<String, Join>,
    target: Option<(String, Join)>,
    polls: Cell<u32>,
    connected: Cell<bool>,
    events: Vec<String>,
}

impl ScriptedRadio {
    /// Radio that sees `visible` on every scan and never joins anything.
    pub fn new(visible: Vec<ScanResult>) -> Self {
        Self {
            visible,
            ..Default::default()
        }
    }

    /// Script how `ssid` behaves when attempted.
    pub fn join(mut self, ssid: &str, join: Join) -> Self {
        self.joins.insert(ssid.to_string(), join);
        self
    }

    /// Make the next scan fail.
    pub fn fail_next_scan(mut self, reason: &str) -> Self {
        self.queued_scans
            .push_back(Err(RadioError::Scan(reason.to_string())));
        self
    }

    /// Return `results` from the next scan instead of the visible set.
    pub fn queue_scan(mut self, results: Vec<ScanResult>) -> Self {
        self.queued_scans.push_back(Ok(results));
        self
    }

    /// Replace what later scans see.
    pub fn set_visible(&mut self, visible: Vec<ScanResult>) {
        self.visible = visible;
    }

    /// Log of driver calls: `scan`, `disconnect`, `connect:<ssid>`.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// SSIDs passed to `configure_and_connect`, in order.
    pub fn attempted(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| e.strip_prefix("connect:").map(str::to_string))
            .collect()
    }

    pub fn scan_count(&self) -> usize {
        self.events.iter().filter(|e| *e == "scan").count()
    }
}

impl Radio for ScriptedRadio {
    fn scan(&mut self, _include_hidden: bool) -> Result<Vec<ScanResult>, RadioError> {
        self.events.push("scan".to_string());
        self.queued_scans
            .pop_front()
            .unwrap_or_else(|| Ok(self.visible.clone()))
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.events.push("disconnect".to_string());
        self.target = None;
        self.connected.set(false);
        Ok(())
    }

    fn configure_and_connect(&mut self, ssid: &str, _password: &str) -> Result<(), RadioError> {
        self.events.push(format!("connect:{}", ssid));
        let join = self.joins.get(ssid).copied().unwrap_or(Join::Never);
        if join == Join::Reject {
            return Err(RadioError::Configuration(format!("'{}' rejected", ssid)));
        }
        self.target = Some((ssid.to_string(), join));
        self.polls.set(0);
        self.connected.set(false);
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        if let Some((_, Join::AfterPolls(n))) = &self.target {
            let seen = self.polls.get();
            self.polls.set(seen + 1);
            if seen >= *n {
                self.connected.set(true);
            }
        }
        if self.connected.get() {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }

    fn current_ssid(&self) -> Option<String> {
        if !self.connected.get() {
            return None;
        }
        self.target.as_ref().map(|(ssid, _)| ssid.clone())
    }

    fn current_signal_strength(&self) -> Option<i8> {
        let ssid = self.current_ssid()?;
        strongest_signal(&self.visible, &ssid)
    }
}

/// Clock that only moves when slept on.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
