//! Known-network credential store.
//!
//! Credentials live in a fixed table of [`MAX_NETWORKS`] slots addressed by a
//! stable 1-based index. Deleting a slot leaves a hole; slots never move.
//!
//! # Durable encoding
//!
//! The table is stored as one blob of concatenated records in slot order:
//!
//! ```text
//! empty slot:  [0]
//! filled slot: [ssid_len (1..=31)] [ssid bytes] [pass_len (0..=63)] [pass bytes]
//! ```
//!
//! The blob never exceeds [`MAX_BLOB_SIZE`] bytes. A truncated or malformed
//! record stops decoding; slots decoded before it are kept.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::persistence::{Persistence, StoreError};

/// Number of slots in the credential table.
pub const MAX_NETWORKS: usize = 10;

/// Longest SSID accepted by [`CredentialStore::add_or_update`].
pub const SSID_MAX_LEN: usize = 32;

/// Longest SSID the encoding can represent.
pub const ENCODED_SSID_MAX_LEN: usize = 31;

/// Longest password accepted and encoded.
pub const PASSWORD_MAX_LEN: usize = 63;

/// Upper bound on the encoded blob.
pub const MAX_BLOB_SIZE: usize = 1024;

/// Errors returned by credential mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// SSID or password length out of bounds.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every slot is filled.
    #[error("No free slots")]
    NoFreeSlots,

    /// Slot index outside `1..=MAX_NETWORKS`.
    #[error("Slot {0} out of range")]
    OutOfRange(usize),

    /// The table changed in memory but could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One known network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: String,
    pub password: String,
}

impl Credential {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
        }
    }
}

/// Fixed-size slot table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialTable {
    slots: [Option<Credential>; MAX_NETWORKS],
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credential in 1-based `slot`, if filled.
    pub fn get(&self, slot: usize) -> Option<&Credential> {
        slot.checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    /// Filled slots in slot order, with their 1-based index.
    pub fn filled(&self) -> impl Iterator<Item = (usize, &Credential)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (i + 1, c)))
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// 1-based slot holding `ssid`.
    pub fn find_ssid(&self, ssid: &str) -> Option<usize> {
        self.filled().find(|(_, c)| c.ssid == ssid).map(|(slot, _)| slot)
    }

    fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none).map(|i| i + 1)
    }

    fn slot_mut(&mut self, slot: usize) -> &mut Option<Credential> {
        &mut self.slots[slot - 1]
    }

    /// Place `credential` in 1-based `slot`, replacing any previous entry.
    ///
    /// Panics if `slot` is outside `1..=MAX_NETWORKS`.
    pub fn insert(&mut self, slot: usize, credential: Credential) {
        *self.slot_mut(slot) = Some(credential);
    }
}

/// Listing entry for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot: usize,
    pub filled: bool,
    pub ssid: String,
}

/// Result of a successful add or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotOutcome {
    pub slot: usize,
    /// The SSID already existed and only its password changed.
    pub updated: bool,
}

/// Result of a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub slot: usize,
    /// False when the slot was already empty.
    pub removed: bool,
    /// The removed network was the one in active use.
    pub was_active: bool,
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn clamp_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Encode the whole table, clamping fields to the encodable range.
pub fn encode_table(table: &CredentialTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_BLOB_SIZE);

    for (i, slot) in table.slots.iter().enumerate() {
        let (ssid, password) = match slot {
            Some(c) if !c.ssid.is_empty() => (
                clamp_str(&c.ssid, ENCODED_SSID_MAX_LEN),
                clamp_str(&c.password, PASSWORD_MAX_LEN),
            ),
            _ => ("", ""),
        };

        let record_len = if ssid.is_empty() {
            1
        } else {
            2 + ssid.len() + password.len()
        };
        if out.len() + record_len > MAX_BLOB_SIZE {
            warn!("Credential blob full, dropping slots from {}", i + 1);
            break;
        }

        out.push(ssid.len() as u8);
        if !ssid.is_empty() {
            out.extend_from_slice(ssid.as_bytes());
            out.push(password.len() as u8);
            out.extend_from_slice(password.as_bytes());
        }
    }

    out
}

enum Record {
    Empty,
    Filled(Credential),
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn text(&mut self, len: usize) -> Option<String> {
        let raw = self.take(len)?;
        std::str::from_utf8(raw).ok().map(str::to_string)
    }

    fn record(&mut self) -> Option<Record> {
        let ssid_len = self.byte()? as usize;
        if ssid_len == 0 {
            return Some(Record::Empty);
        }
        if ssid_len > ENCODED_SSID_MAX_LEN {
            return None;
        }
        let ssid = self.text(ssid_len)?;
        let pass_len = self.byte()? as usize;
        if pass_len > PASSWORD_MAX_LEN {
            return None;
        }
        let password = self.text(pass_len)?;
        Some(Record::Filled(Credential { ssid, password }))
    }
}

/// Decode a blob into a table.
///
/// Decoding stops at the first truncated or malformed record and keeps every
/// slot decoded before it. Records beyond [`MAX_NETWORKS`] are ignored.
pub fn decode_table(bytes: &[u8]) -> CredentialTable {
    let mut table = CredentialTable::new();
    let mut reader = Reader { bytes, pos: 0 };

    for (i, slot) in table.slots.iter_mut().enumerate() {
        if reader.pos >= bytes.len() {
            break;
        }
        match reader.record() {
            Some(Record::Empty) => {}
            Some(Record::Filled(credential)) => *slot = Some(credential),
            None => {
                warn!(
                    "Malformed credential record in slot {} at byte {}, keeping earlier slots",
                    i + 1,
                    reader.pos
                );
                break;
            }
        }
    }

    table
}

/// Durable credential table backed by a key-value store.
///
/// The store is the only writer of the credential blob. Every mutation is
/// persisted before it returns.
pub struct CredentialStore<P> {
    persistence: P,
    config: StoreConfig,
    table: CredentialTable,
}

impl<P: Persistence> CredentialStore<P> {
    /// Create a store with an empty in-memory table. Call [`load`](Self::load)
    /// to read the persisted state.
    pub fn new(persistence: P, config: StoreConfig) -> Self {
        Self {
            persistence,
            config,
            table: CredentialTable::new(),
        }
    }

    /// Ensure the blob key exists, writing an all-empty table if it does not.
    ///
    /// Existing data is never touched.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let mut session = self.persistence.begin(&self.config.namespace, false)?;
        if session.get_length(&self.config.key)?.is_some() {
            return Ok(());
        }

        let blob = encode_table(&CredentialTable::new());
        let written = session.put_bytes(&self.config.key, &blob)?;
        if written != blob.len() {
            return Err(StoreError::ShortWrite {
                written,
                expected: blob.len(),
            });
        }
        debug!("Initialized empty credential blob");
        Ok(())
    }

    fn read_blob(&self) -> Result<Vec<u8>, StoreError> {
        let session = self.persistence.begin(&self.config.namespace, true)?;
        let Some(len) = session.get_length(&self.config.key)? else {
            return Ok(Vec::new());
        };

        let mut buf = vec![0u8; len.min(MAX_BLOB_SIZE)];
        let n = session.get_bytes(&self.config.key, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Replace the in-memory table with the persisted one.
    ///
    /// Read failures yield an empty table so the device can still boot.
    pub fn load(&mut self) -> &CredentialTable {
        self.table = match self.read_blob() {
            Ok(blob) => decode_table(&blob),
            Err(e) => {
                warn!("Credential store unreadable, starting empty: {}", e);
                CredentialTable::new()
            }
        };
        info!("Loaded {} saved networks", self.table.filled_count());
        &self.table
    }

    /// Write the whole in-memory table.
    pub fn save(&self) -> Result<(), StoreError> {
        let blob = encode_table(&self.table);
        let mut session = self.persistence.begin(&self.config.namespace, false)?;
        let written = session.put_bytes(&self.config.key, &blob)?;
        if written != blob.len() {
            return Err(StoreError::ShortWrite {
                written,
                expected: blob.len(),
            });
        }
        debug!("Saved credential blob ({} bytes)", blob.len());
        Ok(())
    }

    /// Add a network, or change the password of an existing one.
    ///
    /// An existing SSID keeps its slot. A new SSID takes the lowest empty slot.
    /// If persisting fails the in-memory change is kept and the error returned.
    pub fn add_or_update(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> Result<SlotOutcome, CredentialError> {
        if ssid.is_empty() || ssid.len() > SSID_MAX_LEN {
            return Err(CredentialError::InvalidInput(format!(
                "ssid must be 1-{} bytes, got {}",
                SSID_MAX_LEN,
                ssid.len()
            )));
        }
        if password.len() > PASSWORD_MAX_LEN {
            return Err(CredentialError::InvalidInput(format!(
                "password must be at most {} bytes, got {}",
                PASSWORD_MAX_LEN,
                password.len()
            )));
        }

        if ssid.len() > ENCODED_SSID_MAX_LEN {
            warn!(
                "SSID '{}' is {} bytes; only the first {} are persisted and will match after a reload",
                ssid,
                ssid.len(),
                ENCODED_SSID_MAX_LEN
            );
        }

        let outcome = if let Some(slot) = self.table.find_ssid(ssid) {
            if let Some(existing) = self.table.slot_mut(slot) {
                existing.password = password.to_string();
            }
            SlotOutcome {
                slot,
                updated: true,
            }
        } else {
            let slot = self
                .table
                .first_empty()
                .ok_or(CredentialError::NoFreeSlots)?;
            self.table.insert(slot, Credential::new(ssid, password));
            SlotOutcome {
                slot,
                updated: false,
            }
        };

        self.save()?;
        info!(
            "{} '{}' in slot {}",
            if outcome.updated { "Updated" } else { "Added" },
            ssid,
            outcome.slot
        );
        Ok(outcome)
    }

    /// Clear 1-based `slot`.
    ///
    /// `active_ssid` is the SSID the radio is currently associated with; it
    /// only feeds the `was_active` flag. Clearing an empty slot writes nothing.
    pub fn delete(
        &mut self,
        slot: usize,
        active_ssid: Option<&str>,
    ) -> Result<DeleteOutcome, CredentialError> {
        if slot == 0 || slot > MAX_NETWORKS {
            return Err(CredentialError::OutOfRange(slot));
        }

        let Some(removed) = self.table.slot_mut(slot).take() else {
            return Ok(DeleteOutcome {
                slot,
                removed: false,
                was_active: false,
            });
        };

        let was_active = active_ssid == Some(removed.ssid.as_str());
        self.save()?;
        info!("Deleted '{}' from slot {}", removed.ssid, slot);

        Ok(DeleteOutcome {
            slot,
            removed: true,
            was_active,
        })
    }

    /// Snapshot of every slot in order.
    pub fn list(&self) -> Vec<SlotInfo> {
        self.table
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| SlotInfo {
                slot: i + 1,
                filled: slot.is_some(),
                ssid: slot.as_ref().map(|c| c.ssid.clone()).unwrap_or_default(),
            })
            .collect()
    }

    pub fn table(&self) -> &CredentialTable {
        &self.table
    }
}
