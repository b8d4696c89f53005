//! The sequence registry: the durable record of managed accounts, their
//! rotation order, and which one is active.
//!
//! The on-disk schema is additive-only so older and newer tool versions can
//! read each other's documents. `accounts` is keyed by the stringified slot
//! number; `sequence` defines rotation order and always contains exactly
//! the keys of `accounts`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::SwapError;

/// Metadata for one managed account slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRecord {
    pub email: String,
    /// Opaque account identifier captured from the external tool when the
    /// slot was created; passed through unmodified.
    #[serde(default)]
    pub uuid: String,
    /// UTC creation stamp, immutable once set.
    #[serde(default)]
    pub added: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRegistry {
    pub active_account_number: Option<u64>,
    pub last_updated: String,
    pub sequence: Vec<u64>,
    pub accounts: BTreeMap<String, AccountRecord>,
}

impl SequenceRegistry {
    pub fn empty(now: String) -> Self {
        Self {
            active_account_number: None,
            last_updated: now,
            sequence: Vec::new(),
            accounts: BTreeMap::new(),
        }
    }

    /// One more than the highest slot number ever present, or 1 when empty.
    /// Freed numbers are never reused.
    pub fn next_account_number(&self) -> u64 {
        self.accounts
            .keys()
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    pub fn find_by_email(&self, email: &str) -> Option<u64> {
        self.accounts
            .iter()
            .find(|(_, record)| record.email == email)
            .and_then(|(key, _)| key.parse::<u64>().ok())
    }

    pub fn record(&self, slot: u64) -> Option<&AccountRecord> {
        self.accounts.get(&slot.to_string())
    }

    pub fn contains(&self, slot: u64) -> bool {
        self.accounts.contains_key(&slot.to_string())
    }

    pub fn insert_account(&mut self, slot: u64, record: AccountRecord, now: String) {
        self.accounts.insert(slot.to_string(), record);
        self.sequence.push(slot);
        self.active_account_number = Some(slot);
        self.last_updated = now;
    }

    /// Removes the slot from `accounts` and `sequence`. When the removed
    /// slot was active, the active marker is cleared rather than left
    /// dangling, so "active, when set, exists" stays true.
    pub fn remove_account(&mut self, slot: u64, now: String) {
        self.accounts.remove(&slot.to_string());
        self.sequence.retain(|entry| *entry != slot);
        if self.active_account_number == Some(slot) {
            self.active_account_number = None;
        }
        self.last_updated = now;
    }

    /// The slot after the active one in rotation order, cyclically.
    /// `None` when fewer than two accounts are managed. An active slot
    /// missing from `sequence` is treated as position 0.
    pub fn next_in_rotation(&self) -> Option<u64> {
        if self.sequence.len() < 2 {
            return None;
        }
        let current_index = self
            .active_account_number
            .and_then(|active| self.sequence.iter().position(|entry| *entry == active))
            .unwrap_or(0);
        let next_index = (current_index + 1) % self.sequence.len();
        self.sequence.get(next_index).copied()
    }

    /// Resolves a user-supplied identifier to a slot number.
    ///
    /// Purely numeric identifiers are taken as slot numbers without an
    /// existence check (the caller checks that). Anything else must be
    /// email-shaped and is looked up by email.
    pub fn resolve(&self, identifier: &str) -> Result<Option<u64>, SwapError> {
        if !identifier.is_empty() && identifier.bytes().all(|byte| byte.is_ascii_digit()) {
            return Ok(identifier.parse::<u64>().ok());
        }
        if !is_email_shaped(identifier) {
            return Err(SwapError::Validation(identifier.to_string()));
        }
        Ok(self.find_by_email(identifier))
    }

    /// True when `sequence` contains exactly the keys of `accounts` with no
    /// duplicates and the active slot, when set, is present.
    pub fn invariants_hold(&self) -> bool {
        if self.sequence.len() != self.accounts.len() {
            return false;
        }
        let mut seen = std::collections::BTreeSet::new();
        for slot in &self.sequence {
            if !seen.insert(*slot) || !self.contains(*slot) {
                return false;
            }
        }
        match self.active_account_number {
            Some(active) => self.contains(active),
            None => true,
        }
    }
}

/// Basic email-shape check used to validate user-supplied identifiers.
pub fn is_email_shaped(candidate: &str) -> bool {
    static EMAIL_SHAPE: OnceLock<Regex> = OnceLock::new();
    let pattern = EMAIL_SHAPE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .expect("email pattern is a valid regex")
    });
    pattern.is_match(candidate)
}
