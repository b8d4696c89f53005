use thiserror::Error;

/// Failure while talking to the underlying secret storage.
///
/// "Nothing stored" is never an error; reads return an empty string for
/// that case so callers can tell absence apart from I/O failure.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("failed to read {what}: {detail}")]
    Read { what: String, detail: String },
    #[error("failed to write {what}: {detail}")]
    Write { what: String, detail: String },
    #[error("failed to delete {what}: {detail}")]
    Delete { what: String, detail: String },
}

impl VaultError {
    pub(crate) fn read(what: impl Into<String>, detail: impl ToString) -> Self {
        Self::Read {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn write(what: impl Into<String>, detail: impl ToString) -> Self {
        Self::Write {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn delete(what: impl Into<String>, detail: impl ToString) -> Self {
        Self::Delete {
            what: what.into(),
            detail: detail.to_string(),
        }
    }
}

/// Storage seam for the live credential blob and per-slot backups.
///
/// Backup slots are keyed by `(slot, email)`; the key material is part of
/// the stored entry name so no separate index is needed to find a slot.
pub trait SecretStore {
    /// Reads the live credential blob. Empty string when nothing is stored.
    fn read_active(&self) -> Result<String, VaultError>;

    /// Replaces the live credential blob.
    fn write_active(&self, blob: &str) -> Result<(), VaultError>;

    /// Reads the backup blob for `(slot, email)`. Empty string when absent.
    fn read_slot(&self, slot: u64, email: &str) -> Result<String, VaultError>;

    /// Stores the backup blob for `(slot, email)`, replacing any previous one.
    fn write_slot(&self, slot: u64, email: &str, blob: &str) -> Result<(), VaultError>;

    /// Removes the backup for `(slot, email)`. No-op when absent.
    fn delete_slot(&self, slot: u64, email: &str) -> Result<(), VaultError>;
}
