//! OS-keychain secret storage for macOS and Windows.
//!
//! The live credential uses the external tool's own keychain service so a
//! swap is indistinguishable from a fresh login; per-slot backups live
//! under this tool's own service name.

use keyring::Entry;

use crate::store::{SecretStore, VaultError};

const LIVE_SERVICE: &str = "Claude Code-credentials";
const BACKUP_SERVICE: &str = "accswap";
const LIVE_USERNAME_FALLBACK: &str = "user";

#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    live_service: String,
    backup_service: String,
    live_username: String,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        let live_username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| LIVE_USERNAME_FALLBACK.to_string());
        Self {
            live_service: LIVE_SERVICE.to_string(),
            backup_service: BACKUP_SERVICE.to_string(),
            live_username,
        }
    }

    fn live_entry(&self, access: Access) -> Result<Entry, VaultError> {
        Entry::new(&self.live_service, &self.live_username)
            .map_err(|error| access.error("live keychain entry", error))
    }

    fn slot_entry(&self, slot: u64, email: &str, access: Access) -> Result<Entry, VaultError> {
        Entry::new(&self.backup_service, &format!("account-{slot}-{email}")).map_err(|error| {
            access.error(format!("keychain backup for slot {slot} ({email})"), error)
        })
    }
}

/// The operation an entry handle is being built for, so a failure to build
/// it reports as that operation rather than always as a read.
#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
    Delete,
}

impl Access {
    fn error(self, what: impl Into<String>, detail: impl ToString) -> VaultError {
        match self {
            Self::Read => VaultError::read(what, detail),
            Self::Write => VaultError::write(what, detail),
            Self::Delete => VaultError::delete(what, detail),
        }
    }
}


impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn read_active(&self) -> Result<String, VaultError> {
        match self.live_entry(Access::Read)?.get_password() {
            Ok(blob) => Ok(blob),
            Err(keyring::Error::NoEntry) => Ok(String::new()),
            Err(error) => Err(VaultError::read("live keychain credentials", error)),
        }
    }

    fn write_active(&self, blob: &str) -> Result<(), VaultError> {
        self.live_entry(Access::Write)?
            .set_password(blob)
            .map_err(|error| VaultError::write("live keychain credentials", error))
    }

    fn read_slot(&self, slot: u64, email: &str) -> Result<String, VaultError> {
        match self.slot_entry(slot, email, Access::Read)?.get_password() {
            Ok(blob) => Ok(blob),
            Err(keyring::Error::NoEntry) => Ok(String::new()),
            Err(error) => Err(VaultError::read(
                format!("keychain backup for slot {slot} ({email})"),
                error,
            )),
        }
    }

    fn write_slot(&self, slot: u64, email: &str, blob: &str) -> Result<(), VaultError> {
        self.slot_entry(slot, email, Access::Write)?
            .set_password(blob)
            .map_err(|error| {
                VaultError::write(format!("keychain backup for slot {slot} ({email})"), error)
            })?;
        tracing::debug!(slot, email, "stored credential backup in keychain");
        Ok(())
    }

    fn delete_slot(&self, slot: u64, email: &str) -> Result<(), VaultError> {
        match self.slot_entry(slot, email, Access::Delete)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(VaultError::delete(
                format!("keychain backup for slot {slot} ({email})"),
                error,
            )),
        }
    }
}
