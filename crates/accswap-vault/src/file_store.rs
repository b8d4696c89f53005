//! File-backed secret storage for platforms without a reliable keychain.
//!
//! The live credential blob lives at the external tool's own credentials
//! path; per-slot backups are base64-encoded, owner-only files under the
//! backup credentials directory.

use std::path::PathBuf;

use accswap_core::restrict_permissions;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use crate::store::{SecretStore, VaultError};

#[derive(Debug, Clone)]
pub struct FileSecretStore {
    live_path: PathBuf,
    slots_dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(live_path: impl Into<PathBuf>, slots_dir: impl Into<PathBuf>) -> Self {
        Self {
            live_path: live_path.into(),
            slots_dir: slots_dir.into(),
        }
    }

    fn slot_path(&self, slot: u64, email: &str) -> PathBuf {
        self.slots_dir.join(format!("creds-{slot}-{email}.enc"))
    }
}

impl SecretStore for FileSecretStore {
    fn read_active(&self) -> Result<String, VaultError> {
        match std::fs::read_to_string(&self.live_path) {
            Ok(blob) => Ok(blob),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(error) => Err(VaultError::read(
                format!("live credentials at {}", self.live_path.display()),
                error,
            )),
        }
    }

    fn write_active(&self, blob: &str) -> Result<(), VaultError> {
        let what = format!("live credentials at {}", self.live_path.display());
        if let Some(parent) = self.live_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| VaultError::write(what.clone(), error))?;
        }
        std::fs::write(&self.live_path, blob)
            .map_err(|error| VaultError::write(what.clone(), error))?;
        restrict_permissions(&self.live_path).map_err(|error| VaultError::write(what, error))?;
        Ok(())
    }

    fn read_slot(&self, slot: u64, email: &str) -> Result<String, VaultError> {
        let path = self.slot_path(slot, email);
        let encoded = match std::fs::read_to_string(&path) {
            Ok(encoded) => encoded,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(String::new());
            }
            Err(error) => {
                return Err(VaultError::read(
                    format!("credential backup for slot {slot} ({email})"),
                    error,
                ));
            }
        };
        let decoded = BASE64_STANDARD.decode(encoded.trim()).map_err(|error| {
            VaultError::read(
                format!("credential backup for slot {slot} ({email})"),
                format!("invalid encoding: {error}"),
            )
        })?;
        String::from_utf8(decoded).map_err(|_| {
            VaultError::read(
                format!("credential backup for slot {slot} ({email})"),
                "stored blob is not valid UTF-8",
            )
        })
    }

    fn write_slot(&self, slot: u64, email: &str, blob: &str) -> Result<(), VaultError> {
        let what = format!("credential backup for slot {slot} ({email})");
        std::fs::create_dir_all(&self.slots_dir)
            .map_err(|error| VaultError::write(what.clone(), error))?;
        let path = self.slot_path(slot, email);
        let encoded = BASE64_STANDARD.encode(blob.as_bytes());
        std::fs::write(&path, encoded).map_err(|error| VaultError::write(what.clone(), error))?;
        restrict_permissions(&path).map_err(|error| VaultError::write(what, error))?;
        tracing::debug!(slot, email, path = %path.display(), "stored credential backup");
        Ok(())
    }

    fn delete_slot(&self, slot: u64, email: &str) -> Result<(), VaultError> {
        let path = self.slot_path(slot, email);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(VaultError::delete(
                format!("credential backup for slot {slot} ({email})"),
                error,
            )),
        }
    }
}
