//! Platform-abstracted credential storage.
//!
//! Exposes the [`SecretStore`] seam the switch engine talks through, with a
//! file-backed variant for Linux/WSL and an OS-keychain variant for
//! macOS/Windows. Both give identical read-after-write semantics; the
//! backend is picked once at construction from a detected [`Platform`].

use std::path::PathBuf;

pub mod file_store;
pub mod keyring_store;
pub mod platform;
pub mod store;

pub use file_store::FileSecretStore;
pub use keyring_store::KeyringSecretStore;
pub use platform::{is_running_in_container, Platform};
pub use store::{SecretStore, VaultError};

/// Selects the storage medium for `platform`.
///
/// `live_credentials_path` and `slots_dir` are only used by the file-backed
/// variant; keychain platforms keep both the live secret and the per-slot
/// backups in the OS keychain.
pub fn secret_store_for_platform(
    platform: Platform,
    live_credentials_path: PathBuf,
    slots_dir: PathBuf,
) -> Box<dyn SecretStore> {
    if platform.uses_keychain() {
        Box::new(KeyringSecretStore::new())
    } else {
        Box::new(FileSecretStore::new(live_credentials_path, slots_dir))
    }
}
