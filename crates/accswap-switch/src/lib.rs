//! Core account-switch engine.
//!
//! Maintains several login identities for an external CLI tool and swaps
//! the live credentials/configuration with a previously backed-up identity
//! under a cross-process lock, rolling back every applied step on failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use accswap_core::{
    read_document, restrict_dir_permissions, restrict_permissions, utc_timestamp, write_document,
    write_text_atomic, DocumentState,
};
use accswap_vault::{secret_store_for_platform, Platform, SecretStore};
use serde_json::Value;

mod errors;
mod locking;
mod registry;
mod transaction;
#[cfg(test)]
mod tests;

pub use errors::SwapError;
pub use locking::{acquire_switch_lock, SwitchLockGuard, DEFAULT_LOCK_TIMEOUT};
pub use registry::{is_email_shaped, AccountRecord, SequenceRegistry};

use transaction::{SwitchStep, SwitchTransaction};

const BACKUP_DIR_NAME: &str = ".accswap-backup";
const SEQUENCE_FILE_NAME: &str = "sequence.json";
const CONFIGS_DIR_NAME: &str = "configs";
const CREDENTIALS_DIR_NAME: &str = "credentials";
const LOCK_FILE_NAME: &str = ".lock";
const LOG_FILE_NAME: &str = "accswap.log";

const LIVE_CONFIG_DIR: &str = ".claude";
const LIVE_CONFIG_NAME: &str = ".claude.json";
const LIVE_CREDENTIALS_NAME: &str = ".credentials.json";
const OAUTH_SECTION_KEY: &str = "oauthAccount";

/// Filesystem layout for one invocation, built once and threaded through.
#[derive(Debug, Clone)]
pub struct SwitcherPaths {
    pub home: PathBuf,
    pub backup_dir: PathBuf,
    pub sequence_file: PathBuf,
    pub configs_dir: PathBuf,
    pub credentials_dir: PathBuf,
    pub lock_file: PathBuf,
    pub log_file: PathBuf,
}

impl SwitcherPaths {
    pub fn under_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let backup_dir = home.join(BACKUP_DIR_NAME);
        Self {
            sequence_file: backup_dir.join(SEQUENCE_FILE_NAME),
            configs_dir: backup_dir.join(CONFIGS_DIR_NAME),
            credentials_dir: backup_dir.join(CREDENTIALS_DIR_NAME),
            lock_file: backup_dir.join(LOCK_FILE_NAME),
            log_file: backup_dir.join(LOG_FILE_NAME),
            backup_dir,
            home,
        }
    }

    /// Where the external tool keeps its live credential file on
    /// file-backed platforms.
    pub fn live_credentials_path(&self) -> PathBuf {
        self.home.join(LIVE_CONFIG_DIR).join(LIVE_CREDENTIALS_NAME)
    }
}

/// Result of adopting the live account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added { number: u64, email: String },
    AlreadyManaged { email: String },
}

/// A successfully installed account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchedAccount {
    pub number: u64,
    pub email: String,
}

/// Result of the unconditional rotate-to-next operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    Switched(SwitchedAccount),
    /// Fewer than two accounts are managed; nothing to rotate to.
    NothingToRotate { managed: usize },
    /// The live account was unmanaged and has been adopted instead of
    /// rotating; the caller should rerun to actually switch.
    AdoptedCurrent { number: u64, email: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountListing {
    pub number: u64,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedAccount {
    pub number: u64,
    pub email: String,
    pub was_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub active_email: Option<String>,
    pub managed_number: Option<u64>,
    pub total_managed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: Vec<String>,
}

/// The account switcher: registry operations plus the switch transaction
/// engine. Single-threaded per process; cross-process exclusion comes from
/// the switch lock.
pub struct AccountSwitcher {
    paths: SwitcherPaths,
    platform: Platform,
    vault: Box<dyn SecretStore>,
    lock_timeout: Duration,
}

impl AccountSwitcher {
    /// Builds a switcher rooted at `home`, detecting the platform and
    /// selecting the matching vault backend.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let paths = SwitcherPaths::under_home(home);
        let platform = Platform::detect();
        let vault = secret_store_for_platform(
            platform,
            paths.live_credentials_path(),
            paths.credentials_dir.clone(),
        );
        Self {
            paths,
            platform,
            vault,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Builds a switcher with an explicit vault backend.
    pub fn with_vault(
        paths: SwitcherPaths,
        platform: Platform,
        vault: Box<dyn SecretStore>,
    ) -> Self {
        Self {
            paths,
            platform,
            vault,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn paths(&self) -> &SwitcherPaths {
        &self.paths
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// True once the registry document exists.
    pub fn registry_exists(&self) -> bool {
        self.paths.sequence_file.exists()
    }

    /// Live configuration path with fallback: the primary path wins when it
    /// parses and carries the account-identifying section.
    pub fn live_config_path(&self) -> PathBuf {
        let primary = self.paths.home.join(LIVE_CONFIG_DIR).join(LIVE_CONFIG_NAME);
        if let DocumentState::Found(document) = read_document(&primary) {
            if document.get(OAUTH_SECTION_KEY).is_some() {
                return primary;
            }
        }
        self.paths.home.join(LIVE_CONFIG_NAME)
    }

    /// Email of the account the external tool is currently logged in as.
    pub fn current_account_email(&self) -> Option<String> {
        let document = read_document(&self.live_config_path()).into_value()?;
        document
            .get(OAUTH_SECTION_KEY)
            .and_then(|section| section.get("emailAddress"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string)
    }

    /// Backs up the live account's credentials and configuration into a new
    /// slot. A no-op reporting `AlreadyManaged` when the email already owns
    /// a slot.
    pub fn add_current_account(&self) -> Result<AddOutcome, SwapError> {
        self.setup_directories()?;

        let current_email = self.current_account_email().ok_or_else(|| {
            SwapError::Config(
                "no active account found in the live configuration; log in first".to_string(),
            )
        })?;

        let mut registry = self
            .load_registry()
            .unwrap_or_else(|| SequenceRegistry::empty(utc_timestamp()));
        if registry.find_by_email(&current_email).is_some() {
            return Ok(AddOutcome::AlreadyManaged {
                email: current_email,
            });
        }

        let credentials = self.vault.read_active()?;
        if credentials.is_empty() {
            return Err(SwapError::CredentialIo(
                "no credentials found for the active account".to_string(),
            ));
        }

        let config_path = self.live_config_path();
        let config_text = std::fs::read_to_string(&config_path).map_err(|error| {
            SwapError::Config(format!(
                "failed to read live configuration {}: {error}",
                config_path.display()
            ))
        })?;
        let uuid = serde_json::from_str::<Value>(&config_text)
            .ok()
            .and_then(|document| {
                document
                    .get(OAUTH_SECTION_KEY)?
                    .get("accountUuid")?
                    .as_str()
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let slot = registry.next_account_number();
        self.vault.write_slot(slot, &current_email, &credentials)?;
        self.write_config_backup(slot, &current_email, &config_text)?;

        let now = utc_timestamp();
        registry.insert_account(
            slot,
            AccountRecord {
                email: current_email.clone(),
                uuid,
                added: now.clone(),
            },
            now,
        );
        self.store_registry(&registry)?;
        tracing::info!(slot, email = %current_email, "added account");
        Ok(AddOutcome::Added {
            number: slot,
            email: current_email,
        })
    }

    /// Resolves an identifier to its slot without mutating anything.
    pub fn resolve_account(&self, identifier: &str) -> Result<AccountListing, SwapError> {
        let registry = self.require_registry()?;
        let slot = registry
            .resolve(identifier)?
            .filter(|slot| registry.contains(*slot))
            .ok_or_else(|| SwapError::NotFound(identifier.to_string()))?;
        let record = registry
            .record(slot)
            .ok_or_else(|| SwapError::NotFound(identifier.to_string()))?;
        Ok(AccountListing {
            number: slot,
            email: record.email.clone(),
            is_active: registry.active_account_number == Some(slot),
        })
    }

    /// Deletes a slot's backups and drops it from the registry. Clears the
    /// active marker when the removed slot was active.
    pub fn remove_account(&self, identifier: &str) -> Result<RemovedAccount, SwapError> {
        let mut registry = self.require_registry()?;
        let slot = registry
            .resolve(identifier)?
            .filter(|slot| registry.contains(*slot))
            .ok_or_else(|| SwapError::NotFound(identifier.to_string()))?;
        let record = registry
            .record(slot)
            .cloned()
            .ok_or_else(|| SwapError::NotFound(identifier.to_string()))?;
        let was_active = registry.active_account_number == Some(slot);

        self.vault.delete_slot(slot, &record.email)?;
        let config_backup = self.config_backup_path(slot, &record.email);
        match std::fs::remove_file(&config_backup) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(SwapError::Config(format!(
                    "failed to remove configuration backup {}: {error}",
                    config_backup.display()
                )));
            }
        }

        registry.remove_account(slot, utc_timestamp());
        self.store_registry(&registry)?;
        tracing::info!(slot, email = %record.email, "removed account");
        Ok(RemovedAccount {
            number: slot,
            email: record.email,
            was_active,
        })
    }

    /// All managed accounts in rotation order. Active is determined by the
    /// live configuration's email so an out-of-band login still shows up
    /// correctly.
    pub fn list_accounts(&self) -> Result<Vec<AccountListing>, SwapError> {
        let Some(registry) = self.load_registry() else {
            return Ok(Vec::new());
        };
        let current_email = self.current_account_email();
        let mut listings = Vec::with_capacity(registry.sequence.len());
        for slot in &registry.sequence {
            let Some(record) = registry.record(*slot) else {
                continue;
            };
            listings.push(AccountListing {
                number: *slot,
                email: record.email.clone(),
                is_active: current_email.as_deref() == Some(record.email.as_str()),
            });
        }
        Ok(listings)
    }

    pub fn status(&self) -> Result<StatusReport, SwapError> {
        let active_email = self.current_account_email();
        let registry = self.load_registry();
        let managed_number = match (&active_email, &registry) {
            (Some(email), Some(registry)) => registry.find_by_email(email),
            _ => None,
        };
        let total_managed = registry.map(|registry| registry.accounts.len()).unwrap_or(0);
        Ok(StatusReport {
            active_email,
            managed_number,
            total_managed,
        })
    }

    /// Switches to the slot following the active one in rotation order.
    pub fn rotate_next(&self) -> Result<RotateOutcome, SwapError> {
        let registry = self.require_registry()?;
        let current_email = self.current_account_email().ok_or_else(|| {
            SwapError::Config("no active account found in the live configuration".to_string())
        })?;

        if registry.find_by_email(&current_email).is_none() {
            return match self.add_current_account()? {
                AddOutcome::Added { number, email } => {
                    Ok(RotateOutcome::AdoptedCurrent { number, email })
                }
                AddOutcome::AlreadyManaged { email } => Err(SwapError::Config(format!(
                    "account {email} appeared in the registry mid-operation; rerun the switch"
                ))),
            };
        }

        if registry.sequence.len() < 2 {
            return Ok(RotateOutcome::NothingToRotate {
                managed: registry.sequence.len(),
            });
        }
        let target = registry.next_in_rotation().ok_or_else(|| {
            SwapError::Config("registry rotation order is inconsistent".to_string())
        })?;
        self.perform_switch(target).map(RotateOutcome::Switched)
    }

    /// Switches to a specific slot. Switching to the active slot is allowed
    /// and re-runs the full backup/install cycle.
    pub fn switch_to(&self, identifier: &str) -> Result<SwitchedAccount, SwapError> {
        let registry = self.require_registry()?;
        let slot = registry
            .resolve(identifier)?
            .filter(|slot| registry.contains(*slot))
            .ok_or_else(|| SwapError::NotFound(identifier.to_string()))?;
        self.perform_switch(slot)
    }

    /// Deletes every slot's vault entry and the whole backup directory.
    pub fn purge(&self) -> Result<PurgeReport, SwapError> {
        let mut report = PurgeReport::default();
        if let Some(registry) = self.load_registry() {
            for (key, record) in &registry.accounts {
                let Ok(slot) = key.parse::<u64>() else {
                    continue;
                };
                match self.vault.delete_slot(slot, &record.email) {
                    Ok(()) => report
                        .removed
                        .push(format!("credential backup for account {slot} ({})", record.email)),
                    Err(error) => {
                        tracing::warn!(slot, email = %record.email, %error, "purge: failed to delete credential backup");
                    }
                }
            }
        }
        if self.paths.backup_dir.exists() {
            std::fs::remove_dir_all(&self.paths.backup_dir).map_err(|error| {
                SwapError::Config(format!(
                    "failed to remove backup directory {}: {error}",
                    self.paths.backup_dir.display()
                ))
            })?;
            report
                .removed
                .push(format!("backup directory {}", self.paths.backup_dir.display()));
        }
        Ok(report)
    }

    // ── switch transaction engine ───────────────────────────────────────

    fn perform_switch(&self, target: u64) -> Result<SwitchedAccount, SwapError> {
        let _guard = locking::acquire_switch_lock(&self.paths.lock_file, self.lock_timeout)?;

        let mut registry = self.require_registry()?;
        let target_email = registry
            .record(target)
            .map(|record| record.email.clone())
            .ok_or_else(|| SwapError::NotFound(target.to_string()))?;
        let current_email = self.current_account_email().ok_or_else(|| {
            SwapError::Config("no active account found in the live configuration".to_string())
        })?;
        let current_slot = registry
            .active_account_number
            .filter(|slot| registry.contains(*slot))
            .or_else(|| registry.find_by_email(&current_email))
            .ok_or_else(|| {
                SwapError::Config(format!(
                    "active account {current_email} is not managed; add it first"
                ))
            })?;

        let config_path = self.live_config_path();
        let original_credentials = self.vault.read_active()?;
        if original_credentials.is_empty() {
            return Err(SwapError::CredentialIo(
                "no credentials found for the active account".to_string(),
            ));
        }
        let original_config = std::fs::read_to_string(&config_path).map_err(|error| {
            SwapError::Config(format!(
                "failed to read live configuration {}: {error}",
                config_path.display()
            ))
        })?;

        let mut transaction = SwitchTransaction::new(
            original_credentials.clone(),
            original_config.clone(),
            Some(current_slot),
            config_path.clone(),
        );

        let outcome = self.run_switch_steps(
            &mut transaction,
            &mut registry,
            current_slot,
            &current_email,
            target,
            &target_email,
            &config_path,
            &original_credentials,
            &original_config,
        );
        match outcome {
            Ok(()) => {
                tracing::info!(from = current_slot, to = target, "switched accounts");
                Ok(SwitchedAccount {
                    number: target,
                    email: target_email,
                })
            }
            Err(error) => {
                tracing::error!(%error, "switch failed");
                if !transaction.has_steps() {
                    return Err(error);
                }
                let rolled_back =
                    transaction.rollback(self.vault.as_ref(), &self.paths.sequence_file);
                if rolled_back {
                    tracing::info!("rollback complete");
                } else {
                    tracing::error!("rollback failed; live state may be inconsistent");
                }
                Err(SwapError::Switch {
                    slot: target,
                    message: error.to_string(),
                    rolled_back,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_switch_steps(
        &self,
        transaction: &mut SwitchTransaction,
        registry: &mut SequenceRegistry,
        current_slot: u64,
        current_email: &str,
        target: u64,
        target_email: &str,
        config_path: &Path,
        original_credentials: &str,
        original_config: &str,
    ) -> Result<(), SwapError> {
        // Re-backup the current account with its own live state. Idempotent
        // and never rolled back.
        self.vault
            .write_slot(current_slot, current_email, original_credentials)?;
        self.write_config_backup(current_slot, current_email, original_config)?;
        tracing::info!(slot = current_slot, "backed up active account");

        // Nothing live has been touched yet; verify the target's materials
        // before mutating anything.
        let target_credentials = self.vault.read_slot(target, target_email)?;
        let target_config = self.read_config_backup(target, target_email)?;
        if target_credentials.is_empty() || target_config.is_empty() {
            return Err(SwapError::SwitchAborted {
                slot: target,
                message: format!("missing backup data for account {target}"),
            });
        }

        self.vault.write_active(&target_credentials)?;
        transaction.record(SwitchStep::CredentialsWritten);
        tracing::info!(slot = target, "installed target credentials");

        let target_document: Value = serde_json::from_str(&target_config).map_err(|error| {
            SwapError::Config(format!(
                "backup configuration for account {target} is not valid JSON: {error}"
            ))
        })?;
        let oauth_section = target_document
            .get(OAUTH_SECTION_KEY)
            .filter(|section| section.as_object().is_some_and(|fields| !fields.is_empty()))
            .cloned()
            .ok_or_else(|| {
                SwapError::Config(format!(
                    "backup configuration for account {target} has no {OAUTH_SECTION_KEY} section"
                ))
            })?;

        // Merge into a fresh read of the live document, not the snapshot,
        // so unrelated fields written since the snapshot survive.
        let mut live_document = match read_document(config_path) {
            DocumentState::Found(document) => document,
            DocumentState::Absent | DocumentState::Corrupt => {
                return Err(SwapError::Config(format!(
                    "live configuration {} is missing or corrupt",
                    config_path.display()
                )));
            }
        };
        let Some(fields) = live_document.as_object_mut() else {
            return Err(SwapError::Config(format!(
                "live configuration {} is not a JSON object",
                config_path.display()
            )));
        };
        fields.insert(OAUTH_SECTION_KEY.to_string(), oauth_section);
        write_document(config_path, &live_document).map_err(|error| {
            SwapError::Config(format!(
                "failed to write live configuration {}: {error}",
                config_path.display()
            ))
        })?;
        transaction.record(SwitchStep::ConfigWritten);
        tracing::info!("updated live configuration");

        registry.active_account_number = Some(target);
        registry.last_updated = utc_timestamp();
        self.store_registry(registry)?;
        transaction.record(SwitchStep::SequenceUpdated);
        Ok(())
    }

    // ── persistence helpers ─────────────────────────────────────────────

    fn setup_directories(&self) -> Result<(), SwapError> {
        for dir in [
            &self.paths.backup_dir,
            &self.paths.configs_dir,
            &self.paths.credentials_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|error| {
                SwapError::Config(format!("failed to create {}: {error}", dir.display()))
            })?;
            restrict_dir_permissions(dir)
                .map_err(|error| SwapError::Config(error.to_string()))?;
        }
        Ok(())
    }

    fn load_registry(&self) -> Option<SequenceRegistry> {
        match read_document(&self.paths.sequence_file) {
            DocumentState::Found(value) => match serde_json::from_value(value) {
                Ok(registry) => Some(registry),
                Err(error) => {
                    tracing::warn!(%error, "registry document has an unexpected shape");
                    None
                }
            },
            DocumentState::Absent => None,
            DocumentState::Corrupt => {
                tracing::warn!(
                    path = %self.paths.sequence_file.display(),
                    "registry document is corrupt"
                );
                None
            }
        }
    }

    fn require_registry(&self) -> Result<SequenceRegistry, SwapError> {
        self.load_registry()
            .ok_or_else(|| SwapError::Config("no accounts are managed yet".to_string()))
    }

    fn store_registry(&self, registry: &SequenceRegistry) -> Result<(), SwapError> {
        let value = serde_json::to_value(registry).map_err(|error| {
            SwapError::Config(format!("failed to encode registry document: {error}"))
        })?;
        write_document(&self.paths.sequence_file, &value).map_err(|error| {
            SwapError::Config(format!(
                "failed to persist registry {}: {error}",
                self.paths.sequence_file.display()
            ))
        })
    }

    fn config_backup_path(&self, slot: u64, email: &str) -> PathBuf {
        self.paths
            .configs_dir
            .join(format!("config-{slot}-{email}.json"))
    }

    fn read_config_backup(&self, slot: u64, email: &str) -> Result<String, SwapError> {
        let path = self.config_backup_path(slot, email);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(error) => Err(SwapError::Config(format!(
                "failed to read configuration backup {}: {error}",
                path.display()
            ))),
        }
    }

    fn write_config_backup(&self, slot: u64, email: &str, text: &str) -> Result<(), SwapError> {
        let path = self.config_backup_path(slot, email);
        write_text_atomic(&path, text).map_err(|error| {
            SwapError::Config(format!(
                "failed to write configuration backup {}: {error}",
                path.display()
            ))
        })?;
        restrict_permissions(&path).map_err(|error| SwapError::Config(error.to_string()))
    }
}
