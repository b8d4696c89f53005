//! A switch as a sequence of recorded, individually-reversible steps.

use std::path::{Path, PathBuf};

use accswap_core::{read_document, restrict_permissions, utc_timestamp, write_document, DocumentState};
use accswap_vault::SecretStore;
use serde_json::Value;

/// Mutation steps a switch can leave behind. The re-backup of the current
/// account is not listed: it only overwrites that slot's own backup with
/// its own live state and needs no undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwitchStep {
    CredentialsWritten,
    ConfigWritten,
    SequenceUpdated,
}

impl SwitchStep {
    fn as_str(self) -> &'static str {
        match self {
            Self::CredentialsWritten => "credentials_written",
            Self::ConfigWritten => "config_written",
            Self::SequenceUpdated => "sequence_updated",
        }
    }
}

/// Pre-transaction snapshot plus the list of completed steps.
#[derive(Debug)]
pub(crate) struct SwitchTransaction {
    original_credentials: String,
    original_config: String,
    original_account: Option<u64>,
    config_path: PathBuf,
    completed: Vec<SwitchStep>,
}

impl SwitchTransaction {
    pub(crate) fn new(
        original_credentials: String,
        original_config: String,
        original_account: Option<u64>,
        config_path: PathBuf,
    ) -> Self {
        Self {
            original_credentials,
            original_config,
            original_account,
            config_path,
            completed: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: SwitchStep) {
        self.completed.push(step);
    }

    pub(crate) fn has_steps(&self) -> bool {
        !self.completed.is_empty()
    }

    /// Walks completed steps in reverse, restoring the pre-transaction
    /// state. Every step is attempted even when an earlier one fails;
    /// returns true only when all attempted steps succeeded.
    pub(crate) fn rollback(&self, vault: &dyn SecretStore, sequence_file: &Path) -> bool {
        let mut success = true;
        for step in self.completed.iter().rev() {
            let result = match step {
                SwitchStep::CredentialsWritten => self.restore_credentials(vault),
                SwitchStep::ConfigWritten => self.restore_config(),
                SwitchStep::SequenceUpdated => self.restore_registry(sequence_file),
            };
            match result {
                Ok(()) => tracing::info!(step = step.as_str(), "rolled back step"),
                Err(error) => {
                    tracing::error!(step = step.as_str(), %error, "failed to roll back step");
                    success = false;
                }
            }
        }
        success
    }

    fn restore_credentials(&self, vault: &dyn SecretStore) -> Result<(), String> {
        vault
            .write_active(&self.original_credentials)
            .map_err(|error| error.to_string())
    }

    fn restore_config(&self) -> Result<(), String> {
        std::fs::write(&self.config_path, &self.original_config).map_err(|error| {
            format!(
                "failed to restore configuration {}: {error}",
                self.config_path.display()
            )
        })?;
        restrict_permissions(&self.config_path).map_err(|error| error.to_string())
    }

    fn restore_registry(&self, sequence_file: &Path) -> Result<(), String> {
        let DocumentState::Found(mut document) = read_document(sequence_file) else {
            return Err(format!(
                "registry document {} is missing or corrupt",
                sequence_file.display()
            ));
        };
        let Some(fields) = document.as_object_mut() else {
            return Err(format!(
                "registry document {} is not an object",
                sequence_file.display()
            ));
        };
        let active = match self.original_account {
            Some(slot) => Value::from(slot),
            None => Value::Null,
        };
        fields.insert("activeAccountNumber".to_string(), active);
        fields.insert("lastUpdated".to_string(), Value::from(utc_timestamp()));
        write_document(sequence_file, &document).map_err(|error| error.to_string())
    }
}
