use accswap_vault::VaultError;
use thiserror::Error;

/// Error taxonomy for account-switch operations.
///
/// Every I/O or parsing failure is mapped to one of these kinds at the
/// point of occurrence, carrying enough context (slot, email, path) to
/// diagnose without a backtrace.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Identifier is neither a slot number nor email-shaped. Rejected
    /// before any I/O.
    #[error("invalid account identifier '{0}': expected a slot number or an email address")]
    Validation(String),

    /// Identifier is well-formed but resolves to no managed account.
    #[error("no managed account matches '{0}'")]
    NotFound(String),

    /// Live configuration or registry document problem.
    #[error("{0}")]
    Config(String),

    /// Vault read/write failure, distinct from "nothing stored".
    #[error("{0}")]
    CredentialIo(String),

    /// Mutual exclusion could not be obtained; the operation never started.
    #[error("timed out acquiring the switch lock at {path} after {timeout_secs}s")]
    Lock { path: String, timeout_secs: u64 },

    /// The switch stopped before anything live was touched; no rollback
    /// was needed.
    #[error("switch to account {slot} failed: {message}; no live state was modified")]
    SwitchAborted { slot: u64, message: String },

    /// The switch transaction failed after starting. `rolled_back` reports
    /// whether the live state was restored.
    #[error("switch to account {slot} failed: {message}; {}", rollback_note(.rolled_back))]
    Switch {
        slot: u64,
        message: String,
        rolled_back: bool,
    },
}

fn rollback_note(rolled_back: &bool) -> &'static str {
    if *rolled_back {
        "live credentials and configuration were restored"
    } else {
        "rollback also failed, manual recovery may be needed"
    }
}

impl From<VaultError> for SwapError {
    fn from(error: VaultError) -> Self {
        Self::CredentialIo(error.to_string())
    }
}
