//! Durable JSON document persistence.
//!
//! Reads recover absence and corruption into explicit variants so listing
//! code never crashes on a half-initialized backup directory. Writes go
//! through a process-unique temp file, are re-parsed to confirm
//! well-formedness, and land with an atomic rename.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::atomic_io::restrict_permissions;
use crate::time_utils::current_unix_timestamp;

/// Result of reading a durable document.
///
/// `Absent` and `Corrupt` are ordinary outcomes, not errors: a missing or
/// torn secondary document must not take down callers that can degrade.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    Found(Value),
    Absent,
    Corrupt,
}

impl DocumentState {
    /// Returns the parsed document, treating `Absent` and `Corrupt` alike.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Found(value) => Some(value),
            Self::Absent | Self::Corrupt => None,
        }
    }
}

/// Reads and parses the JSON document at `path`.
pub fn read_document(path: &Path) -> DocumentState {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return DocumentState::Absent;
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to read document");
            return DocumentState::Corrupt;
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => DocumentState::Found(value),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "document is not valid JSON");
            DocumentState::Corrupt
        }
    }
}

/// Serializes `document` and writes it to `path` atomically.
///
/// The serialized form is written to a sibling temp file unique to this
/// process, re-read and re-parsed to confirm well-formedness, renamed over
/// `path`, and finally restricted to owner read/write (best effort).
pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let mut content =
        serde_json::to_string_pretty(document).context("failed to encode document")?;
    content.push('\n');

    let temp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document"),
        std::process::id(),
        current_unix_timestamp()
    );
    let temp_path = parent_dir.join(temp_name);
    std::fs::write(&temp_path, &content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;

    // Confirm the bytes on disk parse before they replace the real document.
    let verify = std::fs::read_to_string(&temp_path)
        .with_context(|| format!("failed to re-read temporary file {}", temp_path.display()));
    let verified = verify.and_then(|raw| {
        serde_json::from_str::<Value>(&raw)
            .with_context(|| format!("temporary file {} is not valid JSON", temp_path.display()))
    });
    if let Err(error) = verified {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error);
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to rename temporary file {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;
    restrict_permissions(path)?;
    Ok(())
}
