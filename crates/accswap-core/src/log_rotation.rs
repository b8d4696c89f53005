use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const DEFAULT_LOG_ROTATION_MAX_BYTES: u64 = 1024 * 1024;
const DEFAULT_LOG_ROTATION_MAX_FILES: usize = 4;

/// Configuration for size-based log rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl LogRotationPolicy {
    /// Build policy from env vars with safe defaults.
    pub fn from_env() -> Self {
        let max_bytes = std::env::var("ACCSWAP_LOG_ROTATION_MAX_BYTES")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_LOG_ROTATION_MAX_BYTES);
        let max_files = std::env::var("ACCSWAP_LOG_ROTATION_MAX_FILES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_LOG_ROTATION_MAX_FILES);
        Self {
            max_bytes,
            max_files,
        }
    }

    /// Returns true when size-based rotation is enabled.
    pub fn is_enabled(self) -> bool {
        self.max_bytes > 0 && self.max_files > 0
    }
}

/// Rotates `path` aside when its size already exceeds the policy budget.
///
/// Intended to run once at startup before the log file is handed to a
/// long-lived writer.
pub fn rotate_if_oversized(path: &Path, policy: LogRotationPolicy) -> Result<()> {
    if !policy.is_enabled() || !path.exists() {
        return Ok(());
    }
    let current_size = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    if current_size >= policy.max_bytes {
        rotate_log_file(path, policy)?;
    }
    Ok(())
}

fn rotated_backup_path(path: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), index))
}

fn rotate_log_file(path: &Path, policy: LogRotationPolicy) -> Result<()> {
    if !path.exists() || !policy.is_enabled() {
        return Ok(());
    }

    if policy.max_files <= 1 {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to rotate {}", path.display()))?;
        return Ok(());
    }

    let max_backup_index = policy.max_files.saturating_sub(1);
    for index in (1..=max_backup_index).rev() {
        let source = if index == 1 {
            path.to_path_buf()
        } else {
            rotated_backup_path(path, index.saturating_sub(1))
        };
        if !source.exists() {
            continue;
        }
        let destination = rotated_backup_path(path, index);
        if destination.exists() {
            std::fs::remove_file(&destination).with_context(|| {
                format!("failed to replace rotated log {}", destination.display())
            })?;
        }
        std::fs::rename(&source, &destination).with_context(|| {
            format!(
                "failed to rotate {} to {}",
                source.display(),
                destination.display()
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{rotate_if_oversized, rotated_backup_path, LogRotationPolicy};

    #[test]
    fn startup_rotation_moves_oversized_log_aside() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("accswap.log");
        let policy = LogRotationPolicy {
            max_bytes: 8,
            max_files: 2,
        };

        std::fs::write(&path, "well past the budget\n").expect("seed");
        rotate_if_oversized(path.as_path(), policy).expect("rotate");
        assert!(!path.exists());
        assert!(rotated_backup_path(path.as_path(), 1).exists());
    }

    #[test]
    fn repeated_startup_rotations_prune_to_max_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("accswap.log");
        let policy = LogRotationPolicy {
            max_bytes: 8,
            max_files: 2,
        };

        for seq in 1..=3 {
            std::fs::write(&path, format!("oversized log body {seq}\n")).expect("seed");
            rotate_if_oversized(path.as_path(), policy).expect("rotate");
        }

        let first_backup = rotated_backup_path(path.as_path(), 1);
        assert!(first_backup.exists());
        assert!(std::fs::read_to_string(&first_backup)
            .expect("read")
            .contains("body 3"));
        assert!(
            !rotated_backup_path(path.as_path(), 2).exists(),
            "backups older than max_files retention must be pruned"
        );
    }
}
