//! Process bootstrap: tracing setup and the root-execution guard.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use accswap_core::{rotate_if_oversized, LogRotationPolicy};
use accswap_vault::{is_running_in_container, Platform};
use anyhow::{bail, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initializes tracing with a compact stderr layer plus a persistent file
/// layer in the backup directory. The file layer is skipped when the log
/// file cannot be opened; stderr always works.
pub(crate) fn init_tracing(debug: bool, log_file: &Path) {
    let stderr_default = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let stderr_filter = EnvFilter::builder()
        .with_default_directive(stderr_default.into())
        .from_env_lossy();
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let file_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let file_layer = open_log_file(log_file).map(|file| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .compact()
            .with_writer(Arc::new(file))
            .with_filter(file_level)
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok()?;
    }
    let policy = LogRotationPolicy::from_env();
    if let Err(error) = rotate_if_oversized(path, policy) {
        tracing::debug!(%error, "log rotation skipped");
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Refuses to run with root privileges outside a container, where running
/// as uid 0 is the norm.
pub(crate) fn ensure_not_root(platform: Platform) -> Result<()> {
    if running_as_root() && !is_running_in_container(platform) {
        bail!("refusing to run as root; rerun as a regular user");
    }
    Ok(())
}

#[cfg(unix)]
fn running_as_root() -> bool {
    extern "C" {
        fn geteuid() -> u32;
    }
    unsafe { geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}
