//! Cross-process mutual exclusion around a switch.
//!
//! On Unix the lock is an OS-advisory `flock` on a well-known file, polled
//! non-blockingly at a fixed interval until the timeout elapses. Advisory
//! locks are tied to process lifetime, so a holder that dies releases the
//! lock automatically and a leftover lock file is harmless. Elsewhere the
//! lock falls back to create-new-file semantics with stale-file reclaim.

use std::path::Path;
use std::time::Duration;

use crate::errors::SwapError;

/// Default wait for the switch lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Acquires the named switch lock, creating parent directories as needed.
///
/// The returned guard releases the lock when dropped; dropping it twice or
/// after the process already released is safe by construction.
pub fn acquire_switch_lock(
    path: &Path,
    timeout: Duration,
) -> Result<SwitchLockGuard, SwapError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                SwapError::Config(format!(
                    "failed to create lock directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
    }
    imp::acquire(path, timeout)
}

fn lock_timeout_error(path: &Path, timeout: Duration) -> SwapError {
    SwapError::Lock {
        path: path.display().to_string(),
        timeout_secs: timeout.as_secs(),
    }
}

#[cfg(unix)]
mod imp {
    use std::fs::OpenOptions;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use super::{lock_timeout_error, POLL_INTERVAL};
    use crate::errors::SwapError;

    use std::os::raw::c_int;

    const LOCK_EX: c_int = 2;
    const LOCK_NB: c_int = 4;
    const LOCK_UN: c_int = 8;

    extern "C" {
        fn flock(fd: c_int, operation: c_int) -> c_int;
    }

    /// Holds the advisory lock for its lifetime.
    #[derive(Debug)]
    pub struct SwitchLockGuard {
        file: std::fs::File,
    }

    impl Drop for SwitchLockGuard {
        fn drop(&mut self) {
            let fd = std::os::unix::io::AsRawFd::as_raw_fd(&self.file);
            // The kernel also releases on close; this just makes it prompt.
            let _ = unsafe { flock(fd, LOCK_UN) };
        }
    }

    pub(super) fn acquire(path: &Path, timeout: Duration) -> Result<SwitchLockGuard, SwapError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|error| {
                SwapError::Config(format!(
                    "failed to open lock file {}: {error}",
                    path.display()
                ))
            })?;

        let start = Instant::now();
        loop {
            let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
            if unsafe { flock(fd, LOCK_EX | LOCK_NB) } == 0 {
                return Ok(SwitchLockGuard { file });
            }
            let error = std::io::Error::last_os_error();
            if error.kind() != std::io::ErrorKind::WouldBlock {
                return Err(SwapError::Config(format!(
                    "failed to lock {}: {error}",
                    path.display()
                )));
            }
            if start.elapsed() >= timeout {
                return Err(lock_timeout_error(path, timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant, SystemTime};

    use super::{lock_timeout_error, POLL_INTERVAL};
    use crate::errors::SwapError;

    const STALE_AFTER: Duration = Duration::from_secs(30);

    /// Holds the lock file for its lifetime.
    #[derive(Debug)]
    pub struct SwitchLockGuard {
        path: PathBuf,
    }

    impl Drop for SwitchLockGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub(super) fn acquire(path: &Path, timeout: Duration) -> Result<SwitchLockGuard, SwapError> {
        let start = Instant::now();
        loop {
            match OpenOptions::new().create_new(true).write(true).open(path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(SwitchLockGuard {
                        path: path.to_path_buf(),
                    });
                }
                Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                    if reclaim_stale_lock(path) {
                        continue;
                    }
                    if start.elapsed() >= timeout {
                        return Err(lock_timeout_error(path, timeout));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(error) => {
                    return Err(SwapError::Config(format!(
                        "failed to create lock file {}: {error}",
                        path.display()
                    )));
                }
            }
        }
    }

    fn reclaim_stale_lock(path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < STALE_AFTER {
            return false;
        }
        std::fs::remove_file(path).is_ok()
    }
}

pub use imp::SwitchLockGuard;
