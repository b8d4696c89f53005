use std::path::Path;

/// Platforms with distinct credential-storage behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Wsl,
    Windows,
    Unknown,
}

impl Platform {
    /// Detects the current platform.
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            "linux" => {
                if std::env::var_os("WSL_DISTRO_NAME").is_some() {
                    Self::Wsl
                } else {
                    Self::Linux
                }
            }
            _ => Self::Unknown,
        }
    }

    /// True when the OS keychain is the reliable storage medium.
    ///
    /// Linux and WSL use file-backed storage instead; keyring backends
    /// there depend on a running secret service that headless setups lack.
    pub fn uses_keychain(self) -> bool {
        matches!(self, Self::MacOs | Self::Windows)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Wsl => "wsl",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        }
    }
}

/// Returns true when the process appears to run inside a container.
///
/// Used by the CLI to tolerate root execution in sandboxed environments.
pub fn is_running_in_container(platform: Platform) -> bool {
    if std::env::var_os("CONTAINER").is_some() || std::env::var_os("container").is_some() {
        return true;
    }
    if platform == Platform::Windows {
        return false;
    }
    if Path::new("/.dockerenv").exists() {
        return true;
    }
    if let Ok(content) = std::fs::read_to_string("/proc/1/cgroup") {
        if ["docker", "lxc", "containerd", "kubepods"]
            .iter()
            .any(|marker| content.contains(marker))
        {
            return true;
        }
    }
    if let Ok(content) = std::fs::read_to_string("/proc/self/mountinfo") {
        if ["docker", "overlay"]
            .iter()
            .any(|marker| content.contains(marker))
        {
            return true;
        }
    }
    false
}
