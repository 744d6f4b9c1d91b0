//! Host environment detection.

use super::Arch;
use std::collections::BTreeSet;

/// Read-only description of the machine running the pipeline.
///
/// OS identifiers use the names reported by `uname`: `Linux`, `Darwin`,
/// `Windows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Host OS identifier.
    pub host_os: String,
    /// Host CPU architecture name (e.g. "x86_64", "arm64").
    pub host_arch: String,
    /// OS identifiers the active output format supports.
    pub supported_host_os: BTreeSet<String>,
}

impl HostEnvironment {
    /// Detects the running host, recording the format's supported host set.
    pub fn detect<'a>(supported_host_os: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            os_identifier(std::env::consts::OS),
            Arch::from_host().as_str(),
            supported_host_os,
        )
    }

    /// Builds a host description from explicit values.
    pub fn new<'a>(
        host_os: impl Into<String>,
        host_arch: impl Into<String>,
        supported_host_os: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            host_os: host_os.into(),
            host_arch: host_arch.into(),
            supported_host_os: supported_host_os.into_iter().map(String::from).collect(),
        }
    }

    /// Whether the host OS is in the supported set.
    pub fn is_supported(&self) -> bool {
        self.supported_host_os.contains(&self.host_os)
    }

    /// Whether the host OS family requires an extension on executables.
    pub fn is_windows(&self) -> bool {
        self.host_os == "Windows"
    }
}

/// Maps a Rust target OS name to the `uname` style identifier.
pub fn os_identifier(target_os: &str) -> String {
    match target_os {
        "linux" => "Linux".into(),
        "macos" => "Darwin".into(),
        "windows" => "Windows".into(),
        "freebsd" => "FreeBSD".into(),
        other => other.to_string(),
    }
}
