//! CPU architecture types and utilities.

use std::fmt;

/// CPU architecture of the host or of a bundled binary.
///
/// Used to build support package and stub binary queries.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_create::bundler::Arch;
///
/// let arch = Arch::from_host();
/// println!("Host architecture: {}", arch);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// x86_64 / AMD64 (64-bit)
    X86_64,
    /// x86 / i686 (32-bit)
    X86,
    /// AArch64 / ARM64 (64-bit)
    AArch64,
    /// ARM (32-bit)
    Arm,
    /// RISC-V (64-bit)
    Riscv64,
}

impl Arch {
    /// Architecture of the running process.
    pub fn from_host() -> Self {
        Self::parse(std::env::consts::ARCH).unwrap_or(Self::X86_64)
    }

    /// Parses an architecture name as reported by the OS or Rust.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "x86_64" | "amd64" | "AMD64" => Some(Self::X86_64),
            "x86" | "i386" | "i686" => Some(Self::X86),
            "aarch64" | "arm64" | "ARM64" => Some(Self::AArch64),
            "arm" | "armv7" | "armv7l" => Some(Self::Arm),
            "riscv64" => Some(Self::Riscv64),
            _ => None,
        }
    }

    /// Canonical name used in support package queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::X86 => "x86",
            Self::AArch64 => "arm64",
            Self::Arm => "arm",
            Self::Riscv64 => "riscv64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
