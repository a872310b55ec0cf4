use std::fmt;

use crate::archive::ArchiveType;
use crate::error::{Result, WrapperError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

impl Os {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "darwin" | "macos" => Some(Self::Darwin),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Some(Self::Amd64),
            "aarch64" | "arm64" => Some(Self::Arm64),
            _ => None,
        }
    }
}

/// Normalized (os, arch) pair used to select release artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformTag {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformTag {
    /// Identifies the host this wrapper was compiled for.
    pub fn identify() -> Result<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Builds a tag from raw OS and machine names, normalizing architecture aliases.
    pub fn from_parts(os: &str, machine: &str) -> Result<Self> {
        let os = Os::parse(os).ok_or_else(|| {
            WrapperError::UnsupportedPlatform(format!("unsupported operating system: {os}"))
        })?;
        let arch = Arch::parse(machine).ok_or_else(|| {
            WrapperError::UnsupportedPlatform(format!("unsupported architecture: {machine}"))
        })?;
        Ok(Self { os, arch })
    }

    pub fn is_windows(self) -> bool {
        self.os == Os::Windows
    }

    pub fn binary_name(self, toolkit_name: &str) -> String {
        if self.is_windows() {
            format!("{toolkit_name}.exe")
        } else {
            toolkit_name.to_string()
        }
    }

    pub fn archive_type(self) -> ArchiveType {
        ArchiveType::for_os(self.os)
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}
