use std::fmt;

use semver::Version;

/// A loosely normalized release version, optionally spelled with a leading `v`.
///
/// Equality for install decisions goes through [`VersionString::matches`], which ignores
/// the prefix and never treats a development sentinel as equal to anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionString {
    raw: String,
}

impl VersionString {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into().trim().to_string(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Bare form without the `v` prefix, as the binary reports it.
    pub fn normalized(&self) -> &str {
        self.raw.strip_prefix('v').unwrap_or(&self.raw)
    }

    /// Release tag form, always `v`-prefixed.
    pub fn tag(&self) -> String {
        format!("v{}", self.normalized())
    }

    pub fn is_dev(&self) -> bool {
        let normalized = self.normalized();
        normalized.is_empty()
            || normalized.to_ascii_lowercase().contains("dev")
            || normalized.starts_with("0.0.0")
    }

    pub fn matches(&self, other: &VersionString) -> bool {
        if self.is_dev() || other.is_dev() {
            return false;
        }
        self.normalized() == other.normalized()
    }

    pub fn as_semver(&self) -> Option<Version> {
        Version::parse(self.normalized()).ok()
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.normalized())
    }
}

impl From<&str> for VersionString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VersionString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
