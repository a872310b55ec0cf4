use std::io;
use std::path::PathBuf;

pub type Result<T, E = WrapperError> = std::result::Result<T, E>;

/// Failure taxonomy shared by the resolver, the fetch pipeline and the reconciler.
///
/// The variant decides recovery: network, download and archive failures fall back to an
/// already installed binary, permission failures move on to the next install location,
/// and an unsupported platform is always fatal.
#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("failed to query release index: {0}")]
    Network(String),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("binary '{binary}' not found in archive {}", archive.display())]
    BinaryNotFoundInArchive { binary: String, archive: PathBuf },

    #[error("failed to extract {}: {reason}", archive.display())]
    Extract { archive: PathBuf, reason: String },

    #[error("permission denied for {}: {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WrapperError {
    /// Wraps an I/O error, promoting `PermissionDenied` to [`WrapperError::Permission`].
    pub fn io(path: impl Into<PathBuf>, context: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            return Self::Permission {
                path: path.into(),
                source,
            };
        }
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission { .. })
    }

    /// True for failures the entry point may recover from by using an existing binary.
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::UnsupportedPlatform(_) | Self::Config(_))
    }
}
