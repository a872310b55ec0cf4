mod archive;
mod config;
mod error;
mod platform;
mod version;

pub use archive::ArchiveType;
pub use config::{
    EmbeddedMode, WrapperConfig, CONFIG_PATH_ENV, DEFAULT_PACKAGE_NAME, DEFAULT_REPO,
    DEFAULT_TOOLKIT_NAME,
};
pub use error::{Result, WrapperError};
pub use platform::{Arch, Os, PlatformTag};
pub use version::VersionString;

#[cfg(test)]
mod tests;
