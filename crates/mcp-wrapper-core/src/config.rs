use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, WrapperError};
use crate::version::VersionString;

pub const DEFAULT_TOOLKIT_NAME: &str = "mcp-toolkit";
pub const DEFAULT_PACKAGE_NAME: &str = "mcp-sandbox-toolkit";
pub const DEFAULT_REPO: &str = "shibingli/mcp-toolkit";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://github.com";

pub const CONFIG_PATH_ENV: &str = "MCP_WRAPPER_CONFIG";
const REPO_ENV: &str = "MCP_WRAPPER_REPO";
const API_URL_ENV: &str = "MCP_WRAPPER_API_URL";
const DOWNLOAD_URL_ENV: &str = "MCP_WRAPPER_DOWNLOAD_URL";
const EMBEDDED_ENV: &str = "MCP_WRAPPER_EMBEDDED";

/// Whether the toolkit binary is expected to ship next to the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddedMode {
    /// Use the bundled binary when it exists on disk, download otherwise.
    Auto,
    /// Always use the bundled binary; never download.
    Enabled,
    /// Ignore any bundled binary and manage a downloaded one.
    Disabled,
}

impl EmbeddedMode {
    pub fn build_default() -> Self {
        if cfg!(feature = "embedded") {
            Self::Enabled
        } else {
            Self::Auto
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "enabled" | "on" | "true" | "1" => Some(Self::Enabled),
            "disabled" | "off" | "false" | "0" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperConfig {
    pub toolkit_name: String,
    pub package_name: String,
    pub repo: String,
    pub api_base_url: String,
    pub download_base_url: String,
    pub wrapper_version: VersionString,
    pub embedded: EmbeddedMode,
    pub cache_subdir: String,
    pub version_query_timeout: Duration,
    pub release_index_timeout: Duration,
    pub download_timeout: Option<Duration>,
    pub embedded_dir: Option<PathBuf>,
    pub scripts_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    toolkit_name: Option<String>,
    package_name: Option<String>,
    repo: Option<String>,
    api_base_url: Option<String>,
    download_base_url: Option<String>,
    embedded: Option<EmbeddedMode>,
    cache_subdir: Option<String>,
    version_query_timeout_secs: Option<u64>,
    release_index_timeout_secs: Option<u64>,
    download_timeout_secs: Option<u64>,
    embedded_dir: Option<PathBuf>,
    scripts_dir: Option<PathBuf>,
    user_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
}

impl WrapperConfig {
    pub fn new(wrapper_version: impl Into<VersionString>) -> Self {
        Self {
            toolkit_name: DEFAULT_TOOLKIT_NAME.to_string(),
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            repo: DEFAULT_REPO.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            wrapper_version: wrapper_version.into(),
            embedded: EmbeddedMode::build_default(),
            cache_subdir: DEFAULT_TOOLKIT_NAME.to_string(),
            version_query_timeout: Duration::from_secs(10),
            release_index_timeout: Duration::from_secs(30),
            download_timeout: None,
            embedded_dir: None,
            scripts_dir: None,
            user_dir: None,
            cache_dir: None,
        }
    }

    /// Defaults, then the config file (if any), then environment overrides.
    pub fn load(wrapper_version: impl Into<VersionString>) -> Result<Self> {
        let mut config = Self::new(wrapper_version);
        if let Some(path) = config_file_path() {
            if let Some(content) = read_optional(&path)? {
                config.apply_file(&content).map_err(|err| {
                    WrapperError::Config(format!("{}: {err}", path.display()))
                })?;
            }
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_file(&mut self, content: &str) -> Result<()> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|err| WrapperError::Config(err.to_string()))?;

        overwrite(&mut self.toolkit_name, file.toolkit_name);
        overwrite(&mut self.package_name, file.package_name);
        overwrite(&mut self.repo, file.repo);
        overwrite(&mut self.api_base_url, file.api_base_url);
        overwrite(&mut self.download_base_url, file.download_base_url);
        overwrite(&mut self.embedded, file.embedded);
        overwrite(&mut self.cache_subdir, file.cache_subdir);
        if let Some(secs) = file.version_query_timeout_secs {
            self.version_query_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.release_index_timeout_secs {
            self.release_index_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.download_timeout_secs {
            self.download_timeout = Some(Duration::from_secs(secs));
        }
        self.embedded_dir = file.embedded_dir.or(self.embedded_dir.take());
        self.scripts_dir = file.scripts_dir.or(self.scripts_dir.take());
        self.user_dir = file.user_dir.or(self.user_dir.take());
        self.cache_dir = file.cache_dir.or(self.cache_dir.take());

        self.validate()
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        overwrite(&mut self.repo, non_empty(REPO_ENV));
        overwrite(&mut self.api_base_url, non_empty(API_URL_ENV));
        overwrite(&mut self.download_base_url, non_empty(DOWNLOAD_URL_ENV));
        if let Some(value) = non_empty(EMBEDDED_ENV) {
            self.embedded = EmbeddedMode::parse(&value).ok_or_else(|| {
                WrapperError::Config(format!(
                    "invalid {EMBEDDED_ENV} value '{value}': expected auto, enabled or disabled"
                ))
            })?;
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.toolkit_name.trim().is_empty() {
            return Err(WrapperError::Config("toolkit_name must not be empty".into()));
        }
        match self.repo.split_once('/') {
            Some((org, name)) if !org.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => {
                return Err(WrapperError::Config(format!(
                    "repo '{}' must have the form <org>/<name>",
                    self.repo
                )))
            }
        }
        for url in [&self.api_base_url, &self.download_base_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WrapperError::Config(format!(
                    "base url '{url}' must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }

    pub fn release_index_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base_url.trim_end_matches('/'),
            self.repo
        )
    }

    pub fn download_url(&self, version: &VersionString, file_name: &str) -> String {
        format!(
            "{}/{}/releases/download/{}/{}",
            self.download_base_url.trim_end_matches('/'),
            self.repo,
            version.raw(),
            file_name
        )
    }

    pub fn user_agent(&self) -> String {
        format!("{}-installer", self.toolkit_name)
    }
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(DEFAULT_TOOLKIT_NAME).join("wrapper.toml"))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(WrapperError::io(
            path,
            format!("failed to read config file {}", path.display()),
            err,
        )),
    }
}
