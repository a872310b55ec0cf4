use std::env;
use std::path::{Path, PathBuf};

use mcp_wrapper_core::{EmbeddedMode, PlatformTag, Result, WrapperConfig, WrapperError};
use tracing::{debug, warn};

use crate::fs_utils::{ensure_dir, is_dir_writable};

/// Where a candidate binary location comes from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provenance {
    Embedded,
    EnvironmentScripts,
    UserFallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::EnvironmentScripts => "environment-scripts",
            Self::UserFallback => "user-fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    pub path: PathBuf,
    pub provenance: Provenance,
}

impl BinaryLocation {
    pub fn new(path: impl Into<PathBuf>, provenance: Provenance) -> Self {
        Self {
            path: path.into(),
            provenance,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    binary_name: String,
    embedded_mode: EmbeddedMode,
    embedded_dir: Option<PathBuf>,
    scripts_dir: Option<PathBuf>,
    user_dir: PathBuf,
    cache_dir: PathBuf,
}

impl InstallLayout {
    pub fn new(
        binary_name: impl Into<String>,
        user_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary_name: binary_name.into(),
            embedded_mode: EmbeddedMode::Auto,
            embedded_dir: None,
            scripts_dir: None,
            user_dir: user_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn with_embedded_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.embedded_dir = Some(dir.into());
        self
    }

    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = Some(dir.into());
        self
    }

    pub fn with_embedded_mode(mut self, mode: EmbeddedMode) -> Self {
        self.embedded_mode = mode;
        self
    }

    /// Derives every directory from the running executable, the environment and `config`.
    pub fn discover(config: &WrapperConfig, platform: PlatformTag) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            WrapperError::Config("cannot determine the home directory".to_string())
        })?;
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        let user_dir = config
            .user_dir
            .clone()
            .unwrap_or_else(|| default_user_dir(&home, config, platform));
        let cache_dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(|| home.join(".cache").join(&config.cache_subdir));

        let mut layout = Self::new(platform.binary_name(&config.toolkit_name), user_dir, cache_dir)
            .with_embedded_mode(config.embedded);

        let embedded_dir = config.embedded_dir.clone().or_else(|| {
            exe_dir
                .as_ref()
                .map(|dir| dir.join("..").join("libexec").join(&config.package_name))
        });
        if let Some(dir) = embedded_dir {
            layout = layout.with_embedded_dir(dir);
        }

        let scripts_dir = config
            .scripts_dir
            .clone()
            .or_else(|| virtual_env_scripts_dir(platform))
            .or(exe_dir);
        if let Some(dir) = scripts_dir {
            layout = layout.with_scripts_dir(dir);
        }

        debug!(?layout, "discovered install layout");
        Ok(layout)
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    pub fn embedded_mode(&self) -> EmbeddedMode {
        self.embedded_mode
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    pub fn scripts_dir(&self) -> Option<&Path> {
        self.scripts_dir.as_deref()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.cache_dir.join("extracted")
    }

    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir.join(".install.lock")
    }

    pub fn embedded_binary_path(&self) -> Option<PathBuf> {
        if self.embedded_mode == EmbeddedMode::Disabled {
            return None;
        }
        let path = self.embedded_dir.as_ref()?.join(&self.binary_name);
        path.is_file().then_some(path)
    }

    /// Scripts directory if it is writable, creating it when absent.
    pub fn probe_scripts_dir(&self) -> Option<PathBuf> {
        let dir = self.scripts_dir.as_ref()?;
        if dir.exists() {
            return is_dir_writable(dir).then(|| dir.clone());
        }
        match ensure_dir(dir) {
            Ok(()) => Some(dir.clone()),
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "scripts directory unavailable");
                None
            }
        }
    }

    pub fn ensure_user_dir(&self) -> Result<&Path> {
        ensure_dir(&self.user_dir)?;
        Ok(&self.user_dir)
    }

    /// Locations a downloaded binary may live in, highest priority first.
    ///
    /// An unusable user directory is skipped while the scripts directory is available;
    /// its error is returned only when no candidate is left.
    pub fn download_candidates(&self) -> Result<Vec<BinaryLocation>> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(dir) = self.probe_scripts_dir() {
            candidates.push(BinaryLocation::new(
                dir.join(&self.binary_name),
                Provenance::EnvironmentScripts,
            ));
        }
        match self.ensure_user_dir() {
            Ok(user_dir) => candidates.push(BinaryLocation::new(
                user_dir.join(&self.binary_name),
                Provenance::UserFallback,
            )),
            Err(err) if candidates.is_empty() => return Err(err),
            Err(err) => warn!(
                dir = %self.user_dir.display(),
                error = %err,
                "user install directory unavailable, skipping it"
            ),
        }
        Ok(candidates)
    }

    pub fn resolve_candidates(&self) -> Result<Vec<BinaryLocation>> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(path) = self.embedded_binary_path() {
            candidates.push(BinaryLocation::new(path, Provenance::Embedded));
        }
        match self.download_candidates() {
            Ok(found) => candidates.extend(found),
            Err(err) if !candidates.is_empty() => {
                debug!(error = %err, "no download location, relying on the embedded binary")
            }
            Err(err) => return Err(err),
        }
        Ok(candidates)
    }

    /// The first candidate holding a binary, or the lowest-priority writable candidate as
    /// the default install target.
    pub fn get_active_location(&self) -> Result<BinaryLocation> {
        let candidates = self.resolve_candidates()?;
        if let Some(existing) = candidates.iter().find(|candidate| candidate.exists()) {
            return Ok(existing.clone());
        }
        candidates.into_iter().last().ok_or_else(|| {
            WrapperError::Config("no install location is available".to_string())
        })
    }

    /// The next lower-priority download candidate after `location`.
    pub fn next_candidate_after(&self, location: &BinaryLocation) -> Result<Option<BinaryLocation>> {
        Ok(self
            .download_candidates()?
            .into_iter()
            .find(|candidate| candidate.provenance > location.provenance))
    }

    /// Every non-embedded path a binary may have been installed to, without creating dirs.
    pub fn uninstall_targets(&self) -> Vec<PathBuf> {
        let mut targets = Vec::with_capacity(2);
        if let Some(dir) = &self.scripts_dir {
            targets.push(dir.join(&self.binary_name));
        }
        let user_binary = self.user_dir.join(&self.binary_name);
        if !targets.contains(&user_binary) {
            targets.push(user_binary);
        }
        targets
    }
}

fn default_user_dir(home: &Path, config: &WrapperConfig, platform: PlatformTag) -> PathBuf {
    if platform.is_windows() {
        let local_app_data = env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("AppData").join("Local"));
        return local_app_data.join("Programs").join(&config.toolkit_name);
    }
    home.join(".local").join("bin")
}

fn virtual_env_scripts_dir(platform: PlatformTag) -> Option<PathBuf> {
    let venv = env::var_os("VIRTUAL_ENV").filter(|value| !value.is_empty())?;
    let bin = if platform.is_windows() { "Scripts" } else { "bin" };
    Some(PathBuf::from(venv).join(bin))
}
