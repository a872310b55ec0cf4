use std::path::PathBuf;

use tracing::{info, warn};

use crate::fs_utils::{remove_dir_all_if_exists, remove_dir_if_empty, remove_file_if_exists};
use crate::layout::InstallLayout;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub cache_removed: Option<PathBuf>,
    pub cache_error: Option<String>,
    pub removed_user_dir: Option<PathBuf>,
}

impl UninstallReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.cache_error.is_none()
    }

    pub fn found_any(&self) -> bool {
        !self.removed.is_empty() || !self.failed.is_empty()
    }
}

/// Removes every downloaded binary, the cache directory, and the user fallback directory
/// when it is left empty. The embedded binary belongs to the package and is left alone.
pub fn uninstall(layout: &InstallLayout) -> UninstallReport {
    let mut report = UninstallReport::default();

    for path in layout.uninstall_targets() {
        match remove_file_if_exists(&path) {
            Ok(true) => {
                info!(path = %path.display(), "removed binary");
                report.removed.push(path);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove binary");
                report.failed.push((path, err.to_string()));
            }
        }
    }

    match clean_cache(layout) {
        Ok(removed) => report.cache_removed = removed,
        Err(err) => report.cache_error = Some(err),
    }

    let user_dir = layout.user_dir();
    if remove_dir_if_empty(user_dir) {
        info!(dir = %user_dir.display(), "removed empty directory");
        report.removed_user_dir = Some(user_dir.to_path_buf());
    }

    report
}

/// Deletes the cache directory. `Ok(None)` when there was nothing to delete.
pub fn clean_cache(layout: &InstallLayout) -> Result<Option<PathBuf>, String> {
    let cache_dir = layout.cache_dir();
    match remove_dir_all_if_exists(cache_dir) {
        Ok(true) => {
            info!(dir = %cache_dir.display(), "removed cache directory");
            Ok(Some(cache_dir.to_path_buf()))
        }
        Ok(false) => Ok(None),
        Err(err) => {
            warn!(dir = %cache_dir.display(), error = %err, "failed to remove cache directory");
            Err(format!("failed to remove {}: {err}", cache_dir.display()))
        }
    }
}
