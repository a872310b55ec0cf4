use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mcp_wrapper_core::{Result, WrapperError};
use tracing::{debug, warn};

pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Best-effort removal for scratch paths; failures are logged and swallowed.
pub fn cleanup_path(path: &Path) -> Option<String> {
    let result = if path.is_dir() {
        remove_dir_all_if_exists(path)
    } else {
        remove_file_if_exists(path)
    };
    match result {
        Ok(_) => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to clean up");
            Some(format!("failed to clean up {}: {err}", path.display()))
        }
    }
}

/// Removes `dir` only when it has no entries. Never fails.
pub fn remove_dir_if_empty(dir: &Path) -> bool {
    let Ok(mut entries) = fs::read_dir(dir) else {
        return false;
    };
    if entries.next().is_some() {
        return false;
    }
    match fs::remove_dir(dir) {
        Ok(()) => true,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "left empty directory in place");
            false
        }
    }
}

/// Whether the current user may create entries in `dir`. Never touches the directory.
#[cfg(unix)]
pub fn is_dir_writable(dir: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    if !dir.is_dir() {
        return false;
    }
    let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK | libc::X_OK) == 0 }
}

#[cfg(not(unix))]
pub fn is_dir_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
        .unwrap_or(false)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .map_err(|err| WrapperError::io(dir, format!("failed to create {}", dir.display()), err))
}

#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .map_err(|err| WrapperError::io(path, format!("failed to stat {}", path.display()), err))?
        .permissions();
    if permissions.mode() & 0o777 == 0o755 {
        return Ok(());
    }
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).map_err(|err| {
        WrapperError::io(
            path,
            format!("failed to set executable mode on {}", path.display()),
            err,
        )
    })
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Copies `src` next to `dst` first, then renames over `dst` so a reader never sees a
/// partially written binary.
pub fn replace_file(src: &Path, dst: &Path) -> Result<()> {
    let parent = dst.parent().ok_or_else(|| WrapperError::Io {
        context: format!("install target {} has no parent directory", dst.display()),
        source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;
    ensure_dir(parent)?;

    let staged = staged_path(dst);
    if let Err(err) = fs::copy(src, &staged) {
        let _ = fs::remove_file(&staged);
        return Err(WrapperError::io(
            dst,
            format!("failed to copy {} to {}", src.display(), staged.display()),
            err,
        ));
    }

    if let Err(err) = fs::rename(&staged, dst) {
        let _ = fs::remove_file(&staged);
        return Err(WrapperError::io(
            dst,
            format!("failed to move binary into {}", dst.display()),
            err,
        ));
    }
    Ok(())
}

fn staged_path(dst: &Path) -> PathBuf {
    let file_name = dst
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("binary");
    dst.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
}
