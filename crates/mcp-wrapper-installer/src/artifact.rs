use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use mcp_wrapper_core::{ArchiveType, PlatformTag, Result, VersionString, WrapperConfig, WrapperError};
use tracing::{debug, info};

use crate::fs_utils::remove_dir_all_if_exists;
use crate::layout::InstallLayout;
use crate::release::{ProgressFn, ReleaseSource};

/// A downloaded release archive sitting in the cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub platform: PlatformTag,
    pub version: VersionString,
    pub archive_type: ArchiveType,
}

pub fn archive_file_name(toolkit_name: &str, version: &VersionString, platform: PlatformTag) -> String {
    format!(
        "{toolkit_name}-{}-{}-{}.{}",
        version.raw(),
        platform.os.as_str(),
        platform.arch.as_str(),
        platform.archive_type().as_str()
    )
}

pub fn fetch(
    source: &dyn ReleaseSource,
    config: &WrapperConfig,
    layout: &InstallLayout,
    platform: PlatformTag,
    version: &VersionString,
    progress: &mut ProgressFn<'_>,
) -> Result<Archive> {
    let file_name = archive_file_name(&config.toolkit_name, version, platform);
    let url = config.download_url(version, &file_name);
    let path = layout.archive_path(&file_name);

    info!(%version, %platform, "fetching release archive");
    source.download(&url, &path, progress)?;

    Ok(Archive {
        path,
        platform,
        version: version.clone(),
        archive_type: platform.archive_type(),
    })
}

/// Unpacks `archive` into a fresh `dest` directory and returns the path of the binary
/// named `binary_name`, wherever it sits in the extracted tree.
pub fn extract(archive: &Archive, dest: &Path, binary_name: &str) -> Result<PathBuf> {
    let extract_error = |reason: String| WrapperError::Extract {
        archive: archive.path.clone(),
        reason,
    };

    remove_dir_all_if_exists(dest)
        .map_err(|err| extract_error(format!("failed to clear {}: {err}", dest.display())))?;
    fs::create_dir_all(dest)
        .map_err(|err| extract_error(format!("failed to create {}: {err}", dest.display())))?;

    // The file name wins over the expected type when it names a known format.
    let archive_type = ArchiveType::infer_from_path(&archive.path).unwrap_or(archive.archive_type);
    info!(archive = %archive.path.display(), kind = archive_type.as_str(), "extracting");
    match archive_type {
        ArchiveType::Zip => extract_zip(&archive.path, dest),
        ArchiveType::TarGz => extract_tar_gz(&archive.path, dest),
    }
    .map_err(extract_error)?;

    let found = find_binary(dest, binary_name).map_err(|err| {
        extract_error(format!("failed to scan {}: {err}", dest.display()))
    })?;
    match found {
        Some(path) => {
            debug!(binary = %path.display(), "found binary in archive");
            Ok(path)
        }
        None => Err(WrapperError::BinaryNotFoundInArchive {
            binary: binary_name.to_string(),
            archive: archive.path.clone(),
        }),
    }
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> std::result::Result<(), String> {
    let file = File::open(archive_path)
        .map_err(|err| format!("failed to open {}: {err}", archive_path.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .unpack(dest)
        .map_err(|err| format!("failed to unpack tar.gz archive: {err}"))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> std::result::Result<(), String> {
    let file = File::open(archive_path)
        .map_err(|err| format!("failed to open {}: {err}", archive_path.display()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| format!("failed to open zip archive: {err}"))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| format!("failed to read zip entry {index}: {err}"))?;
        let Some(relative) = entry.enclosed_name() else {
            debug!(name = entry.name(), "skipping zip entry outside the extraction root");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|err| format!("failed to create {}: {err}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }
        let mut out = File::create(&out_path)
            .map_err(|err| format!("failed to create {}: {err}", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .map_err(|err| format!("failed to write {}: {err}", out_path.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;

            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|err| format!("failed to set mode on {}: {err}", out_path.display()))?;
        }
    }
    Ok(())
}

/// Depth-first search in directory-entry name order. Symlinked files match by name;
/// symlinked directories are not followed.
fn find_binary(dir: &Path, binary_name: &str) -> io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        let metadata = fs::symlink_metadata(&path)?;
        if metadata.is_dir() {
            if let Some(found) = find_binary(&path, binary_name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().and_then(|name| name.to_str()) == Some(binary_name)
            && (metadata.is_file() || points_to_file(&path))
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn points_to_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_file())
}
