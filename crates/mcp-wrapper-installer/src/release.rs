use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mcp_wrapper_core::{Result, VersionString, WrapperConfig, WrapperError};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// Progress callback: bytes downloaded so far and the total when the server reports it.
pub type ProgressFn<'a> = dyn FnMut(u64, Option<u64>) + 'a;

/// Remote release host: the "latest release" index plus archive downloads.
pub trait ReleaseSource {
    fn latest_version(&self) -> Result<VersionString>;

    fn download(&self, url: &str, dest: &Path, progress: &mut ProgressFn<'_>) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    index_url: String,
    index_timeout: Duration,
    download_timeout: Option<Duration>,
}

impl GithubReleases {
    pub fn new(config: &WrapperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| WrapperError::Network(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            index_url: config.release_index_url(),
            index_timeout: config.release_index_timeout,
            download_timeout: config.download_timeout,
        })
    }
}

impl ReleaseSource for GithubReleases {
    fn latest_version(&self) -> Result<VersionString> {
        debug!(url = %self.index_url, "querying latest release");
        let response = self
            .client
            .get(&self.index_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(self.index_timeout)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| WrapperError::Network(format!("{}: {err}", self.index_url)))?;

        let body = response
            .text()
            .map_err(|err| WrapperError::Network(format!("{}: {err}", self.index_url)))?;
        let release: LatestRelease = serde_json::from_str(&body).map_err(|err| {
            WrapperError::Network(format!("malformed release index from {}: {err}", self.index_url))
        })?;

        let tag = release.tag_name.trim();
        if tag.is_empty() {
            return Err(WrapperError::Network(format!(
                "release index from {} has an empty tag_name",
                self.index_url
            )));
        }
        Ok(VersionString::new(tag))
    }

    fn download(&self, url: &str, dest: &Path, progress: &mut ProgressFn<'_>) -> Result<()> {
        let download_error = |reason: String| WrapperError::Download {
            url: url.to_string(),
            reason,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                download_error(format!("failed to create cache dir {}: {err}", parent.display()))
            })?;
        }

        info!(%url, dest = %dest.display(), "downloading release archive");
        let mut request = self.client.get(url);
        if let Some(timeout) = self.download_timeout {
            request = request.timeout(timeout);
        }
        let mut response = request
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| download_error(err.to_string()))?;
        let total = response.content_length();

        let part_path = part_path(dest);
        let result = stream_to_file(&mut response, &part_path, total, progress)
            .map_err(download_error)
            .and_then(|()| {
                fs::rename(&part_path, dest).map_err(|err| {
                    download_error(format!("failed to move download into {}: {err}", dest.display()))
                })
            });
        if result.is_err() {
            let _ = fs::remove_file(&part_path);
        }
        result
    }
}

fn stream_to_file(
    reader: &mut dyn Read,
    path: &Path,
    total: Option<u64>,
    progress: &mut ProgressFn<'_>,
) -> std::result::Result<(), String> {
    let mut file =
        File::create(path).map_err(|err| format!("failed to create {}: {err}", path.display()))?;
    let mut buffer = [0_u8; 64 * 1024];
    let mut downloaded = 0_u64;
    progress(0, total);
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|err| format!("failed reading response body: {err}"))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|err| format!("failed writing {}: {err}", path.display()))?;
        downloaded += read as u64;
        progress(downloaded, total);
    }
    file.flush()
        .map_err(|err| format!("failed flushing {}: {err}", path.display()))?;
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    dest.with_file_name(format!(
        "{}.part",
        dest.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("archive")
    ))
}
