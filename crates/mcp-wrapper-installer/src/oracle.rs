use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use mcp_wrapper_core::{Result, VersionString, WrapperConfig};
use tracing::debug;

use crate::release::ReleaseSource;

const VERSION_FLAG: &str = "-version";
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const SPAWN_ATTEMPTS: usize = 3;

/// Extracts the version from the first line of a `-version` report.
///
/// `"mcp-toolkit version v1.5.2"` yields `1.5.2`. When no `version` token is present the
/// first `v<digit>...` token containing a dot is used instead.
pub fn parse_version(output: &str) -> Option<VersionString> {
    let first_line = output.trim().lines().next()?;
    let tokens = first_line.split_whitespace().collect::<Vec<_>>();

    if let Some(index) = tokens.iter().position(|token| *token == "version") {
        if let Some(value) = tokens.get(index + 1) {
            return Some(VersionString::new(value.trim_start_matches('v')));
        }
    }

    tokens
        .iter()
        .find(|token| {
            let mut chars = token.chars();
            chars.next() == Some('v')
                && chars.next().is_some_and(|c| c.is_ascii_digit())
                && token.contains('.')
        })
        .map(|token| VersionString::new(token.trim_start_matches('v')))
}

/// Asks the binary at `path` for its version. Any failure means "unknown".
pub fn current_installed_version(path: &Path, timeout: Duration) -> Option<VersionString> {
    if !path.is_file() {
        return None;
    }

    let mut child = match spawn_version_query(path) {
        Ok(child) => child,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "version query failed to start");
            return None;
        }
    };

    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut buffer = String::new();
        stdout.read_to_string(&mut buffer).map(|_| buffer)
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                debug!(path = %path.display(), ?timeout, "version query timed out");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "version query wait failed");
                let _ = child.kill();
                return None;
            }
        }
    };

    let output = reader.join().ok()?.ok()?;
    if !status.success() {
        debug!(path = %path.display(), %status, "version query exited unsuccessfully");
        return None;
    }
    parse_version(&output)
}

fn spawn_version_query(path: &Path) -> io::Result<Child> {
    let mut attempt = 1;
    loop {
        let result = Command::new(path)
            .arg(VERSION_FLAG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();
        match result {
            // ETXTBSY: another thread still holds a freshly written binary open.
            Err(err) if err.raw_os_error() == Some(26) && attempt < SPAWN_ATTEMPTS => {
                attempt += 1;
                thread::sleep(Duration::from_millis(50));
            }
            other => return other,
        }
    }
}

/// Determines installed and target versions for the reconciler.
pub struct VersionOracle<'a> {
    wrapper_version: VersionString,
    query_timeout: Duration,
    source: &'a dyn ReleaseSource,
}

impl<'a> VersionOracle<'a> {
    pub fn new(config: &WrapperConfig, source: &'a dyn ReleaseSource) -> Self {
        Self {
            wrapper_version: config.wrapper_version.clone(),
            query_timeout: config.version_query_timeout,
            source,
        }
    }

    pub fn wrapper_version(&self) -> &VersionString {
        &self.wrapper_version
    }

    pub fn installed_version(&self, path: &Path) -> Option<VersionString> {
        current_installed_version(path, self.query_timeout)
    }

    pub fn latest_remote_version(&self) -> Result<VersionString> {
        self.source.latest_version()
    }

    /// An explicit request wins, a released wrapper pins its own version, and a
    /// development wrapper follows the latest release.
    pub fn target_version(&self, requested: Option<&VersionString>) -> Result<VersionString> {
        if let Some(requested) = requested.filter(|version| !version.is_dev()) {
            return Ok(requested.clone());
        }
        if !self.wrapper_version.is_dev() {
            return Ok(VersionString::new(self.wrapper_version.tag()));
        }
        self.latest_remote_version()
    }
}
