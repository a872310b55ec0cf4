use std::path::Path;

use mcp_wrapper_core::{EmbeddedMode, PlatformTag, Result, VersionString, WrapperConfig, WrapperError};
use tracing::{debug, info, warn};

use crate::artifact::{extract, fetch};
use crate::fs_utils::{cleanup_path, replace_file, set_executable};
use crate::layout::{BinaryLocation, InstallLayout, Provenance};
use crate::lock::InstallLock;
use crate::oracle::VersionOracle;
use crate::release::{ProgressFn, ReleaseSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallDecision {
    Skip,
    FreshInstall,
    Upgrade,
    FallbackToExisting,
    Fail,
}

impl InstallDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::FreshInstall => "fresh-install",
            Self::Upgrade => "upgrade",
            Self::FallbackToExisting => "fallback-to-existing",
            Self::Fail => "fail",
        }
    }

    pub fn installs(self) -> bool {
        matches!(self, Self::FreshInstall | Self::Upgrade)
    }

    /// What a failed fetch or install turns into: keep running the binary that is already
    /// there when the error allows it, otherwise give up.
    pub fn after_failure(err: &WrapperError, active_exists: bool) -> Self {
        if err.allows_fallback() && active_exists {
            Self::FallbackToExisting
        } else {
            Self::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileInputs {
    pub embedded_present: bool,
    pub force: bool,
    pub active_exists: bool,
    pub installed_version: Option<VersionString>,
    pub target_version: VersionString,
}

/// The skip/install/upgrade policy. Failure handling happens in [`Reconciler`].
pub fn decide(inputs: &ReconcileInputs) -> InstallDecision {
    if inputs.embedded_present {
        return InstallDecision::Skip;
    }
    if !inputs.active_exists {
        return InstallDecision::FreshInstall;
    }
    if inputs.force {
        return InstallDecision::Upgrade;
    }
    match &inputs.installed_version {
        Some(installed) if installed.matches(&inputs.target_version) => InstallDecision::Skip,
        _ => InstallDecision::Upgrade,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub decision: InstallDecision,
    pub location: BinaryLocation,
    pub installed_version: Option<VersionString>,
    pub target_version: Option<VersionString>,
    pub warnings: Vec<String>,
}

impl InstallReport {
    fn new(decision: InstallDecision, location: BinaryLocation) -> Self {
        Self {
            decision,
            location,
            installed_version: None,
            target_version: None,
            warnings: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.location.path
    }
}

pub struct Reconciler<'a> {
    config: &'a WrapperConfig,
    layout: &'a InstallLayout,
    platform: PlatformTag,
    source: &'a dyn ReleaseSource,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a WrapperConfig,
        layout: &'a InstallLayout,
        platform: PlatformTag,
        source: &'a dyn ReleaseSource,
    ) -> Self {
        Self {
            config,
            layout,
            platform,
            source,
        }
    }

    pub fn oracle(&self) -> VersionOracle<'a> {
        VersionOracle::new(self.config, self.source)
    }

    /// Makes sure a usable binary exists and returns where it is.
    ///
    /// Matching versions return before any lock, download or filesystem write. Failures
    /// while fetching or installing fall back to the binary already at the active
    /// location when there is one.
    pub fn reconcile(
        &self,
        requested: Option<&VersionString>,
        force: bool,
        progress: &mut ProgressFn<'_>,
    ) -> Result<InstallReport> {
        if let Some(embedded) = self.layout.embedded_binary_path() {
            if let Err(err) = set_executable(&embedded) {
                debug!(path = %embedded.display(), error = %err, "could not mark embedded binary executable");
            }
            debug!(path = %embedded.display(), "using embedded binary");
            return Ok(InstallReport::new(
                InstallDecision::Skip,
                BinaryLocation::new(embedded, Provenance::Embedded),
            ));
        }
        if self.layout.embedded_mode() == EmbeddedMode::Enabled {
            return Err(WrapperError::Config(format!(
                "embedded mode is enabled but no bundled {} was found",
                self.layout.binary_name()
            )));
        }

        let active = self.layout.get_active_location()?;
        let oracle = self.oracle();
        let target = match oracle.target_version(requested) {
            Ok(target) => target,
            Err(err) => return self.fall_back(active, None, err),
        };

        let (decision, installed) = self.evaluate(&oracle, &active, &target, force);
        if decision == InstallDecision::Skip {
            debug!(path = %active.path.display(), version = %target, "installed binary is current");
            return Ok(InstallReport {
                installed_version: installed,
                target_version: Some(target),
                ..InstallReport::new(decision, active)
            });
        }

        let lock = match InstallLock::acquire(&self.layout.lock_path()) {
            Ok(lock) => lock,
            Err(err) => return self.fall_back(active, Some(target), err),
        };

        // A concurrent wrapper may have finished the same install while we waited.
        let active = self.layout.get_active_location()?;
        let (decision, installed) = self.evaluate(&oracle, &active, &target, force);
        if decision == InstallDecision::Skip {
            info!(path = %active.path.display(), version = %target, "binary was installed concurrently");
            return Ok(InstallReport {
                installed_version: installed,
                target_version: Some(target),
                ..InstallReport::new(decision, active)
            });
        }

        match installed.as_ref() {
            Some(installed) if is_downgrade(installed, &target) => {
                info!(from = %installed, to = %target, "downgrading binary")
            }
            Some(installed) => info!(from = %installed, to = %target, "upgrading binary"),
            None if decision == InstallDecision::Upgrade => {
                info!(version = %target, "reinstalling binary with unknown version")
            }
            None => info!(version = %target, "installing binary"),
        }

        let outcome = self.install(&active, &target, progress);
        drop(lock);

        match outcome {
            Ok((location, warnings)) => Ok(InstallReport {
                decision,
                location,
                installed_version: installed,
                target_version: Some(target),
                warnings,
            }),
            Err(err) => {
                let mut report = self.fall_back(active, Some(target), err)?;
                report.installed_version = installed;
                Ok(report)
            }
        }
    }

    fn evaluate(
        &self,
        oracle: &VersionOracle<'_>,
        active: &BinaryLocation,
        target: &VersionString,
        force: bool,
    ) -> (InstallDecision, Option<VersionString>) {
        let active_exists = active.exists();
        let installed_version = if active_exists && !force {
            oracle.installed_version(&active.path)
        } else {
            None
        };
        let inputs = ReconcileInputs {
            embedded_present: false,
            force,
            active_exists,
            installed_version,
            target_version: target.clone(),
        };
        let decision = decide(&inputs);
        debug!(
            decision = decision.as_str(),
            active = %active.path.display(),
            installed = ?inputs.installed_version,
            target = %target,
            force,
            "reconciled install state"
        );
        (decision, inputs.installed_version)
    }

    fn install(
        &self,
        active: &BinaryLocation,
        target: &VersionString,
        progress: &mut ProgressFn<'_>,
    ) -> Result<(BinaryLocation, Vec<String>)> {
        let archive = fetch(
            self.source,
            self.config,
            self.layout,
            self.platform,
            target,
            progress,
        )?;

        let mut warnings = Vec::new();
        let extract_dir = self.layout.extract_dir();
        let placed = extract(&archive, &extract_dir, self.layout.binary_name())
            .and_then(|binary| self.place_binary(&binary, active, &mut warnings));

        warnings.extend(cleanup_path(&extract_dir));
        warnings.extend(cleanup_path(&archive.path));

        placed.map(|location| (location, warnings))
    }

    /// Copies the extracted binary to `active`, moving down the candidate list when a
    /// location turns out not to be writable.
    fn place_binary(
        &self,
        binary: &Path,
        active: &BinaryLocation,
        warnings: &mut Vec<String>,
    ) -> Result<BinaryLocation> {
        let mut target = active.clone();
        loop {
            let placed =
                replace_file(binary, &target.path).and_then(|()| set_executable(&target.path));
            match placed {
                Ok(()) => {
                    info!(path = %target.path.display(), "installed binary");
                    return Ok(target);
                }
                Err(err) if err.is_permission() => {
                    let Some(next) = self.layout.next_candidate_after(&target)? else {
                        return Err(err);
                    };
                    warn!(
                        from = %target.path.display(),
                        to = %next.path.display(),
                        error = %err,
                        "install location not writable, trying next candidate"
                    );
                    warnings.push(format!(
                        "{} is not writable; installing to {} instead",
                        target.path.display(),
                        next.path.display()
                    ));
                    target = next;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fall_back(
        &self,
        active: BinaryLocation,
        target: Option<VersionString>,
        err: WrapperError,
    ) -> Result<InstallReport> {
        let decision = InstallDecision::after_failure(&err, active.exists());
        if decision == InstallDecision::Fail {
            warn!(decision = decision.as_str(), error = %err, "install failed");
            return Err(err);
        }

        warn!(
            error = %err,
            path = %active.path.display(),
            "install failed, using existing binary"
        );
        let warning = format!(
            "install failed ({err}); using existing binary {}",
            active.path.display()
        );
        Ok(InstallReport {
            target_version: target,
            warnings: vec![warning],
            ..InstallReport::new(decision, active)
        })
    }
}

fn is_downgrade(installed: &VersionString, target: &VersionString) -> bool {
    match (installed.as_semver(), target.as_semver()) {
        (Some(installed), Some(target)) => installed > target,
        _ => false,
    }
}
