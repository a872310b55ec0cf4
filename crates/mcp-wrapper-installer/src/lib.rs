mod artifact;
mod fs_utils;
mod layout;
mod lock;
mod oracle;
mod path_hint;
mod reconcile;
mod release;
mod uninstall;

pub use artifact::{archive_file_name, extract, fetch, Archive};
pub use layout::{BinaryLocation, InstallLayout, Provenance};
pub use lock::InstallLock;
pub use oracle::{current_installed_version, parse_version, VersionOracle};
pub use path_hint::{path_hint, PathHint, ShellKind};
pub use reconcile::{decide, InstallDecision, InstallReport, ReconcileInputs, Reconciler};
pub use release::{GithubReleases, ProgressFn, ReleaseSource};
pub use uninstall::{clean_cache, uninstall, UninstallReport};
