use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use mcp_wrapper_core::{EmbeddedMode, PlatformTag, VersionString};
use mcp_wrapper_installer::{
    BinaryLocation, InstallDecision, InstallReport, PathHint, Provenance, ShellKind,
    UninstallReport,
};

use crate::dispatch::{
    format_install_lines, format_path_hint_lines, format_uninstall_lines, format_version_lines,
    package_uninstall_lines, parse_wrapper_command, wrapper_help, WrapperCommand,
};
use crate::logging::{LogFormat, LogSettings};
use crate::render::{output_style_for, render_progress_line, render_status_line, OutputStyle};

fn sample_report(decision: InstallDecision) -> InstallReport {
    InstallReport {
        decision,
        location: BinaryLocation::new(
            "/home/dev/.local/bin/mcp-toolkit",
            Provenance::UserFallback,
        ),
        installed_version: None,
        target_version: Some(VersionString::new("v1.6.0")),
        warnings: Vec::new(),
    }
}

#[test]
fn wrapper_flags_are_recognized_as_first_argument() {
    let cases = [
        ("--install-binary", WrapperCommand::InstallBinary),
        ("--uninstall-binary", WrapperCommand::UninstallBinary),
        ("--upgrade-binary", WrapperCommand::UpgradeBinary),
        ("--binary-version", WrapperCommand::BinaryVersion),
        ("--binary-path", WrapperCommand::BinaryPath),
        ("--wrapper-help", WrapperCommand::WrapperHelp),
    ];
    for (flag, expected) in cases {
        assert_eq!(
            parse_wrapper_command(OsStr::new(flag)),
            Some(expected),
            "flag {flag}"
        );
    }
}

#[test]
fn other_arguments_pass_through() {
    for arg in [
        "-stdio",
        "-version",
        "--help",
        "-h",
        "--version",
        "--binary",
        "install-binary",
        "--install-binary=true",
        "--",
        "",
        "serve",
    ] {
        assert_eq!(parse_wrapper_command(OsStr::new(arg)), None, "argument {arg:?}");
    }
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed mcp-toolkit v1.6.0"),
        "installed mcp-toolkit v1.6.0"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed mcp-toolkit v1.6.0"),
        "[OK] installed mcp-toolkit v1.6.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "install failed"),
        "[WARN] install failed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "error", "no binary"),
        "[ERR] no binary"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "step", "binary: /tmp/x"),
        "[..] binary: /tmp/x"
    );
}

#[test]
fn output_style_requires_terminal_without_no_color() {
    assert_eq!(output_style_for(true, false), OutputStyle::Rich);
    assert_eq!(output_style_for(true, true), OutputStyle::Plain);
    assert_eq!(output_style_for(false, false), OutputStyle::Plain);
}

#[test]
fn progress_line_is_only_rendered_in_rich_mode() {
    assert_eq!(
        render_progress_line(OutputStyle::Plain, "download", 10, Some(10), None),
        None
    );

    let line = render_progress_line(
        OutputStyle::Rich,
        "download",
        2048,
        Some(2048),
        Some(Duration::from_millis(1500)),
    )
    .expect("rich mode renders a summary");
    assert!(line.contains("100%"), "unexpected line: {line}");
    assert!(line.ends_with(" complete in 1.500s"), "unexpected line: {line}");

    let unknown_total = render_progress_line(OutputStyle::Rich, "download", 512, None, None)
        .expect("rich mode renders a summary");
    assert!(unknown_total.contains("100%"), "unexpected line: {unknown_total}");
}

#[test]
fn install_lines_report_fresh_install() {
    let report = sample_report(InstallDecision::FreshInstall);
    let lines = format_install_lines(&report, OutputStyle::Plain, "mcp-toolkit");
    assert_eq!(
        lines,
        vec![
            "installed mcp-toolkit v1.6.0".to_string(),
            "binary: /home/dev/.local/bin/mcp-toolkit".to_string(),
        ]
    );
}

#[test]
fn install_lines_report_upgrade_source_version() {
    let mut report = sample_report(InstallDecision::Upgrade);
    report.installed_version = Some(VersionString::new("1.5.2"));
    let lines = format_install_lines(&report, OutputStyle::Rich, "mcp-toolkit");
    assert_eq!(lines[0], "[OK] upgraded mcp-toolkit v1.5.2 -> v1.6.0");

    report.installed_version = None;
    let lines = format_install_lines(&report, OutputStyle::Plain, "mcp-toolkit");
    assert_eq!(lines[0], "reinstalled mcp-toolkit v1.6.0");
}

#[test]
fn install_lines_for_skip_name_the_location() {
    let mut report = sample_report(InstallDecision::Skip);
    report.installed_version = Some(VersionString::new("1.6.0"));
    let lines = format_install_lines(&report, OutputStyle::Plain, "mcp-toolkit");
    assert_eq!(
        lines,
        vec!["mcp-toolkit v1.6.0 is up to date: /home/dev/.local/bin/mcp-toolkit".to_string()]
    );

    report.location = BinaryLocation::new("/opt/pkg/libexec/mcp-toolkit", Provenance::Embedded);
    let lines = format_install_lines(&report, OutputStyle::Plain, "mcp-toolkit");
    assert_eq!(
        lines,
        vec!["using embedded binary /opt/pkg/libexec/mcp-toolkit".to_string()]
    );
}

#[test]
fn install_lines_surface_fallback_warnings() {
    let mut report = sample_report(InstallDecision::FallbackToExisting);
    report.warnings = vec![
        "install failed (failed to query release index: timeout); using existing binary /home/dev/.local/bin/mcp-toolkit"
            .to_string(),
    ];
    let lines = format_install_lines(&report, OutputStyle::Rich, "mcp-toolkit");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[WARN] install failed"));
}

#[test]
fn path_hint_lines_badge_only_the_first_line() {
    let hint = PathHint::Missing {
        dir: PathBuf::from("/home/dev/.local/bin"),
        shell: ShellKind::Bash,
    };
    let lines = format_path_hint_lines(&hint, OutputStyle::Rich, "mcp-toolkit");
    assert_eq!(lines[0], "[WARN] /home/dev/.local/bin is not in your PATH");
    assert!(lines[1..].iter().all(|line| !line.starts_with('[')));
    assert!(lines.contains(&"  add to ~/.bashrc:".to_string()));

    let on_path = PathHint::OnPath {
        dir: PathBuf::from("/home/dev/.local/bin"),
    };
    let lines = format_path_hint_lines(&on_path, OutputStyle::Rich, "mcp-toolkit");
    assert_eq!(lines[0], "[OK] /home/dev/.local/bin is already in your PATH");
}

#[test]
fn uninstall_lines_report_removed_paths() {
    let report = UninstallReport {
        removed: vec![PathBuf::from("/home/dev/.local/bin/mcp-toolkit")],
        cache_removed: Some(PathBuf::from("/home/dev/.cache/mcp-toolkit")),
        removed_user_dir: Some(PathBuf::from("/home/dev/.local/bin")),
        ..UninstallReport::default()
    };
    let lines = format_uninstall_lines(&report, OutputStyle::Plain, "mcp-toolkit");
    assert_eq!(
        lines,
        vec![
            "removed binary: /home/dev/.local/bin/mcp-toolkit".to_string(),
            "removed cache directory: /home/dev/.cache/mcp-toolkit".to_string(),
            "removed empty directory: /home/dev/.local/bin".to_string(),
            "mcp-toolkit binary uninstalled".to_string(),
        ]
    );
}

#[test]
fn uninstall_lines_for_nothing_found_still_succeed() {
    let report = UninstallReport::default();
    let lines = format_uninstall_lines(&report, OutputStyle::Plain, "mcp-toolkit");
    assert_eq!(
        lines,
        vec![
            "no binary files found to remove".to_string(),
            "mcp-toolkit binary uninstalled".to_string(),
        ]
    );
}

#[test]
fn uninstall_lines_report_failures_without_success_line() {
    let report = UninstallReport {
        failed: vec![(
            PathBuf::from("/usr/local/bin/mcp-toolkit"),
            "Permission denied (os error 13)".to_string(),
        )],
        ..UninstallReport::default()
    };
    let lines = format_uninstall_lines(&report, OutputStyle::Rich, "mcp-toolkit");
    assert_eq!(
        lines,
        vec![
            "[ERR] failed to remove binary /usr/local/bin/mcp-toolkit: Permission denied (os error 13)"
                .to_string()
        ]
    );
}

#[test]
fn version_lines_mark_missing_binary() {
    let platform = PlatformTag::from_parts("linux", "x86_64").expect("supported");
    let location = BinaryLocation::new(
        "/home/dev/.local/bin/mcp-toolkit",
        Provenance::UserFallback,
    );

    let lines = format_version_lines(
        &VersionString::new("1.5.2"),
        None,
        &location,
        EmbeddedMode::Auto,
        platform,
    );
    assert_eq!(
        lines,
        vec![
            "Wrapper version: 1.5.2".to_string(),
            "Binary: not installed".to_string(),
            "Binary path: /home/dev/.local/bin/mcp-toolkit".to_string(),
            "Binary source: user-fallback".to_string(),
            "Embedded mode: auto".to_string(),
            "Platform: linux-amd64".to_string(),
        ]
    );

    let installed = VersionString::new("1.5.2");
    let embedded = BinaryLocation::new("/opt/venv/libexec/pkg/mcp-toolkit", Provenance::Embedded);
    let lines = format_version_lines(
        &VersionString::new("v1.5.2"),
        Some(&installed),
        &embedded,
        EmbeddedMode::Enabled,
        platform,
    );
    assert_eq!(lines[0], "Wrapper version: 1.5.2");
    assert_eq!(lines[1], "Binary version: 1.5.2");
    assert_eq!(lines[3], "Binary source: embedded");
    assert_eq!(lines[4], "Embedded mode: enabled");
}

#[test]
fn package_uninstall_lines_name_the_package() {
    let lines = package_uninstall_lines("to uninstall the package:", "mcp-sandbox-toolkit");
    assert_eq!(lines[1], "to uninstall the package:");
    assert!(lines.contains(&"  pipx:  pipx uninstall mcp-sandbox-toolkit".to_string()));
    assert!(lines.contains(&"  uv:    uv pip uninstall mcp-sandbox-toolkit".to_string()));
}

#[test]
fn wrapper_help_names_mode_and_flags() {
    let help = wrapper_help("embedded", "mcp-sandbox-toolkit", "mcp-toolkit");
    assert!(help.contains("Mode: embedded"));
    for flag in [
        "--install-binary",
        "--upgrade-binary",
        "--uninstall-binary",
        "--binary-version",
        "--binary-path",
        "--wrapper-help",
    ] {
        assert!(help.contains(flag), "help must mention {flag}");
    }
    assert!(wrapper_help("download", "mcp-sandbox-toolkit", "mcp-toolkit").contains("Mode: download"));
}

#[test]
fn log_settings_default_to_warn_compact() {
    let settings = LogSettings::from_lookup(|_| None);
    assert_eq!(settings.filter, "warn");
    assert_eq!(settings.format, LogFormat::Compact);
}

#[test]
fn log_settings_read_filter_and_json_switch() {
    let settings = LogSettings::from_lookup(|key| match key {
        "MCP_WRAPPER_LOG" => Some("mcp_wrapper_installer=debug".to_string()),
        "MCP_WRAPPER_LOG_JSON" => Some("true".to_string()),
        _ => None,
    });
    assert_eq!(settings.filter, "mcp_wrapper_installer=debug");
    assert_eq!(settings.format, LogFormat::Json);

    let settings = LogSettings::from_lookup(|key| match key {
        "MCP_WRAPPER_LOG" => Some("  ".to_string()),
        "MCP_WRAPPER_LOG_JSON" => Some("0".to_string()),
        _ => None,
    });
    assert_eq!(settings.filter, "warn");
    assert_eq!(settings.format, LogFormat::Compact);
}

#[cfg(unix)]
#[test]
fn exit_code_maps_signals_above_128() {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    assert_eq!(crate::launcher::exit_code(ExitStatus::from_raw(3 << 8)), 3);
    assert_eq!(crate::launcher::exit_code(ExitStatus::from_raw(0)), 0);
    assert_eq!(crate::launcher::exit_code(ExitStatus::from_raw(9)), 137);
    assert_eq!(crate::launcher::exit_code(ExitStatus::from_raw(15)), 143);
}

#[cfg(unix)]
#[test]
fn launcher_propagates_child_exit_code() {
    use std::ffi::OsString;
    use std::path::Path;

    let args = [OsString::from("-c"), OsString::from("exit 7")];
    assert_eq!(crate::launcher::run(Path::new("/bin/sh"), &args), 7);

    let missing = Path::new("/nonexistent/mcp-toolkit");
    assert_eq!(crate::launcher::run(missing, &[]), 1);
}

#[cfg(unix)]
#[test]
fn interrupt_kills_and_reaps_child() {
    use std::process::Command;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    let child = Command::new("/bin/sh")
        .args(["-c", "sleep 30"])
        .spawn()
        .expect("must spawn sleeper");
    let interrupted = AtomicBool::new(true);

    let started = Instant::now();
    let code = crate::launcher::supervise(child, &interrupted, Duration::from_millis(100));
    assert_eq!(code, 0);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "child must be killed instead of awaited"
    );
}

#[cfg(unix)]
#[test]
fn child_exiting_during_grace_period_reports_success() {
    use std::process::Command;
    use std::sync::atomic::AtomicBool;

    let child = Command::new("/bin/sh")
        .args(["-c", "exit 3"])
        .spawn()
        .expect("must spawn child");
    let interrupted = AtomicBool::new(true);

    assert_eq!(
        crate::launcher::supervise(child, &interrupted, Duration::from_secs(5)),
        0
    );

    let child = Command::new("/bin/sh")
        .args(["-c", "exit 3"])
        .spawn()
        .expect("must spawn child");
    assert_eq!(
        crate::launcher::supervise(child, &AtomicBool::new(false), Duration::from_secs(5)),
        3
    );
}
