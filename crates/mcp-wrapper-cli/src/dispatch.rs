use std::env;
use std::ffi::{OsStr, OsString};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use mcp_wrapper_core::{EmbeddedMode, PlatformTag, VersionString, WrapperConfig};
use mcp_wrapper_installer::{
    clean_cache, current_installed_version, path_hint, uninstall, BinaryLocation, GithubReleases,
    InstallDecision, InstallLayout, InstallReport, PathHint, Provenance, Reconciler, ShellKind,
    UninstallReport,
};
use tracing::debug;

use crate::launcher;
use crate::render::{render_status_line, OutputStyle, Stream, TerminalRenderer};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Wrapper-level flags. Only the first argument is ever matched against these; anything
/// clap rejects belongs to the toolkit binary.
#[derive(Parser, Debug)]
#[command(
    name = "mcp-sandbox-toolkit",
    disable_help_flag = true,
    disable_version_flag = true
)]
#[command(group(ArgGroup::new("wrapper").multiple(false)))]
struct WrapperFlags {
    #[arg(long, group = "wrapper")]
    install_binary: bool,
    #[arg(long, group = "wrapper")]
    uninstall_binary: bool,
    #[arg(long, group = "wrapper")]
    upgrade_binary: bool,
    #[arg(long, group = "wrapper")]
    binary_version: bool,
    #[arg(long, group = "wrapper")]
    binary_path: bool,
    #[arg(long, group = "wrapper")]
    wrapper_help: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperCommand {
    InstallBinary,
    UninstallBinary,
    UpgradeBinary,
    BinaryVersion,
    BinaryPath,
    WrapperHelp,
}

impl WrapperFlags {
    fn command(&self) -> Option<WrapperCommand> {
        if self.install_binary {
            Some(WrapperCommand::InstallBinary)
        } else if self.uninstall_binary {
            Some(WrapperCommand::UninstallBinary)
        } else if self.upgrade_binary {
            Some(WrapperCommand::UpgradeBinary)
        } else if self.binary_version {
            Some(WrapperCommand::BinaryVersion)
        } else if self.binary_path {
            Some(WrapperCommand::BinaryPath)
        } else if self.wrapper_help {
            Some(WrapperCommand::WrapperHelp)
        } else {
            None
        }
    }
}

pub fn parse_wrapper_command(first: &OsStr) -> Option<WrapperCommand> {
    WrapperFlags::try_parse_from([OsStr::new("mcp-sandbox-toolkit"), first])
        .ok()?
        .command()
}

struct WrapperContext {
    config: WrapperConfig,
    platform: PlatformTag,
    layout: InstallLayout,
}

impl WrapperContext {
    fn load() -> Result<Self> {
        let config = WrapperConfig::load(env!("CARGO_PKG_VERSION"))
            .context("failed to load wrapper configuration")?;
        let platform = PlatformTag::identify()?;
        let layout = InstallLayout::discover(&config, platform)
            .context("failed to determine install locations")?;
        Ok(Self {
            config,
            platform,
            layout,
        })
    }

    fn toolkit_name(&self) -> &str {
        &self.config.toolkit_name
    }

    fn mode(&self) -> &'static str {
        if self.layout.embedded_binary_path().is_some() {
            "embedded"
        } else {
            "download"
        }
    }
}

/// Entry point for `mcp-sandbox-toolkit`. `args` is the full argv including the program
/// name; the return value is the process exit code.
pub fn run(args: Vec<OsString>) -> i32 {
    let forwarded = args.into_iter().skip(1).collect::<Vec<_>>();
    let command = forwarded
        .first()
        .and_then(|first| parse_wrapper_command(first));

    let result = match command {
        Some(command) => run_command(command),
        None => run_launch(&forwarded),
    };
    result.unwrap_or_else(|err| {
        report_error(&err);
        EXIT_FAILURE
    })
}

/// Entry point for `mcp-sandbox-toolkit-uninstall`.
pub fn run_uninstaller() -> i32 {
    let renderer = TerminalRenderer::current(Stream::Stdout);
    let ctx = match WrapperContext::load() {
        Ok(ctx) => ctx,
        Err(err) => {
            report_error(&err);
            return EXIT_FAILURE;
        }
    };
    renderer.print_section(&format!("{} uninstaller", ctx.toolkit_name()));

    if let Some(embedded) = ctx.layout.embedded_binary_path() {
        renderer.print_status(
            "step",
            &format!(
                "this package ships an embedded binary ({}); it is removed together with the package",
                embedded.display()
            ),
        );
        match clean_cache(&ctx.layout) {
            Ok(Some(dir)) => {
                renderer.print_status("ok", &format!("removed cache directory: {}", dir.display()))
            }
            Ok(None) => {}
            Err(err) => renderer.print_status("error", &err),
        }
        renderer.print_lines(&package_uninstall_lines(
            "to uninstall the package, run one of the following:",
            &ctx.config.package_name,
        ));
        return EXIT_SUCCESS;
    }

    let report = uninstall(&ctx.layout);
    renderer.print_lines(&format_uninstall_lines(
        &report,
        renderer.style(),
        ctx.toolkit_name(),
    ));
    if !report.success() {
        return EXIT_FAILURE;
    }
    renderer.print_lines(&package_uninstall_lines(
        "to complete uninstallation, run one of the following:",
        &ctx.config.package_name,
    ));
    EXIT_SUCCESS
}

fn run_command(command: WrapperCommand) -> Result<i32> {
    debug!(?command, "wrapper command");
    let ctx = WrapperContext::load()?;
    let renderer = TerminalRenderer::current(Stream::Stdout);

    match command {
        WrapperCommand::InstallBinary | WrapperCommand::UpgradeBinary => {
            let report = reconcile_binary(&ctx, true, renderer)?;
            if report.decision == InstallDecision::FallbackToExisting {
                return Ok(EXIT_FAILURE);
            }
            Ok(EXIT_SUCCESS)
        }
        WrapperCommand::UninstallBinary => {
            let report = uninstall(&ctx.layout);
            renderer.print_lines(&format_uninstall_lines(
                &report,
                renderer.style(),
                ctx.toolkit_name(),
            ));
            Ok(if report.success() {
                EXIT_SUCCESS
            } else {
                EXIT_FAILURE
            })
        }
        WrapperCommand::BinaryVersion => {
            let location = ctx.layout.get_active_location()?;
            let installed =
                current_installed_version(&location.path, ctx.config.version_query_timeout);
            renderer.print_lines(&format_version_lines(
                &ctx.config.wrapper_version,
                installed.as_ref(),
                &location,
                ctx.layout.embedded_mode(),
                ctx.platform,
            ));
            Ok(EXIT_SUCCESS)
        }
        WrapperCommand::BinaryPath => {
            let location = ctx.layout.get_active_location()?;
            println!("{}", location.path.display());
            Ok(EXIT_SUCCESS)
        }
        WrapperCommand::WrapperHelp => {
            print!(
                "{}",
                wrapper_help(ctx.mode(), &ctx.config.package_name, ctx.toolkit_name())
            );
            Ok(EXIT_SUCCESS)
        }
    }
}

fn run_launch(args: &[OsString]) -> Result<i32> {
    let ctx = WrapperContext::load()?;
    let renderer = TerminalRenderer::current(Stream::Stderr);
    let report = reconcile_binary(&ctx, false, renderer)?;
    Ok(launcher::run(report.path(), args))
}

fn reconcile_binary(
    ctx: &WrapperContext,
    force: bool,
    renderer: TerminalRenderer,
) -> Result<InstallReport> {
    let releases = GithubReleases::new(&ctx.config)?;
    let reconciler = Reconciler::new(&ctx.config, &ctx.layout, ctx.platform, &releases);

    let mut download = renderer.start_download("download");
    let result = reconciler.reconcile(None, force, &mut |downloaded, total| {
        download.update(downloaded, total)
    });
    match &result {
        Ok(report) if report.decision.installs() => download.finish_success(),
        _ => download.finish_abandon(),
    }
    let report = result.with_context(|| format!("failed to install {}", ctx.toolkit_name()))?;

    renderer.print_lines(&format_install_lines(
        &report,
        renderer.style(),
        ctx.toolkit_name(),
    ));
    if report.decision.installs() {
        if let Some(dir) = report.location.dir() {
            let hint = path_hint(
                dir,
                env::var_os("PATH").as_deref(),
                ShellKind::detect(ctx.platform.is_windows()),
            );
            renderer.print_lines(&format_path_hint_lines(
                &hint,
                renderer.style(),
                ctx.toolkit_name(),
            ));
        }
    }
    Ok(report)
}

fn report_error(err: &anyhow::Error) {
    let style = crate::render::current_output_style(Stream::Stderr);
    eprintln!("{}", render_status_line(style, "error", &format!("{err:#}")));
}

pub(crate) fn format_install_lines(
    report: &InstallReport,
    style: OutputStyle,
    toolkit_name: &str,
) -> Vec<String> {
    let target = report
        .target_version
        .as_ref()
        .map(VersionString::tag)
        .unwrap_or_else(|| "unknown".to_string());
    let mut lines = Vec::new();

    match report.decision {
        InstallDecision::FreshInstall => {
            lines.push(render_status_line(
                style,
                "ok",
                &format!("installed {toolkit_name} {target}"),
            ));
            lines.push(render_status_line(
                style,
                "step",
                &format!("binary: {}", report.path().display()),
            ));
        }
        InstallDecision::Upgrade => {
            let message = match &report.installed_version {
                Some(from) => format!("upgraded {toolkit_name} {} -> {target}", from.tag()),
                None => format!("reinstalled {toolkit_name} {target}"),
            };
            lines.push(render_status_line(style, "ok", &message));
            lines.push(render_status_line(
                style,
                "step",
                &format!("binary: {}", report.path().display()),
            ));
        }
        InstallDecision::Skip if report.location.provenance == Provenance::Embedded => {
            lines.push(render_status_line(
                style,
                "step",
                &format!("using embedded binary {}", report.path().display()),
            ));
        }
        InstallDecision::Skip => {
            let version = report
                .installed_version
                .as_ref()
                .map(VersionString::tag)
                .unwrap_or(target);
            lines.push(render_status_line(
                style,
                "step",
                &format!(
                    "{toolkit_name} {version} is up to date: {}",
                    report.path().display()
                ),
            ));
        }
        InstallDecision::FallbackToExisting | InstallDecision::Fail => {}
    }

    lines.extend(
        report
            .warnings
            .iter()
            .map(|warning| render_status_line(style, "warn", warning)),
    );
    lines
}

pub(crate) fn format_path_hint_lines(
    hint: &PathHint,
    style: OutputStyle,
    toolkit_name: &str,
) -> Vec<String> {
    let status = match hint {
        PathHint::OnPath { .. } => "ok",
        PathHint::Missing { .. } => "warn",
    };
    hint.lines(toolkit_name)
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            if index == 0 {
                render_status_line(style, status, &line)
            } else {
                line
            }
        })
        .collect()
}

pub(crate) fn format_uninstall_lines(
    report: &UninstallReport,
    style: OutputStyle,
    toolkit_name: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    for path in &report.removed {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("removed binary: {}", path.display()),
        ));
    }
    for (path, reason) in &report.failed {
        lines.push(render_status_line(
            style,
            "error",
            &format!("failed to remove binary {}: {reason}", path.display()),
        ));
    }
    if !report.found_any() {
        lines.push(render_status_line(
            style,
            "step",
            "no binary files found to remove",
        ));
    }
    if let Some(dir) = &report.cache_removed {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("removed cache directory: {}", dir.display()),
        ));
    }
    if let Some(reason) = &report.cache_error {
        lines.push(render_status_line(style, "error", reason));
    }
    if let Some(dir) = &report.removed_user_dir {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("removed empty directory: {}", dir.display()),
        ));
    }
    if report.success() {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("{toolkit_name} binary uninstalled"),
        ));
    }
    lines
}

pub(crate) fn format_version_lines(
    wrapper_version: &VersionString,
    installed: Option<&VersionString>,
    location: &BinaryLocation,
    embedded_mode: EmbeddedMode,
    platform: PlatformTag,
) -> Vec<String> {
    vec![
        format!("Wrapper version: {wrapper_version}"),
        match installed {
            Some(version) => format!("Binary version: {version}"),
            None => "Binary: not installed".to_string(),
        },
        format!("Binary path: {}", location.path.display()),
        format!("Binary source: {}", location.provenance.as_str()),
        format!("Embedded mode: {}", embedded_mode.as_str()),
        format!("Platform: {platform}"),
    ]
}

pub(crate) fn package_uninstall_lines(heading: &str, package_name: &str) -> Vec<String> {
    vec![
        String::new(),
        heading.to_string(),
        format!("  pip:   pip uninstall {package_name}"),
        format!("  pipx:  pipx uninstall {package_name}"),
        format!("  uv:    uv pip uninstall {package_name}"),
    ]
}

pub fn wrapper_help(mode: &str, package_name: &str, toolkit_name: &str) -> String {
    format!(
        "{toolkit_name} wrapper

Mode: {mode}

Usage:
  {package_name} [wrapper-option | binary-args...]

Wrapper options (only recognized as the first argument):
  --install-binary     Install the {toolkit_name} binary, replacing any existing copy
  --upgrade-binary     Reinstall the {toolkit_name} binary at the target version
  --uninstall-binary   Remove downloaded binaries and the download cache
  --binary-version     Show wrapper and binary version information
  --binary-path        Show the resolved binary path
  --wrapper-help       Show this help message

All other arguments are passed directly to the {toolkit_name} binary.

Examples:
  {package_name} -version      Show the binary version
  {package_name} --help        Show the binary help
  {package_name} -stdio        Run in stdio mode

Environment:
  MCP_WRAPPER_CONFIG        Path to a wrapper.toml configuration file
  MCP_WRAPPER_REPO          Release repository as <org>/<name>
  MCP_WRAPPER_API_URL       Release index API base URL
  MCP_WRAPPER_DOWNLOAD_URL  Release download base URL
  MCP_WRAPPER_EMBEDDED      auto, enabled or disabled
  MCP_WRAPPER_LOG           Log filter (default: warn)
  MCP_WRAPPER_LOG_JSON      Emit logs as JSON when set to 1

Uninstall:
  pip:   pip uninstall {package_name}
  pipx:  pipx uninstall {package_name}
  uv:    uv pip uninstall {package_name}
"
    )
}
