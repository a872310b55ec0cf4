use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::*;

#[test]
fn identify_accepts_every_supported_pair() {
    for (os, machine, expected_os, expected_arch) in [
        ("linux", "x86_64", Os::Linux, Arch::Amd64),
        ("linux", "amd64", Os::Linux, Arch::Amd64),
        ("linux", "aarch64", Os::Linux, Arch::Arm64),
        ("darwin", "arm64", Os::Darwin, Arch::Arm64),
        ("macos", "x86_64", Os::Darwin, Arch::Amd64),
        ("windows", "AMD64", Os::Windows, Arch::Amd64),
        ("Windows", "ARM64", Os::Windows, Arch::Arm64),
    ] {
        let tag = PlatformTag::from_parts(os, machine).expect("supported platform must resolve");
        assert_eq!(tag.os, expected_os, "os for {os}/{machine}");
        assert_eq!(tag.arch, expected_arch, "arch for {os}/{machine}");
    }
}

#[test]
fn identify_normalizes_arch_aliases_to_canonical_names() {
    let from_alias = PlatformTag::from_parts("linux", "x86_64").expect("must resolve");
    let from_canonical = PlatformTag::from_parts("linux", "amd64").expect("must resolve");
    assert_eq!(from_alias, from_canonical);
    assert_eq!(from_alias.to_string(), "linux-amd64");
    assert_eq!(
        PlatformTag::from_parts("darwin", "aarch64")
            .expect("must resolve")
            .to_string(),
        "darwin-arm64"
    );
}

#[test]
fn identify_rejects_unsupported_os() {
    let err = PlatformTag::from_parts("freebsd", "x86_64").expect_err("freebsd is unsupported");
    assert!(matches!(err, WrapperError::UnsupportedPlatform(_)));
    assert!(
        err.to_string().contains("unsupported operating system: freebsd"),
        "unexpected error: {err}"
    );
}

#[test]
fn identify_rejects_unsupported_arch() {
    for machine in ["i686", "riscv64", "armv7l", ""] {
        let err = PlatformTag::from_parts("linux", machine)
            .expect_err("architecture must be rejected");
        assert!(
            matches!(err, WrapperError::UnsupportedPlatform(_)),
            "unexpected error for '{machine}': {err}"
        );
    }
}

#[test]
fn host_identification_is_consistent_with_from_parts() {
    match PlatformTag::identify() {
        Ok(tag) => assert_eq!(
            tag,
            PlatformTag::from_parts(std::env::consts::OS, std::env::consts::ARCH)
                .expect("host parts must agree with identify")
        ),
        Err(err) => assert!(matches!(err, WrapperError::UnsupportedPlatform(_))),
    }
}

#[test]
fn binary_name_and_archive_type_follow_os_family() {
    let windows = PlatformTag::from_parts("windows", "amd64").expect("must resolve");
    let linux = PlatformTag::from_parts("linux", "arm64").expect("must resolve");

    assert_eq!(windows.binary_name("mcp-toolkit"), "mcp-toolkit.exe");
    assert_eq!(linux.binary_name("mcp-toolkit"), "mcp-toolkit");
    assert_eq!(windows.archive_type(), ArchiveType::Zip);
    assert_eq!(linux.archive_type(), ArchiveType::TarGz);
    assert_eq!(windows.archive_type().as_str(), "zip");
    assert_eq!(linux.archive_type().as_str(), "tar.gz");
}

#[test]
fn archive_type_inference_uses_file_name() {
    assert_eq!(
        ArchiveType::infer_from_path(Path::new("/cache/mcp-toolkit-v1.5.2-linux-amd64.tar.gz")),
        Some(ArchiveType::TarGz)
    );
    assert_eq!(
        ArchiveType::infer_from_path(Path::new("C:/cache/mcp-toolkit-v1.5.2-windows-amd64.ZIP")),
        Some(ArchiveType::Zip)
    );
    assert_eq!(ArchiveType::infer_from_path(Path::new("/cache/readme.txt")), None);
}

#[test]
fn version_matching_ignores_v_prefix() {
    let tag = VersionString::new("v1.5.2");
    let bare = VersionString::new("1.5.2");
    assert!(tag.matches(&bare));
    assert!(bare.matches(&tag));
    assert_eq!(tag.normalized(), "1.5.2");
    assert_eq!(bare.tag(), "v1.5.2");
    assert_eq!(tag.to_string(), "1.5.2");
    assert!(!bare.matches(&VersionString::new("1.6.0")));
}

#[test]
fn dev_sentinel_never_matches_a_release() {
    let dev = VersionString::new("0.0.0-dev");
    assert!(dev.is_dev());
    assert!(!dev.matches(&VersionString::new("0.0.0-dev")));
    assert!(!dev.matches(&VersionString::new("1.5.2")));
    assert!(VersionString::new("1.6.0.dev3").is_dev());
    assert!(VersionString::new("").is_dev());
    assert!(!VersionString::new("v1.5.2").is_dev());
}

#[test]
fn version_exposes_semver_when_well_formed() {
    let parsed = VersionString::new("v1.5.2")
        .as_semver()
        .expect("release version must parse");
    assert_eq!((parsed.major, parsed.minor, parsed.patch), (1, 5, 2));
    assert!(VersionString::new("nightly").as_semver().is_none());
}

#[test]
fn config_defaults_build_release_urls() {
    let config = WrapperConfig::new("1.5.2");
    assert_eq!(
        config.release_index_url(),
        "https://api.github.com/repos/shibingli/mcp-toolkit/releases/latest"
    );
    assert_eq!(
        config.download_url(
            &VersionString::new("v1.5.2"),
            "mcp-toolkit-v1.5.2-linux-amd64.tar.gz"
        ),
        "https://github.com/shibingli/mcp-toolkit/releases/download/v1.5.2/mcp-toolkit-v1.5.2-linux-amd64.tar.gz"
    );
    assert_eq!(config.user_agent(), "mcp-toolkit-installer");
    assert_eq!(config.version_query_timeout, Duration::from_secs(10));
    assert_eq!(config.release_index_timeout, Duration::from_secs(30));
    assert_eq!(config.download_timeout, None);
}

#[test]
fn config_file_overrides_defaults() {
    let mut config = WrapperConfig::new("1.5.2");
    config
        .apply_file(
            r#"
repo = "acme/toolkit"
api_base_url = "http://127.0.0.1:9000/"
embedded = "disabled"
release_index_timeout_secs = 5
download_timeout_secs = 120
user_dir = "/opt/toolkit/bin"
"#,
        )
        .expect("config file must apply");

    assert_eq!(config.repo, "acme/toolkit");
    assert_eq!(config.embedded, EmbeddedMode::Disabled);
    assert_eq!(config.release_index_timeout, Duration::from_secs(5));
    assert_eq!(config.download_timeout, Some(Duration::from_secs(120)));
    assert_eq!(config.user_dir, Some(PathBuf::from("/opt/toolkit/bin")));
    assert_eq!(
        config.release_index_url(),
        "http://127.0.0.1:9000/repos/acme/toolkit/releases/latest"
    );
    assert_eq!(config.package_name, DEFAULT_PACKAGE_NAME);
}

#[test]
fn config_file_rejects_unknown_keys() {
    let mut config = WrapperConfig::new("1.5.2");
    let err = config
        .apply_file("verify_checksums = true\n")
        .expect_err("unknown keys must be rejected");
    assert!(matches!(err, WrapperError::Config(_)), "unexpected error: {err}");
}

#[test]
fn env_overrides_take_precedence_over_file() {
    let mut config = WrapperConfig::new("1.5.2");
    config
        .apply_file("repo = \"acme/toolkit\"\nembedded = \"auto\"\n")
        .expect("config file must apply");

    let env = HashMap::from([
        ("MCP_WRAPPER_REPO", "mirror/toolkit"),
        ("MCP_WRAPPER_EMBEDDED", "off"),
        ("MCP_WRAPPER_API_URL", "  "),
    ]);
    config
        .apply_env(|key| env.get(key).map(|value| value.to_string()))
        .expect("env must apply");

    assert_eq!(config.repo, "mirror/toolkit");
    assert_eq!(config.embedded, EmbeddedMode::Disabled);
    assert_eq!(config.api_base_url, "https://api.github.com");
}

#[test]
fn env_rejects_invalid_embedded_mode() {
    let mut config = WrapperConfig::new("1.5.2");
    let err = config
        .apply_env(|key| (key == "MCP_WRAPPER_EMBEDDED").then(|| "sometimes".to_string()))
        .expect_err("invalid mode must fail");
    assert!(
        err.to_string()
            .contains("invalid MCP_WRAPPER_EMBEDDED value 'sometimes'"),
        "unexpected error: {err}"
    );
}

#[test]
fn config_rejects_malformed_repo() {
    let mut config = WrapperConfig::new("1.5.2");
    for repo in ["toolkit", "/toolkit", "acme/", "a/b/c"] {
        let err = config
            .apply_file(&format!("repo = \"{repo}\"\n"))
            .expect_err("malformed repo must fail");
        assert!(
            err.to_string().contains("must have the form <org>/<name>"),
            "unexpected error for '{repo}': {err}"
        );
    }
}

#[test]
fn io_errors_promote_permission_denied() {
    let err = WrapperError::io(
        "/usr/bin/mcp-toolkit",
        "failed to copy",
        std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    );
    assert!(err.is_permission());
    assert!(err.allows_fallback());

    let err = WrapperError::io(
        "/tmp/x",
        "failed to copy",
        std::io::Error::from(std::io::ErrorKind::NotFound),
    );
    assert!(!err.is_permission());
    assert!(err.to_string().starts_with("failed to copy: "));
    assert!(!WrapperError::UnsupportedPlatform("x".into()).allows_fallback());
}
