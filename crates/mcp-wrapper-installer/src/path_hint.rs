use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    PowerShell,
    Zsh,
    Fish,
    Bash,
}

impl ShellKind {
    pub fn from_shell_path(shell: &str) -> Self {
        if shell.contains("zsh") {
            Self::Zsh
        } else if shell.contains("fish") {
            Self::Fish
        } else {
            Self::Bash
        }
    }

    pub fn detect(windows: bool) -> Self {
        if windows {
            return Self::PowerShell;
        }
        Self::from_shell_path(&env::var("SHELL").unwrap_or_default())
    }

    pub fn rc_file(self) -> &'static str {
        match self {
            Self::PowerShell => "$PROFILE",
            Self::Zsh => "~/.zshrc",
            Self::Fish => "~/.config/fish/config.fish",
            Self::Bash => "~/.bashrc",
        }
    }
}

/// Whether the install directory is reachable through `PATH` after an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathHint {
    OnPath { dir: PathBuf },
    Missing { dir: PathBuf, shell: ShellKind },
}

impl PathHint {
    pub fn lines(&self, toolkit_name: &str) -> Vec<String> {
        match self {
            Self::OnPath { dir } => vec![
                format!("{} is already in your PATH", dir.display()),
                format!("you can now run '{toolkit_name}' directly"),
            ],
            Self::Missing { dir, shell } => {
                let mut lines = vec![
                    format!("{} is not in your PATH", dir.display()),
                    format!("to run '{toolkit_name}' directly, add it to your PATH:"),
                ];
                match shell {
                    ShellKind::PowerShell => {
                        lines.push(format!("  $env:Path += \";{}\"", dir.display()));
                        lines.push(
                            "  or add it permanently via System Environment Variables".to_string(),
                        );
                    }
                    ShellKind::Fish => {
                        lines.push(format!("  add to {}:", shell.rc_file()));
                        lines.push(format!("  fish_add_path {}", dir.display()));
                    }
                    ShellKind::Zsh | ShellKind::Bash => {
                        lines.push(format!("  add to {}:", shell.rc_file()));
                        lines.push(format!("  export PATH=\"{}:$PATH\"", dir.display()));
                        lines.push(format!("  then reload: source {}", shell.rc_file()));
                    }
                }
                lines
            }
        }
    }
}

pub fn path_hint(install_dir: &Path, path_env: Option<&OsStr>, shell: ShellKind) -> PathHint {
    let on_path = path_env
        .map(|value| env::split_paths(value).any(|entry| entry == install_dir))
        .unwrap_or(false);
    if on_path {
        PathHint::OnPath {
            dir: install_dir.to_path_buf(),
        }
    } else {
        PathHint::Missing {
            dir: install_dir.to_path_buf(),
            shell,
        }
    }
}
