//! Development-environment signal collection.
//!
//! Three cheap probes: which dotfiles exist in the home directory, who
//! the user is according to their VCS config, and which language
//! runtimes and version managers are installed. The VCS identity also
//! feeds the identity map so the user's own name is pseudonymized in
//! the digest.

use crate::probe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Timeout for each `--version` style probe.
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Dotfiles checked for presence, relative to the home directory.
const DOTFILE_CANDIDATES: [&str; 10] = [
    ".zshrc",
    ".bashrc",
    ".bash_profile",
    ".vimrc",
    ".tmux.conf",
    ".gitconfig",
    ".emacs",
    ".config/nvim",
    ".config/fish",
    ".ssh/config",
];

/// Version-manager directories signalling an installed toolchain.
const TOOLCHAIN_DIRS: [(&str, &str); 6] = [
    (".nvm", "Node (nvm)"),
    (".pyenv", "Python (pyenv)"),
    (".rbenv", "Ruby (rbenv)"),
    (".rustup", "Rust"),
    (".cargo", "Rust (cargo)"),
    (".sdkman", "JVM (sdkman)"),
];

/// Runtime binaries probed with a version flag.
const RUNTIME_PROBES: [(&str, &[&str], &str); 5] = [
    ("node", &["--version"], "Node.js"),
    ("python3", &["--version"], "Python"),
    ("go", &["version"], "Go"),
    ("rustc", &["--version"], "Rust"),
    ("docker", &["--version"], "Docker"),
];

/// Development-environment signals for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevEnvSignals {
    /// Dotfiles present in the home directory.
    pub dotfiles: Vec<String>,
    /// `git config user.name`, when set.
    pub git_name: Option<String>,
    /// `git config user.email`, when set.
    pub git_email: Option<String>,
    /// Detected runtimes/toolchains with their version strings.
    pub runtimes: Vec<RuntimeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: String,
}

impl DevEnvSignals {
    pub fn is_empty(&self) -> bool {
        self.dotfiles.is_empty()
            && self.git_name.is_none()
            && self.git_email.is_none()
            && self.runtimes.is_empty()
    }
}

/// Collects development-environment signals.
pub struct DevEnvCollector {
    home: PathBuf,
}

impl DevEnvCollector {
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Explicit home directory (tests).
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub async fn collect(&self) -> DevEnvSignals {
        let (dotfiles, identity, runtimes) = tokio::join!(
            scan_dotfiles(&self.home),
            git_identity(),
            detect_runtimes(&self.home),
        );
        let (git_name, git_email) = identity;
        DevEnvSignals {
            dotfiles,
            git_name,
            git_email,
            runtimes,
        }
    }
}

impl Default for DevEnvCollector {
    fn default() -> Self {
        Self::new()
    }
}

async fn scan_dotfiles(home: &Path) -> Vec<String> {
    let mut present = Vec::new();
    for candidate in DOTFILE_CANDIDATES {
        if tokio::fs::try_exists(home.join(candidate)).await.unwrap_or(false) {
            present.push(candidate.to_string());
        }
    }
    present
}

/// VCS identity via `git config`. Missing git or unset keys are normal.
async fn git_identity() -> (Option<String>, Option<String>) {
    let name = git_config("user.name").await;
    let email = git_config("user.email").await;
    (name, email)
}

async fn git_config(key: &str) -> Option<String> {
    match probe::run_command("git", &["config", "--get", key], VERSION_PROBE_TIMEOUT).await {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) => None,
        Err(e) => {
            debug!(key, error = %e, "git config unavailable");
            None
        }
    }
}

async fn detect_runtimes(home: &Path) -> Vec<RuntimeInfo> {
    let mut runtimes = Vec::new();

    for (dir, label) in TOOLCHAIN_DIRS {
        if tokio::fs::try_exists(home.join(dir)).await.unwrap_or(false) {
            runtimes.push(RuntimeInfo {
                name: label.to_string(),
                version: "installed".to_string(),
            });
        }
    }

    for (binary, args, label) in RUNTIME_PROBES {
        if let Ok(version) = probe::run_command(binary, args, VERSION_PROBE_TIMEOUT).await {
            // `--version` output is a single line on every probed tool.
            let version = version.lines().next().unwrap_or("").trim().to_string();
            if !version.is_empty() {
                runtimes.push(RuntimeInfo {
                    name: label.to_string(),
                    version,
                });
            }
        }
    }

    runtimes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_dotfile_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".zshrc"), b"export EDITOR=nvim").unwrap();
        fs::create_dir_all(dir.path().join(".config/nvim")).unwrap();

        let found = scan_dotfiles(dir.path()).await;
        assert!(found.contains(&".zshrc".to_string()));
        assert!(found.contains(&".config/nvim".to_string()));
        assert!(!found.contains(&".vimrc".to_string()));
    }

    #[tokio::test]
    async fn test_toolchain_dirs_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".cargo")).unwrap();

        let runtimes = detect_runtimes(dir.path()).await;
        assert!(runtimes.iter().any(|r| r.name == "Rust (cargo)"));
    }

    #[tokio::test]
    async fn test_empty_home_mostly_empty() {
        let dir = tempfile::tempdir().unwrap();
        let signals = DevEnvCollector::with_home(dir.path()).collect().await;
        assert!(signals.dotfiles.is_empty());
        // git/runtime probes depend on the host; dotfiles must not.
    }
}
