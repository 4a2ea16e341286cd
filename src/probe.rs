//! OS-native command probes.
//!
//! Every detection step in the pipeline that shells out goes through
//! [`run_command`]: a single, timeout-bounded, read-only command runner.
//! Probes never mutate system state; a missing binary, non-zero exit, or
//! timeout is an ordinary [`ProbeError`] the caller treats as "unknown"
//! before moving to its next detection strategy.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for detection probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from OS command probes.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}")]
    NonZeroExit { command: String, status: i32 },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` produced unparseable output: {reason}")]
    Parse { command: String, reason: String },
}

/// Run a command and return its trimmed stdout.
pub async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, ProbeError> {
    let label = if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    };
    debug!(command = %label, "running probe");

    let output = tokio::time::timeout(timeout, Command::new(program).args(args).output())
        .await
        .map_err(|_| ProbeError::Timeout {
            command: label.clone(),
            timeout,
        })?
        .map_err(|source| ProbeError::Spawn {
            command: label.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::NonZeroExit {
            command: label,
            status: output.status.code().unwrap_or(-1),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Enumerate running process names, lowercased.
///
/// Windows: `tasklist /FO CSV /NH`; macOS/Linux: `ps -eo comm`.
pub async fn running_processes() -> Result<Vec<String>, ProbeError> {
    if std::env::consts::OS == "windows" {
        let out = run_command("tasklist", &["/FO", "CSV", "/NH"], DEFAULT_PROBE_TIMEOUT).await?;
        Ok(out
            .lines()
            .filter_map(|line| line.split("\",\"").next())
            .map(|name| name.trim_start_matches('"').trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect())
    } else {
        let out = run_command("ps", &["-eo", "comm"], DEFAULT_PROBE_TIMEOUT).await?;
        Ok(out
            .lines()
            .skip(1) // header row
            .map(|line| {
                line.trim()
                    .rsplit('/')
                    .next()
                    .unwrap_or(line.trim())
                    .to_lowercase()
            })
            .filter(|name| !name.is_empty())
            .collect())
    }
}

/// Convert a property list (binary or XML) to JSON via `plutil`.
pub async fn plutil_json(path: &Path) -> Result<Value, ProbeError> {
    let path_str = path.to_string_lossy();
    let out = run_command(
        "plutil",
        &["-convert", "json", "-o", "-", path_str.as_ref()],
        DEFAULT_PROBE_TIMEOUT,
    )
    .await?;
    serde_json::from_str(&out).map_err(|e| ProbeError::Parse {
        command: format!("plutil -convert json {path_str}"),
        reason: e.to_string(),
    })
}

/// Windows: the ProgId registered as the HTTP protocol handler.
pub async fn reg_query_progid() -> Result<String, ProbeError> {
    let out = run_command(
        "reg",
        &[
            "query",
            r"HKCU\Software\Microsoft\Windows\Shell\Associations\UrlAssociations\http\UserChoice",
            "/v",
            "ProgId",
        ],
        DEFAULT_PROBE_TIMEOUT,
    )
    .await?;

    // Output shape: "    ProgId    REG_SZ    ChromeHTML"
    out.lines()
        .find(|line| line.contains("ProgId"))
        .and_then(|line| line.split_whitespace().last())
        .map(|s| s.to_string())
        .ok_or_else(|| ProbeError::Parse {
            command: "reg query UserChoice".to_string(),
            reason: "no ProgId row in output".to_string(),
        })
}

/// macOS: raw LaunchServices handler dump, with a Perl fallback for
/// systems where the secure preferences file is not readable.
pub async fn launchservices_handlers() -> Result<String, ProbeError> {
    let primary = run_command(
        "defaults",
        &[
            "read",
            "com.apple.launchservices/com.apple.launchservices.secure",
            "LSHandlers",
        ],
        DEFAULT_PROBE_TIMEOUT,
    )
    .await;

    match primary {
        Ok(out) if !out.is_empty() => Ok(out),
        _ => {
            run_command(
                "perl",
                &[
                    "-MMac::InternetConfig",
                    "-le",
                    r#"print +(GetICHelper "http")[1]"#,
                ],
                DEFAULT_PROBE_TIMEOUT,
            )
            .await
        }
    }
}

/// Linux: the default web browser's desktop file name.
pub async fn xdg_default_browser() -> Result<String, ProbeError> {
    run_command(
        "xdg-settings",
        &["get", "default-web-browser"],
        DEFAULT_PROBE_TIMEOUT,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let out = run_command("echo", &["hello"], DEFAULT_PROBE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let err = run_command("false", &[], DEFAULT_PROBE_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_run_command_missing_binary() {
        let err = run_command("definitely-not-a-real-binary", &[], DEFAULT_PROBE_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_timeout() {
        let err = run_command("sleep", &["5"], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_running_processes_nonempty() {
        match running_processes().await {
            Ok(procs) => {
                assert!(!procs.is_empty());
                // Process names come back lowercased.
                assert!(procs.iter().all(|p| p == &p.to_lowercase()));
            }
            // Minimal environments may not ship `ps` at all.
            Err(ProbeError::Spawn { .. }) => {}
            Err(e) => panic!("unexpected probe error: {e}"),
        }
    }
}
