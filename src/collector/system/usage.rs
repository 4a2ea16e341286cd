//! App-usage signal collection from OS usage-tracking stores.
//!
//! macOS tracks per-app foreground time in the Screen Time knowledge
//! store; Windows keeps an equivalent activity cache. Both are SQLite,
//! both are protected, and both vary in schema across OS versions, so
//! every query here has a fallback and every failure degrades to an
//! empty list.

use crate::collector::browser::history::{open_read_only, ScratchCopy};
use crate::core::time::to_cf_seconds;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Usage window.
const USAGE_WINDOW_DAYS: i64 = 7;

/// Apps reported per run.
const APP_LIMIT: usize = 20;

/// Foreground time for one application over the usage window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsage {
    pub app: String,
    pub duration_minutes: i64,
}

/// Collect app usage for the host OS. Every failure path returns empty.
pub async fn app_usage(
    os: &str,
    home: &Path,
    local_data: &Path,
    cache_dir: &Path,
    now: DateTime<Utc>,
) -> Vec<AppUsage> {
    let source = match os {
        "macos" => home.join("Library/Application Support/Knowledge/knowledgeC.db"),
        "windows" => match find_activities_cache(local_data).await {
            Some(db) => db,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    if !source.exists() {
        return Vec::new();
    }

    let os = os.to_string();
    let cache_dir = cache_dir.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let scratch = ScratchCopy::create(&source, &cache_dir)?;
        let conn = open_read_only(scratch.path())?;
        let usage = if os == "macos" {
            knowledge_usage(&conn, now)
        } else {
            activities_usage(&conn, now)
        };
        Ok::<_, crate::collector::browser::history::ExtractError>(usage)
    })
    .await;

    match result {
        Ok(Ok(usage)) => usage,
        Ok(Err(e)) => {
            // Typically EPERM: the store needs Full Disk Access.
            warn!(error = %e, "usage store unavailable");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "usage task failed");
            Vec::new()
        }
    }
}

/// The activity cache lives under a per-account subdirectory.
async fn find_activities_cache(local_data: &Path) -> Option<PathBuf> {
    let root = local_data.join("ConnectedDevicesPlatform");
    let mut entries = tokio::fs::read_dir(&root).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let candidate = entry.path().join("ActivitiesCache.db");
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

/// macOS: sum `/app/usage` stream durations per bundle id over the window.
fn knowledge_usage(conn: &Connection, now: DateTime<Utc>) -> Vec<AppUsage> {
    let cutoff = to_cf_seconds(now - Duration::days(USAGE_WINDOW_DAYS));
    let result = conn
        .prepare(
            "SELECT ZVALUESTRING AS app, \
                    SUM(ZENDDATE - ZSTARTDATE) AS secs \
             FROM ZOBJECT \
             WHERE ZSTREAMNAME = '/app/usage' AND ZSTARTDATE > ?1 \
             GROUP BY app ORDER BY secs DESC LIMIT ?2",
        )
        .and_then(|mut stmt| {
            let rows = stmt.query_map(rusqlite::params![cutoff, APP_LIMIT], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1).unwrap_or(0.0),
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        });

    match result {
        Ok(rows) => rows
            .into_iter()
            .map(|(bundle, secs)| AppUsage {
                app: clean_app_name(&bundle),
                duration_minutes: (secs / 60.0) as i64,
            })
            .filter(|u| u.duration_minutes > 0)
            .collect(),
        Err(e) => {
            warn!(error = %e, "knowledge store query failed");
            Vec::new()
        }
    }
}

/// Windows: sum explicit durations per app; when the schema variant has
/// no end-time column, fall back to activity row counts as the ranking
/// signal (one row approximates one foreground minute).
fn activities_usage(conn: &Connection, now: DateTime<Utc>) -> Vec<AppUsage> {
    let cutoff = (now - Duration::days(USAGE_WINDOW_DAYS)).timestamp();

    let primary = conn
        .prepare(
            "SELECT AppId, SUM(EndTime - StartTime) AS secs \
             FROM Activity WHERE StartTime > ?1 \
             GROUP BY AppId ORDER BY secs DESC LIMIT ?2",
        )
        .and_then(|mut stmt| {
            let rows = stmt.query_map(rusqlite::params![cutoff, APP_LIMIT], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1).unwrap_or(0) / 60,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        });

    let rows = match primary {
        Ok(rows) => rows,
        Err(e) => {
            debug!(error = %e, "duration column absent, falling back to row counts");
            let fallback = conn
                .prepare(
                    "SELECT AppId, COUNT(*) AS cnt \
                     FROM Activity WHERE StartTime > ?1 \
                     GROUP BY AppId ORDER BY cnt DESC LIMIT ?2",
                )
                .and_then(|mut stmt| {
                    let rows = stmt.query_map(rusqlite::params![cutoff, APP_LIMIT], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?;
                    rows.collect::<Result<Vec<_>, _>>()
                });
            match fallback {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(error = %e, "activity cache query failed");
                    return Vec::new();
                }
            }
        }
    };

    rows.into_iter()
        .map(|(app_id, minutes)| AppUsage {
            app: clean_app_name(&parse_app_id(&app_id)),
            duration_minutes: minutes,
        })
        .filter(|u| u.duration_minutes > 0)
        .collect()
}

/// `AppId` is a JSON array of `{application, platform}` entries.
fn parse_app_id(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| {
            v.as_array()?
                .first()?
                .get("application")?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| raw.to_string())
}

/// Turn a bundle or executable identifier into a display name: drop an
/// `.exe` suffix, keep the last dot segment, capitalize its first letter.
pub(crate) fn clean_app_name(identifier: &str) -> String {
    let base = identifier.trim();
    let base = base
        .strip_suffix(".exe")
        .or_else(|| base.strip_suffix(".EXE"))
        .unwrap_or(base);
    let tail = base.rsplit('.').next().unwrap_or(base);
    let mut chars = tail.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => tail.to_string(),
    }
}
