//! Safari history and bookmark collection (macOS).
//!
//! Safari keeps history in its own SQLite schema (`History.db`, timed in
//! CFAbsoluteTime) and bookmarks in a binary property list that `plutil`
//! converts to JSON. The same copy-then-open-read-only discipline as the
//! Chromium extractor applies; Safari files additionally require Full
//! Disk Access, so a permission error degrades to an empty result.

use crate::collector::browser::history::{open_read_only, ExtractError, ScratchCopy};
use crate::collector::browser::types::{BookmarkEntry, BrowserKind, BrowserSignals};
use crate::core::{aggregate_domains, domain_from_url, time::to_cf_seconds};
use crate::probe;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// History window, matching the Chromium extractor.
const RECENT_WINDOW_DAYS: i64 = 7;

/// Row caps.
const HISTORY_ROW_LIMIT: usize = 200;
const BOOKMARK_CAP: usize = 200;

/// Collects Safari signals. Only constructed when the host OS is macOS.
pub struct SafariCollector {
    safari_dir: PathBuf,
    cache_dir: PathBuf,
}

impl SafariCollector {
    pub fn new(home: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            safari_dir: home.into().join("Library/Safari"),
            cache_dir: cache_dir.into(),
        }
    }

    /// Explicit Safari data directory (tests).
    pub fn with_safari_dir(safari_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            safari_dir: safari_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// History domains plus bookmarks. Either half failing leaves the
    /// other intact.
    pub async fn collect(&self, now: DateTime<Utc>) -> BrowserSignals {
        let mut signals = BrowserSignals {
            browser: Some(BrowserKind::Safari),
            ..Default::default()
        };

        let db = self.safari_dir.join("History.db");
        if db.exists() {
            let cache_dir = self.cache_dir.clone();
            let result =
                tokio::task::spawn_blocking(move || history_domains(&db, &cache_dir, now)).await;
            match result {
                Ok(Ok(domains)) => signals.recent_domains = domains,
                Ok(Err(e)) => warn!(error = %e, "safari history unavailable"),
                Err(e) => warn!(error = %e, "safari history task failed"),
            }
        }

        let plist = self.safari_dir.join("Bookmarks.plist");
        if plist.exists() {
            match probe::plutil_json(&plist).await {
                Ok(tree) => signals.bookmarks = walk_bookmarks(&tree),
                Err(e) => warn!(error = %e, "safari bookmarks unavailable"),
            }
        }

        signals
    }
}

/// Query recent visit counts per domain from a scratch copy of
/// `History.db`.
fn history_domains(
    db: &Path,
    cache_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<crate::collector::browser::types::DomainVisit>, ExtractError> {
    let scratch = ScratchCopy::create(db, cache_dir)?;
    let conn = open_read_only(scratch.path())?;

    let cutoff = to_cf_seconds(now - Duration::days(RECENT_WINDOW_DAYS));
    let rows = visit_rows(&conn, cutoff).or_else(|e| {
        // Older schemas lack history_visits: fall back to the per-item
        // lifetime counters.
        debug!(error = %e, "history_visits join failed, using visit_count fallback");
        item_rows(&conn)
    })?;

    let domain_rows = rows
        .into_iter()
        .filter_map(|(url, visits)| domain_from_url(&url).map(|d| (d, visits)));
    Ok(aggregate_domains(domain_rows))
}

fn visit_rows(conn: &Connection, cutoff: i64) -> Result<Vec<(String, i64)>, ExtractError> {
    let mut stmt = conn.prepare(
        "SELECT i.url, COUNT(v.id) AS visits \
         FROM history_visits v \
         JOIN history_items i ON v.history_item = i.id \
         WHERE v.visit_time > ?1 \
         GROUP BY i.url ORDER BY visits DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![cutoff, HISTORY_ROW_LIMIT], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn item_rows(conn: &Connection) -> Result<Vec<(String, i64)>, ExtractError> {
    let mut stmt = conn.prepare(
        "SELECT url, visit_count FROM history_items \
         ORDER BY visit_count DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([HISTORY_ROW_LIMIT], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1).unwrap_or(0),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Recursively walk the bookmarks tree converted to JSON.
///
/// Proxy nodes (Reading List and friends) are skipped; nodes carrying a
/// URL string are leaves tagged with the nearest enclosing folder name;
/// folder nodes recurse into `Children`.
pub(crate) fn walk_bookmarks(tree: &Value) -> Vec<BookmarkEntry> {
    let mut out = Vec::new();
    walk_node(tree, "Bookmarks", &mut out);
    out
}

fn walk_node(node: &Value, folder: &str, out: &mut Vec<BookmarkEntry>) {
    if out.len() >= BOOKMARK_CAP {
        return;
    }
    let Some(obj) = node.as_object() else {
        return;
    };

    if obj
        .get("WebBookmarkType")
        .and_then(Value::as_str)
        .map(|t| t == "WebBookmarkTypeProxy")
        .unwrap_or(false)
    {
        return;
    }

    if let Some(url) = obj.get("URLString").and_then(Value::as_str) {
        let title = obj
            .get("URIDictionary")
            .and_then(|d| d.get("title"))
            .and_then(Value::as_str)
            .unwrap_or(url);
        out.push(BookmarkEntry {
            folder: folder.to_string(),
            title: title.to_string(),
            url: url.to_string(),
        });
        return;
    }

    if let Some(children) = obj.get("Children").and_then(Value::as_array) {
        let name = obj.get("Title").and_then(Value::as_str).unwrap_or(folder);
        for child in children {
            walk_node(child, name, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture_history(path: &Path, with_visits: bool) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "CREATE TABLE history_items (id INTEGER PRIMARY KEY, url TEXT, visit_count INTEGER)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO history_items (id, url, visit_count) VALUES \
             (1, 'https://www.github.com/a', 12), (2, 'https://news.ycombinator.com/', 9)",
            [],
        )
        .unwrap();
        if with_visits {
            conn.execute(
                "CREATE TABLE history_visits (id INTEGER PRIMARY KEY, \
                 history_item INTEGER, visit_time REAL)",
                [],
            )
            .unwrap();
            let now_cf = to_cf_seconds(Utc::now());
            for (item, when) in [(1, now_cf - 3600), (1, now_cf - 7200), (2, now_cf - 60)] {
                conn.execute(
                    "INSERT INTO history_visits (history_item, visit_time) VALUES (?1, ?2)",
                    rusqlite::params![item, when],
                )
                .unwrap();
            }
        }
    }

    #[test]
    fn test_history_domains_joined_window() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History.db");
        fixture_history(&db, true);

        let domains = history_domains(&db, &dir.path().join("cache"), Utc::now()).unwrap();
        assert_eq!(domains[0].domain, "github.com");
        assert_eq!(domains[0].visits, 2);
        assert_eq!(domains[1].domain, "news.ycombinator.com");
    }

    #[test]
    fn test_history_falls_back_without_visits_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History.db");
        fixture_history(&db, false);

        let domains = history_domains(&db, &dir.path().join("cache"), Utc::now()).unwrap();
        assert_eq!(domains[0].domain, "github.com");
        assert_eq!(domains[0].visits, 12);
    }

    #[test]
    fn test_bookmark_walk_skips_proxies() {
        let tree = json!({
            "Children": [
                {
                    "WebBookmarkType": "WebBookmarkTypeProxy",
                    "Title": "com.apple.ReadingList",
                    "Children": [
                        {"URLString": "https://hidden.example.com",
                         "URIDictionary": {"title": "Hidden"}}
                    ]
                },
                {
                    "Title": "Work",
                    "Children": [
                        {"URLString": "https://github.com/org/repo",
                         "URIDictionary": {"title": "Main repo"}},
                        {"URLString": "https://ci.example.com"}
                    ]
                }
            ]
        });

        let entries = walk_bookmarks(&tree);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].folder, "Work");
        assert_eq!(entries[0].title, "Main repo");
        // No URIDictionary title: the URL stands in.
        assert_eq!(entries[1].title, "https://ci.example.com");
    }

    #[test]
    fn test_bookmark_walk_caps_entries() {
        let children: Vec<Value> = (0..500)
            .map(|i| json!({"URLString": format!("https://example.com/{i}")}))
            .collect();
        let tree = json!({"Children": children});
        assert_eq!(walk_bookmarks(&tree).len(), BOOKMARK_CAP);
    }

    #[tokio::test]
    async fn test_collect_missing_files_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let collector =
            SafariCollector::with_safari_dir(dir.path().join("Safari"), dir.path().join("cache"));
        let signals = collector.collect(Utc::now()).await;
        assert!(signals.recent_domains.is_empty());
        assert!(signals.bookmarks.is_empty());
        assert_eq!(signals.browser, Some(BrowserKind::Safari));
    }
}
