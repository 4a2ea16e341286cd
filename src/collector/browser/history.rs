//! Chromium history extraction.
//!
//! The live `History` file is usually locked by a running browser, so the
//! extractor never opens it directly: the main file plus its `-wal`/`-shm`
//! siblings are copied into the cache directory under a timestamped name,
//! the copy is opened read-only, and [`ScratchCopy`]'s `Drop` deletes
//! every copied file on all exit paths, including mid-query errors.

use crate::collector::browser::types::{
    BrowserKind, BrowserSignals, BrowserTarget, DomainDetail,
};
use crate::core::{
    aggregate_domains, complement_recent, dedupe_details, is_auth_domain, is_noise_title,
    suppress_low_signal, to_chrome_micros, MAX_DETAILS_PER_DOMAIN,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// How far back the recent-domains window reaches.
const RECENT_WINDOW_DAYS: i64 = 7;

/// Row caps for the domain queries.
const RECENT_DOMAIN_LIMIT: usize = 30;
const ALL_TIME_DOMAIN_LIMIT: usize = 30;

/// How many top domains get a title sample, and how many raw rows each
/// sample reads before noise filtering.
const TOP_DETAIL_DOMAINS: usize = 12;
const TITLE_SAMPLE_ROWS: usize = 40;

/// Cluster labels kept from the `clusters` table.
const CLUSTER_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// A scratch copy of a SQLite store. Files are deleted when the value is
/// dropped, on every exit path.
pub struct ScratchCopy {
    files: Vec<PathBuf>,
}

impl ScratchCopy {
    /// Copy `source` (plus `-wal`/`-shm` siblings when present) into
    /// `cache_dir`. Sibling copy failures are ignored: the main file
    /// alone is still a valid database.
    pub fn create(source: &Path, cache_dir: &Path) -> Result<Self, ExtractError> {
        std::fs::create_dir_all(cache_dir)?;

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        // The source stem keeps concurrent collectors copying different
        // stores from colliding in the shared cache directory.
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase().replace(' ', "-"))
            .unwrap_or_else(|| "store".to_string());
        let base = format!("{stem}-{stamp}");
        let main = cache_dir.join(&base);
        std::fs::copy(source, &main)?;

        let mut files = vec![main];
        for suffix in ["-wal", "-shm"] {
            let mut sibling = source.as_os_str().to_owned();
            sibling.push(suffix);
            let sibling = PathBuf::from(sibling);
            if sibling.exists() {
                let copy = cache_dir.join(format!("{base}{suffix}"));
                match std::fs::copy(&sibling, &copy) {
                    Ok(_) => files.push(copy),
                    Err(e) => debug!(file = %sibling.display(), error = %e, "sibling copy skipped"),
                }
            }
        }

        Ok(Self { files })
    }

    /// Path of the copied main database file.
    pub fn path(&self) -> &Path {
        &self.files[0]
    }
}

impl Drop for ScratchCopy {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = std::fs::remove_file(file) {
                debug!(file = %file.display(), error = %e, "scratch cleanup failed");
            }
        }
    }
}

/// Open a SQLite store strictly read-only. Every collector goes through
/// this so no code path can ever write to a copied store.
pub fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Extracts browser signals from a located Chromium history store.
pub struct HistoryExtractor {
    cache_dir: PathBuf,
}

impl HistoryExtractor {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Copy, open read-only, query, clean up.
    pub async fn extract(&self, target: &BrowserTarget) -> Result<BrowserSignals, ExtractError> {
        let target = target.clone();
        let cache_dir = self.cache_dir.clone();
        tokio::task::spawn_blocking(move || extract_blocking(&target, &cache_dir, Utc::now()))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))?
    }
}

/// Synchronous extraction body, hosted on the blocking pool.
pub(crate) fn extract_blocking(
    target: &BrowserTarget,
    cache_dir: &Path,
    now: DateTime<Utc>,
) -> Result<BrowserSignals, ExtractError> {
    let scratch = ScratchCopy::create(&target.history_path, cache_dir)?;
    let conn = open_read_only(scratch.path())?;
    let mut signals = query_signals(&conn, now)?;
    signals.browser = Some(target.kind);
    Ok(signals)
    // scratch drops here; copies are deleted even when `?` bailed above
}

/// Run the cluster, recent, all-time, and title queries over an open
/// read-only connection.
pub(crate) fn query_signals(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<BrowserSignals, ExtractError> {
    let cluster_labels = query_clusters(conn);

    let cutoff = to_chrome_micros(now - Duration::days(RECENT_WINDOW_DAYS));
    let mut recent_rows = query_domain_rows(conn, Some(cutoff), RECENT_DOMAIN_LIMIT)?;
    if recent_rows.is_empty() {
        // Sparse or stale profile: fall back to the unwindowed variant.
        debug!("recent window empty, falling back to all-time query");
        recent_rows = query_domain_rows(conn, None, RECENT_DOMAIN_LIMIT)?;
    }
    let all_time_rows = query_domain_rows(conn, None, ALL_TIME_DOMAIN_LIMIT)?;

    let recent_domains = suppress_low_signal(aggregate_domains(recent_rows));
    let all_time_domains = suppress_low_signal(complement_recent(
        aggregate_domains(all_time_rows),
        &recent_domains,
    ));

    let top_domains: Vec<String> = recent_domains
        .iter()
        .chain(all_time_domains.iter())
        .map(|d| d.domain.clone())
        .filter(|d| !is_auth_domain(d))
        .take(TOP_DETAIL_DOMAINS)
        .collect();

    let mut domain_details: BTreeMap<String, Vec<DomainDetail>> = BTreeMap::new();
    for domain in top_domains {
        let details = query_titles(conn, &domain)?;
        if !details.is_empty() {
            domain_details.insert(domain, details);
        }
    }

    Ok(BrowserSignals {
        browser: None,
        cluster_labels,
        recent_domains,
        all_time_domains,
        domain_details,
        bookmarks: Vec::new(),
    })
}

fn has_table(conn: &Connection, name: &str) -> bool {
    conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
        .and_then(|mut stmt| stmt.query([name]).and_then(|mut rows| rows.next().map(|r| r.is_some())))
        .unwrap_or(false)
}

/// Topic cluster labels. The `clusters` table only exists in newer
/// Chromium schemas; its absence is an empty result, not an error.
fn query_clusters(conn: &Connection) -> Vec<String> {
    if !has_table(conn, "clusters") {
        return Vec::new();
    }
    let result = conn
        .prepare(
            "SELECT label, COUNT(*) AS cnt FROM clusters \
             WHERE label IS NOT NULL AND label != '' \
             GROUP BY label ORDER BY cnt DESC LIMIT ?1",
        )
        .and_then(|mut stmt| {
            let rows = stmt.query_map([CLUSTER_LIMIT], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        });
    match result {
        Ok(labels) => labels,
        Err(e) => {
            warn!(error = %e, "cluster query failed, continuing without clusters");
            Vec::new()
        }
    }
}

/// Domain extraction expressed purely as substring arithmetic between
/// `://` and the next `/`, so no pre-parsed host column is required.
const DOMAIN_EXPR: &str = "CASE \
     WHEN instr(substr(url, instr(url, '://') + 3), '/') = 0 \
     THEN substr(url, instr(url, '://') + 3) \
     ELSE substr(url, instr(url, '://') + 3, \
          instr(substr(url, instr(url, '://') + 3), '/') - 1) \
     END";

/// Raw `(domain, visits)` rows, optionally windowed by Chromium-epoch
/// microseconds. Loopback and internal schemes are excluded in SQL.
fn query_domain_rows(
    conn: &Connection,
    cutoff_micros: Option<i64>,
    limit: usize,
) -> Result<Vec<(String, i64)>, ExtractError> {
    let window_clause = if cutoff_micros.is_some() {
        "AND last_visit_time > ?1"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {DOMAIN_EXPR} AS domain, SUM(visit_count) AS visits \
         FROM urls \
         WHERE instr(url, '://') > 0 \
           AND url NOT LIKE 'chrome%' \
           AND url NOT LIKE 'edge%' \
           AND url NOT LIKE 'about%' \
           AND url NOT LIKE 'file:%' \
           AND url NOT LIKE '%localhost%' \
           AND url NOT LIKE '%127.0.0.1%' \
           AND url NOT LIKE '%0.0.0.0%' \
           {window_clause} \
         GROUP BY domain \
         HAVING domain != '' \
         ORDER BY visits DESC \
         LIMIT {limit}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1).unwrap_or(0)))
    };
    let rows = match cutoff_micros {
        Some(cutoff) => stmt.query_map([cutoff], map_row)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

/// Title samples for one domain: noise titles dropped, deduplicated by
/// normalized title, capped.
fn query_titles(conn: &Connection, domain: &str) -> Result<Vec<DomainDetail>, ExtractError> {
    let mut stmt = conn.prepare(
        "SELECT title, url, visit_count FROM urls \
         WHERE url LIKE '%' || ?1 || '%' \
           AND title IS NOT NULL AND trim(title) != '' \
         ORDER BY visit_count DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![domain, TITLE_SAMPLE_ROWS], |row| {
            Ok(DomainDetail {
                title: row.get(0)?,
                url: row.get(1)?,
                visit_count: row.get::<_, i64>(2).unwrap_or(0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut details = dedupe_details(
        rows.into_iter()
            .filter(|d| !is_noise_title(&d.title))
            .collect(),
    );
    details.truncate(MAX_DETAILS_PER_DOMAIN);
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Build a Chromium-shaped history store.
    fn fixture_db(path: &Path, rows: &[(&str, &str, i64, i64)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
             visit_count INTEGER, last_visit_time INTEGER)",
            [],
        )
        .unwrap();
        for (url, title, visits, time) in rows {
            conn.execute(
                "INSERT INTO urls (url, title, visit_count, last_visit_time) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![url, title, visits, time],
            )
            .unwrap();
        }
    }

    fn target(path: &Path) -> BrowserTarget {
        BrowserTarget {
            kind: BrowserKind::Chrome,
            history_path: path.to_path_buf(),
            profile_name: "Default".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_all_time_aggregates_www_variant() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        let recent = to_chrome_micros(now() - Duration::days(1));
        fixture_db(
            &db,
            &[
                ("https://github.com/x", "repo x", 10, recent),
                ("https://www.github.com/y", "repo y", 5, recent),
            ],
        );

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        assert_eq!(signals.recent_domains.len(), 1);
        assert_eq!(signals.recent_domains[0].domain, "github.com");
        assert_eq!(signals.recent_domains[0].visits, 15);
        // All-time is a complement of recent, so it must be empty here.
        assert!(signals.all_time_domains.is_empty());
    }

    #[test]
    fn test_empty_recent_window_falls_back_to_all_time() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        let stale = to_chrome_micros(now() - Duration::days(60));
        fixture_db(&db, &[("https://docs.rs/serde", "serde docs", 7, stale)]);

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        assert_eq!(signals.recent_domains.len(), 1);
        assert_eq!(signals.recent_domains[0].domain, "docs.rs");
    }

    #[test]
    fn test_loopback_and_internal_urls_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        let recent = to_chrome_micros(now() - Duration::days(1));
        fixture_db(
            &db,
            &[
                ("http://localhost:3000/app", "dev server", 99, recent),
                ("chrome://settings", "Settings", 50, recent),
                ("file:///tmp/notes.html", "notes", 20, recent),
                ("https://crates.io/", "crates.io", 3, recent),
            ],
        );

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        assert_eq!(signals.recent_domains.len(), 1);
        assert_eq!(signals.recent_domains[0].domain, "crates.io");
    }

    #[test]
    fn test_missing_wal_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        let recent = to_chrome_micros(now() - Duration::days(1));
        fixture_db(&db, &[("https://github.com/", "GitHub", 4, recent)]);
        assert!(!dir.path().join("History-wal").exists());

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        assert_eq!(signals.recent_domains[0].domain, "github.com");
    }

    #[test]
    fn test_wal_sibling_copied_and_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        fixture_db(&db, &[]);
        std::fs::write(dir.path().join("History-wal"), b"wal bytes").unwrap();

        let cache = dir.path().join("cache");
        {
            let scratch = ScratchCopy::create(&db, &cache).unwrap();
            assert!(scratch.path().exists());
            let copies: Vec<_> = std::fs::read_dir(&cache).unwrap().collect();
            assert_eq!(copies.len(), 2); // main + wal
        }
        // Drop removed every copy.
        let leftover: Vec<_> = std::fs::read_dir(&cache).unwrap().collect();
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_scratch_cleaned_on_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        // Not a database at all: querying will fail after the copy.
        std::fs::write(&db, b"not a sqlite file").unwrap();

        let cache = dir.path().join("cache");
        let result = extract_blocking(&target(&db), &cache, now());
        assert!(result.is_err());
        let leftover: Vec<_> = std::fs::read_dir(&cache).unwrap().collect();
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_missing_clusters_table_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        fixture_db(&db, &[]);

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        assert!(signals.cluster_labels.is_empty());
    }

    #[test]
    fn test_clusters_read_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        fixture_db(&db, &[]);
        let conn = Connection::open(&db).unwrap();
        conn.execute("CREATE TABLE clusters (id INTEGER PRIMARY KEY, label TEXT)", [])
            .unwrap();
        for label in ["rust compilers", "rust compilers", "home cooking"] {
            conn.execute("INSERT INTO clusters (label) VALUES (?1)", [label])
                .unwrap();
        }
        drop(conn);

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        assert_eq!(signals.cluster_labels[0], "rust compilers");
        assert_eq!(signals.cluster_labels.len(), 2);
    }

    #[test]
    fn test_titles_filtered_and_deduped() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        let recent = to_chrome_micros(now() - Duration::days(1));
        fixture_db(
            &db,
            &[
                ("https://github.com/a", "dossier: signal pipeline", 6, recent),
                ("https://github.com/a?tab=readme", "Dossier: Signal Pipeline", 3, recent),
                ("https://github.com/b", "Just a moment...", 90, recent),
                ("https://github.com/c", "https://github.com/c", 12, recent),
            ],
        );

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        let details = signals.domain_details.get("github.com").unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].visit_count, 9);
    }

    #[test]
    fn test_auth_domains_get_no_title_sample() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        let recent = to_chrome_micros(now() - Duration::days(1));
        fixture_db(
            &db,
            &[(
                "https://accounts.google.com/signin",
                "Google Accounts sign-in flow page",
                400,
                recent,
            )],
        );

        let signals = extract_blocking(&target(&db), &dir.path().join("cache"), now()).unwrap();
        // The domain still shows up in the visit list...
        assert_eq!(signals.recent_domains[0].domain, "accounts.google.com");
        // ...but never gets a title sample.
        assert!(signals.domain_details.is_empty());
    }
}
