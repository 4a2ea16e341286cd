//! Messaging and calendar signal collection (opt-in, macOS).
//!
//! Off by default: this collector only runs when the user selected the
//! messages category. It reads contact names and aggregate counts from
//! the Messages store and recurring-event titles from the Calendar
//! cache. Raw names never reach the digest; they feed the identity map
//! and are replaced by aliases during the privacy pass.

use crate::collector::browser::history::{open_read_only, ExtractError, ScratchCopy};
use crate::core::time::{to_apple_nanos, to_cf_seconds};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Message-count window.
const MESSAGE_WINDOW_DAYS: i64 = 7;

/// Contacts kept per run.
const CONTACT_LIMIT: usize = 50;

/// Aggregate messaging signals. Contact names are raw here and must go
/// through the identity map before formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSignals {
    /// Messages sent or received in the window.
    pub recent_message_count: i64,
    /// Chat display names and handles (phone numbers, emails).
    pub contacts: Vec<String>,
    /// Calendar event titles, for the `with <Name>` heuristic.
    pub event_titles: Vec<String>,
}

impl MessageSignals {
    pub fn is_empty(&self) -> bool {
        self.recent_message_count == 0 && self.contacts.is_empty() && self.event_titles.is_empty()
    }
}

/// Collects messaging and calendar signals.
pub struct MessagesCollector {
    os: String,
    home: PathBuf,
    cache_dir: PathBuf,
}

impl MessagesCollector {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            cache_dir: cache_dir.into(),
        }
    }

    /// Explicit roots (tests).
    pub fn with_roots(os: &str, home: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            os: os.to_string(),
            home: home.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> MessageSignals {
        if self.os != "macos" {
            return MessageSignals::default();
        }

        let mut signals = MessageSignals::default();

        let chat_db = self.home.join("Library/Messages/chat.db");
        if chat_db.exists() {
            let cache_dir = self.cache_dir.clone();
            let result =
                tokio::task::spawn_blocking(move || chat_signals(&chat_db, &cache_dir, now)).await;
            match result {
                Ok(Ok((count, contacts))) => {
                    signals.recent_message_count = count;
                    signals.contacts = contacts;
                }
                Ok(Err(e)) => warn!(error = %e, "messages store unavailable"),
                Err(e) => warn!(error = %e, "messages task failed"),
            }
        }

        let calendar_db = self.home.join("Library/Calendars/Calendar Cache");
        if calendar_db.exists() {
            let cache_dir = self.cache_dir.clone();
            let result =
                tokio::task::spawn_blocking(move || event_titles(&calendar_db, &cache_dir)).await;
            match result {
                Ok(Ok(titles)) => signals.event_titles = titles,
                Ok(Err(e)) => warn!(error = %e, "calendar cache unavailable"),
                Err(e) => warn!(error = %e, "calendar task failed"),
            }
        }

        signals
    }
}

/// Contact names and the windowed message count from a scratch copy of
/// `chat.db`.
fn chat_signals(
    db: &Path,
    cache_dir: &Path,
    now: DateTime<Utc>,
) -> Result<(i64, Vec<String>), ExtractError> {
    let scratch = ScratchCopy::create(db, cache_dir)?;
    let conn = open_read_only(scratch.path())?;

    let mut contacts: Vec<String> = Vec::new();

    // Named group chats first, then raw handles.
    let display_names = conn
        .prepare(
            "SELECT DISTINCT display_name FROM chat \
             WHERE display_name IS NOT NULL AND display_name != '' LIMIT ?1",
        )
        .and_then(|mut stmt| {
            let rows = stmt.query_map([CONTACT_LIMIT], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .unwrap_or_default();
    contacts.extend(display_names);

    let handles = conn
        .prepare("SELECT DISTINCT id FROM handle LIMIT ?1")
        .and_then(|mut stmt| {
            let rows = stmt.query_map([CONTACT_LIMIT], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .unwrap_or_default();
    contacts.extend(handles);
    contacts.truncate(CONTACT_LIMIT);

    let cutoff = now - Duration::days(MESSAGE_WINDOW_DAYS);
    // Modern schemas store `date` as Apple-epoch nanoseconds; older ones
    // as seconds. Try nanoseconds first, retry on an empty window.
    let mut count = count_messages(&conn, to_apple_nanos(cutoff))?;
    if count == 0 {
        count = count_messages(&conn, to_cf_seconds(cutoff))?;
    }

    Ok((count, contacts))
}

fn count_messages(conn: &Connection, cutoff: i64) -> Result<i64, ExtractError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM message WHERE date > ?1",
        [cutoff],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

/// Recurring event titles from a scratch copy of the Calendar cache. A
/// title occurring more than once marks a repeating meeting, which is
/// where the `with <Name>` heuristic finds real people.
fn event_titles(db: &Path, cache_dir: &Path) -> Result<Vec<String>, ExtractError> {
    let scratch = ScratchCopy::create(db, cache_dir)?;
    let conn = open_read_only(scratch.path())?;

    let titles = conn
        .prepare(
            "SELECT ZTITLE FROM ZCALENDARITEM \
             WHERE ZTITLE IS NOT NULL AND ZTITLE != '' \
             GROUP BY ZTITLE HAVING COUNT(*) > 1 LIMIT 200",
        )
        .and_then(|mut stmt| {
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
    Ok(titles)
}
