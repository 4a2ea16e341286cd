//! Data model for browser history signals.
//!
//! These types carry only aggregate, content-free signals: domains with
//! visit counts and deduplicated page titles. Raw URLs never leave the
//! extraction step except as part of a `DomainDetail` title sample.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Supported browsers.
///
/// All except `Safari` store history in the Chromium schema. `Safari` is
/// only ever produced by the Safari collector; the locator never resolves
/// to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Arc,
    Edge,
    Brave,
    Opera,
    Vivaldi,
    Safari,
}

impl BrowserKind {
    /// Detection priority order for Chromium-family browsers.
    pub const PRIORITY: [BrowserKind; 6] = [
        BrowserKind::Chrome,
        BrowserKind::Arc,
        BrowserKind::Edge,
        BrowserKind::Brave,
        BrowserKind::Opera,
        BrowserKind::Vivaldi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Arc => "arc",
            BrowserKind::Edge => "edge",
            BrowserKind::Brave => "brave",
            BrowserKind::Opera => "opera",
            BrowserKind::Vivaldi => "vivaldi",
            BrowserKind::Safari => "safari",
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete, on-disk history store. Resolved once per run; immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserTarget {
    pub kind: BrowserKind,
    pub history_path: PathBuf,
    pub profile_name: String,
}

/// A normalized domain with its summed visit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainVisit {
    /// Normalized: lowercase, at most one of `www.`/`mobile.`/`m.` stripped.
    pub domain: String,
    pub visits: i64,
}

/// A page title sample for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDetail {
    pub title: String,
    pub url: String,
    pub visit_count: i64,
}

/// All browser-derived signals for one collection run.
///
/// Invariant: `all_time_domains` never contains a domain present
/// (case-insensitively) in `recent_domains`: all-time is a complement
/// set, not a superset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSignals {
    /// Which browser the signals came from, if one was located.
    pub browser: Option<BrowserKind>,
    /// Topic cluster labels, when the store has a `clusters` table.
    pub cluster_labels: Vec<String>,
    /// Domains visited in the last 7 days, sorted by visits descending.
    pub recent_domains: Vec<DomainVisit>,
    /// All-time domains not already covered by `recent_domains`.
    pub all_time_domains: Vec<DomainVisit>,
    /// Deduplicated title samples keyed by normalized domain.
    pub domain_details: BTreeMap<String, Vec<DomainDetail>>,
    /// Safari bookmarks grouped by folder (macOS only).
    pub bookmarks: Vec<BookmarkEntry>,
}

impl BrowserSignals {
    pub fn is_empty(&self) -> bool {
        self.cluster_labels.is_empty()
            && self.recent_domains.is_empty()
            && self.all_time_domains.is_empty()
            && self.domain_details.is_empty()
            && self.bookmarks.is_empty()
    }
}

/// A single bookmark leaf with the nearest enclosing folder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    pub folder: String,
    pub title: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_kind_names() {
        assert_eq!(BrowserKind::Chrome.as_str(), "chrome");
        assert_eq!(BrowserKind::Safari.to_string(), "safari");
    }

    #[test]
    fn test_priority_excludes_safari() {
        assert!(!BrowserKind::PRIORITY.contains(&BrowserKind::Safari));
        assert_eq!(BrowserKind::PRIORITY[0], BrowserKind::Chrome);
    }

    #[test]
    fn test_empty_signals() {
        let signals = BrowserSignals::default();
        assert!(signals.is_empty());
        assert!(signals.browser.is_none());
    }
}
