//! Layered browser detection.
//!
//! Finds the browser + profile holding the user's live history without
//! any user input. Four strategies run in order, each only when the
//! previous one yields nothing usable:
//!
//! 1. Running-process detection against a priority-ordered table
//! 2. OS default-browser detection (registry / LaunchServices / xdg)
//! 3. Most-recently-modified history across all supported browsers
//! 4. Exhaustive scan of static per-OS candidate paths
//!
//! The strategy order is a policy choice, not a correctness requirement,
//! so [`BrowserLocator::locate_with`] accepts an explicit order.
//!
//! All identification tables are data (pattern, kind) pairs rather than
//! branching logic so they stay testable in isolation.

use crate::collector::browser::types::{BrowserKind, BrowserTarget};
use crate::probe;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// The Chromium history store file name inside a profile directory.
const HISTORY_FILE: &str = "History";

/// Profile names probed by the exhaustive path scan.
const SCAN_PROFILES: [&str; 6] = [
    "Default",
    "Profile 1",
    "Profile 2",
    "Profile 3",
    "Profile 4",
    "Profile 5",
];

/// Detection strategies, in their default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RunningProcess,
    DefaultBrowser,
    LatestHistory,
    PathScan,
}

pub const DEFAULT_STRATEGY_ORDER: [Strategy; 4] = [
    Strategy::RunningProcess,
    Strategy::DefaultBrowser,
    Strategy::LatestHistory,
    Strategy::PathScan,
];

/// Per-OS process-name patterns, matched as substrings of running
/// process names.
fn process_patterns(os: &str) -> &'static [(&'static str, BrowserKind)] {
    match os {
        "windows" => &[
            ("chrome.exe", BrowserKind::Chrome),
            ("arc.exe", BrowserKind::Arc),
            ("msedge.exe", BrowserKind::Edge),
            ("brave.exe", BrowserKind::Brave),
            ("opera.exe", BrowserKind::Opera),
            ("vivaldi.exe", BrowserKind::Vivaldi),
        ],
        "macos" => &[
            ("google chrome", BrowserKind::Chrome),
            ("arc", BrowserKind::Arc),
            ("microsoft edge", BrowserKind::Edge),
            ("brave browser", BrowserKind::Brave),
            ("opera", BrowserKind::Opera),
            ("vivaldi", BrowserKind::Vivaldi),
        ],
        _ => &[
            ("chrome", BrowserKind::Chrome),
            ("chromium", BrowserKind::Chrome),
            ("msedge", BrowserKind::Edge),
            ("brave", BrowserKind::Brave),
            ("opera", BrowserKind::Opera),
            ("vivaldi", BrowserKind::Vivaldi),
        ],
    }
}

/// Windows ProgId patterns. `None` marks browsers we cannot read as
/// Chromium-schema stores (detection succeeds, resolution refuses).
const PROGID_PATTERNS: [(&str, Option<BrowserKind>); 8] = [
    ("chromehtml", Some(BrowserKind::Chrome)),
    ("msedgehtm", Some(BrowserKind::Edge)),
    ("bravehtml", Some(BrowserKind::Brave)),
    ("operastable", Some(BrowserKind::Opera)),
    ("vivaldihtm", Some(BrowserKind::Vivaldi)),
    ("arc", Some(BrowserKind::Arc)),
    ("firefox", None),
    ("safari", None),
];

/// macOS bundle-identifier patterns.
const BUNDLE_PATTERNS: [(&str, Option<BrowserKind>); 8] = [
    ("com.google.chrome", Some(BrowserKind::Chrome)),
    ("company.thebrowser.browser", Some(BrowserKind::Arc)),
    ("com.microsoft.edgemac", Some(BrowserKind::Edge)),
    ("com.brave.browser", Some(BrowserKind::Brave)),
    ("com.operasoftware", Some(BrowserKind::Opera)),
    ("com.vivaldi", Some(BrowserKind::Vivaldi)),
    ("com.apple.safari", None),
    ("org.mozilla.firefox", None),
];

/// Linux desktop-file patterns.
const DESKTOP_PATTERNS: [(&str, Option<BrowserKind>); 7] = [
    ("google-chrome", Some(BrowserKind::Chrome)),
    ("chromium", Some(BrowserKind::Chrome)),
    ("microsoft-edge", Some(BrowserKind::Edge)),
    ("brave", Some(BrowserKind::Brave)),
    ("opera", Some(BrowserKind::Opera)),
    ("vivaldi", Some(BrowserKind::Vivaldi)),
    ("firefox", None),
];

/// Match an identifier against a pattern table. The outer `None` means
/// nothing matched; `Some(None)` means a recognized-but-unsupported
/// browser.
fn match_patterns(
    identifier: &str,
    table: &[(&str, Option<BrowserKind>)],
) -> Option<Option<BrowserKind>> {
    let lower = identifier.to_lowercase();
    table
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, kind)| *kind)
}

/// Locates the user's live browser history store.
pub struct BrowserLocator {
    os: String,
    home: PathBuf,
    local_data: PathBuf,
    roaming_data: PathBuf,
}

impl Default for BrowserLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserLocator {
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            os: std::env::consts::OS.to_string(),
            local_data: dirs::data_local_dir().unwrap_or_else(|| home.clone()),
            roaming_data: dirs::data_dir().unwrap_or_else(|| home.clone()),
            home,
        }
    }

    /// Build a locator over explicit roots (tests).
    pub fn with_roots(os: &str, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            os: os.to_string(),
            local_data: home.clone(),
            roaming_data: home.clone(),
            home,
        }
    }

    /// Run the default strategy order.
    pub async fn locate(&self) -> Option<BrowserTarget> {
        self.locate_with(&DEFAULT_STRATEGY_ORDER).await
    }

    /// Run an explicit strategy order.
    pub async fn locate_with(&self, strategies: &[Strategy]) -> Option<BrowserTarget> {
        for strategy in strategies {
            let target = match strategy {
                Strategy::RunningProcess => self.from_running_processes().await,
                Strategy::DefaultBrowser => self.from_default_browser().await,
                Strategy::LatestHistory => self.from_latest_history().await,
                Strategy::PathScan => self.from_path_scan().await,
            };
            if let Some(target) = target {
                debug!(
                    browser = %target.kind,
                    profile = %target.profile_name,
                    strategy = ?strategy,
                    "located history store"
                );
                return Some(target);
            }
        }
        None
    }

    /// Strategy 1: enumerate running processes and try each matching
    /// browser in priority order.
    async fn from_running_processes(&self) -> Option<BrowserTarget> {
        let processes = match probe::running_processes().await {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "process enumeration unavailable");
                return None;
            }
        };

        let table = process_patterns(&self.os);
        for kind in BrowserKind::PRIORITY {
            let running = table
                .iter()
                .filter(|(_, k)| *k == kind)
                .any(|(pattern, _)| processes.iter().any(|p| p.contains(pattern)));
            if running {
                if let Some(target) = self.resolve_history(kind).await {
                    return Some(target);
                }
            }
        }
        None
    }

    /// Strategy 2: ask the OS which browser is the default handler.
    async fn from_default_browser(&self) -> Option<BrowserTarget> {
        let kind = self.detect_default_browser().await??;
        self.resolve_history(kind).await
    }

    /// Platform-specific default-browser identification. Outer `None`
    /// when detection failed, `Some(None)` for unsupported browsers.
    async fn detect_default_browser(&self) -> Option<Option<BrowserKind>> {
        match self.os.as_str() {
            "windows" => {
                let progid = probe::reg_query_progid().await.ok()?;
                match_patterns(&progid, &PROGID_PATTERNS)
            }
            "macos" => {
                let handlers = probe::launchservices_handlers().await.ok()?;
                // Narrow to the http handler block when the dump has one;
                // the Perl fallback returns a bare bundle id.
                let scope = handlers
                    .split('}')
                    .find(|block| {
                        block.contains("LSHandlerURLScheme") && block.contains("http")
                    })
                    .unwrap_or(handlers.as_str());
                match_patterns(scope, &BUNDLE_PATTERNS)
            }
            _ => {
                let desktop = probe::xdg_default_browser().await.ok()?;
                match_patterns(&desktop, &DESKTOP_PATTERNS)
            }
        }
    }

    /// Strategy 3: pick the browser whose resolved history file was
    /// modified most recently.
    async fn from_latest_history(&self) -> Option<BrowserTarget> {
        let mut best: Option<(SystemTime, BrowserTarget)> = None;
        for kind in BrowserKind::PRIORITY {
            if let Some(target) = self.resolve_history(kind).await {
                let mtime = tokio::fs::metadata(&target.history_path)
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok());
                if let Some(mtime) = mtime {
                    let newer = best.as_ref().map(|(t, _)| mtime > *t).unwrap_or(true);
                    if newer {
                        best = Some((mtime, target));
                    }
                }
            }
        }
        best.map(|(_, target)| target)
    }

    /// Strategy 4: walk a static table of candidate paths, covering
    /// alternate install locations and beta/canary channels.
    async fn from_path_scan(&self) -> Option<BrowserTarget> {
        for (kind, root, has_profiles) in self.scan_candidates() {
            if has_profiles {
                for profile in SCAN_PROFILES {
                    let candidate = root.join(profile).join(HISTORY_FILE);
                    if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                        return Some(BrowserTarget {
                            kind,
                            history_path: candidate,
                            profile_name: profile.to_string(),
                        });
                    }
                }
            } else {
                let candidate = root.join(HISTORY_FILE);
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    return Some(BrowserTarget {
                        kind,
                        history_path: candidate,
                        profile_name: "Default".to_string(),
                    });
                }
            }
        }
        None
    }

    /// The primary user-data root for a browser on this OS.
    fn data_root(&self, kind: BrowserKind) -> Option<PathBuf> {
        let mac_support = self.home.join("Library/Application Support");
        let linux_config = self.home.join(".config");
        match (self.os.as_str(), kind) {
            ("windows", BrowserKind::Chrome) => Some(self.local_data.join("Google/Chrome/User Data")),
            ("windows", BrowserKind::Arc) => Some(self.local_data.join("Arc/User Data")),
            ("windows", BrowserKind::Edge) => Some(self.local_data.join("Microsoft/Edge/User Data")),
            ("windows", BrowserKind::Brave) => {
                Some(self.local_data.join("BraveSoftware/Brave-Browser/User Data"))
            }
            ("windows", BrowserKind::Opera) => {
                Some(self.roaming_data.join("Opera Software/Opera Stable"))
            }
            ("windows", BrowserKind::Vivaldi) => Some(self.local_data.join("Vivaldi/User Data")),
            ("macos", BrowserKind::Chrome) => Some(mac_support.join("Google/Chrome")),
            ("macos", BrowserKind::Arc) => Some(mac_support.join("Arc/User Data")),
            ("macos", BrowserKind::Edge) => Some(mac_support.join("Microsoft Edge")),
            ("macos", BrowserKind::Brave) => {
                Some(mac_support.join("BraveSoftware/Brave-Browser"))
            }
            ("macos", BrowserKind::Opera) => Some(mac_support.join("com.operasoftware.Opera")),
            ("macos", BrowserKind::Vivaldi) => Some(mac_support.join("Vivaldi")),
            ("linux", BrowserKind::Chrome) => Some(linux_config.join("google-chrome")),
            ("linux", BrowserKind::Edge) => Some(linux_config.join("microsoft-edge")),
            ("linux", BrowserKind::Brave) => {
                Some(linux_config.join("BraveSoftware/Brave-Browser"))
            }
            ("linux", BrowserKind::Opera) => Some(linux_config.join("opera")),
            ("linux", BrowserKind::Vivaldi) => Some(linux_config.join("vivaldi")),
            _ => None,
        }
    }

    /// Whether a browser keeps per-profile subdirectories. Opera stores
    /// its history at the root of its data directory.
    fn has_profiles(kind: BrowserKind) -> bool {
        kind != BrowserKind::Opera
    }

    /// All candidate roots for the exhaustive scan, primary first.
    fn scan_candidates(&self) -> Vec<(BrowserKind, PathBuf, bool)> {
        let mut candidates: Vec<(BrowserKind, PathBuf, bool)> = Vec::new();
        for kind in BrowserKind::PRIORITY {
            if let Some(root) = self.data_root(kind) {
                candidates.push((kind, root, Self::has_profiles(kind)));
            }
        }

        // Alternate channels.
        let mac_support = self.home.join("Library/Application Support");
        let linux_config = self.home.join(".config");
        match self.os.as_str() {
            "windows" => {
                candidates.push((
                    BrowserKind::Chrome,
                    self.local_data.join("Google/Chrome Beta/User Data"),
                    true,
                ));
                candidates.push((
                    BrowserKind::Chrome,
                    self.local_data.join("Google/Chrome SxS/User Data"),
                    true,
                ));
                candidates.push((
                    BrowserKind::Edge,
                    self.local_data.join("Microsoft/Edge Beta/User Data"),
                    true,
                ));
            }
            "macos" => {
                candidates.push((BrowserKind::Chrome, mac_support.join("Google/Chrome Beta"), true));
                candidates.push((
                    BrowserKind::Chrome,
                    mac_support.join("Google/Chrome Canary"),
                    true,
                ));
                candidates.push((BrowserKind::Edge, mac_support.join("Microsoft Edge Beta"), true));
                candidates.push((
                    BrowserKind::Brave,
                    mac_support.join("BraveSoftware/Brave-Browser-Beta"),
                    true,
                ));
            }
            _ => {
                candidates.push((BrowserKind::Chrome, linux_config.join("chromium"), true));
                candidates.push((BrowserKind::Chrome, linux_config.join("google-chrome-beta"), true));
            }
        }
        candidates
    }

    /// Resolve a browser kind to a concrete history path by picking its
    /// most-recently-used profile.
    pub async fn resolve_history(&self, kind: BrowserKind) -> Option<BrowserTarget> {
        let root = self.data_root(kind)?;
        if !Self::has_profiles(kind) {
            let history = root.join(HISTORY_FILE);
            if tokio::fs::try_exists(&history).await.unwrap_or(false) {
                return Some(BrowserTarget {
                    kind,
                    history_path: history,
                    profile_name: "Default".to_string(),
                });
            }
            return None;
        }

        let (history_path, profile_name) = most_recent_profile(&root).await?;
        Some(BrowserTarget {
            kind,
            history_path,
            profile_name,
        })
    }
}

/// Pick the most-recently-used profile under a Chromium user-data root.
///
/// Candidate directories (`Default`, `Profile N`) are checked
/// concurrently; a profile with a `History` file is always preferred over
/// one ranked only by its directory mtime.
async fn most_recent_profile(root: &Path) -> Option<(PathBuf, String)> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(e) => e,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "cannot read user-data root");
            return None;
        }
    };

    let mut set: JoinSet<Option<(bool, SystemTime, PathBuf, String)>> = JoinSet::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name != "Default" && !name.starts_with("Profile ") {
            continue;
        }
        let dir = entry.path();
        set.spawn(async move {
            let history = dir.join(HISTORY_FILE);
            match tokio::fs::metadata(&history).await {
                Ok(meta) => {
                    let mtime = meta.modified().ok()?;
                    Some((true, mtime, history, name))
                }
                Err(_) => {
                    let meta = tokio::fs::metadata(&dir).await.ok()?;
                    let mtime = meta.modified().ok()?;
                    Some((false, mtime, dir.join(HISTORY_FILE), name))
                }
            }
        });
    }

    let mut best: Option<(bool, SystemTime, PathBuf, String)> = None;
    while let Some(result) = set.join_next().await {
        if let Ok(Some(candidate)) = result {
            let better = match &best {
                None => true,
                Some(current) => (candidate.0, candidate.1) > (current.0, current.1),
            };
            if better {
                best = Some(candidate);
            }
        }
    }

    match best {
        Some((true, _, history, name)) => Some((history, name)),
        // No profile has a History file: fall back to Default if present.
        _ => {
            let default_history = root.join("Default").join(HISTORY_FILE);
            if tokio::fs::try_exists(&default_history).await.unwrap_or(false) {
                Some((default_history, "Default".to_string()))
            } else {
                None
            }
        }
    }
}
