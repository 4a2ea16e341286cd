//! Configuration and on-disk layout for the discovery pipeline.
//!
//! The app home holds two subtrees: `cache/` for transient scratch copies
//! of locked OS stores (deleted on every exit path) and `state/` for the
//! durable outputs: the digest, the category consent record, and the
//! identity map.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resolved filesystem layout for one installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppPaths {
    /// Root of all app-owned files.
    pub home: PathBuf,
}

impl Default for AppPaths {
    fn default() -> Self {
        let home = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dossier");
        Self { home }
    }
}

impl AppPaths {
    /// Use an explicit home directory (tests, `--home` flag).
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Scratch area for copies of locked stores.
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Durable state written across runs.
    pub fn state_dir(&self) -> PathBuf {
        self.home.join("state")
    }

    /// The final digest consumed by downstream synthesis.
    pub fn digest_path(&self) -> PathBuf {
        self.state_dir().join("CORE_MEMORY.MD")
    }

    pub fn categories_path(&self) -> PathBuf {
        self.state_dir().join("discovery_categories.json")
    }

    pub fn identity_map_path(&self) -> PathBuf {
        self.state_dir().join("identity_map.json")
    }

    /// Ensure the cache and state directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.cache_dir())?;
        std::fs::create_dir_all(self.state_dir())?;
        Ok(())
    }
}

/// The four opt-in discovery categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryCategory {
    BrowsingBookmarks,
    DevEnvironment,
    AppsSystem,
    MessagesNotes,
}

impl DiscoveryCategory {
    pub const ALL: [DiscoveryCategory; 4] = [
        DiscoveryCategory::BrowsingBookmarks,
        DiscoveryCategory::DevEnvironment,
        DiscoveryCategory::AppsSystem,
        DiscoveryCategory::MessagesNotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryCategory::BrowsingBookmarks => "browsing_bookmarks",
            DiscoveryCategory::DevEnvironment => "dev_environment",
            DiscoveryCategory::AppsSystem => "apps_system",
            DiscoveryCategory::MessagesNotes => "messages_notes",
        }
    }

    pub fn parse(s: &str) -> Option<DiscoveryCategory> {
        match s.trim() {
            "browsing_bookmarks" => Some(DiscoveryCategory::BrowsingBookmarks),
            "dev_environment" => Some(DiscoveryCategory::DevEnvironment),
            "apps_system" => Some(DiscoveryCategory::AppsSystem),
            "messages_notes" => Some(DiscoveryCategory::MessagesNotes),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoveryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's persisted consent choice.
///
/// Disk format: `{"categories": [...], "updatedAt": epoch-ms}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConsent {
    pub categories: Vec<DiscoveryCategory>,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl Default for CategoryConsent {
    fn default() -> Self {
        // Messaging data is off unless the user opts in.
        Self {
            categories: vec![
                DiscoveryCategory::BrowsingBookmarks,
                DiscoveryCategory::DevEnvironment,
                DiscoveryCategory::AppsSystem,
            ],
            updated_at: Utc::now().timestamp_millis(),
        }
    }
}

impl CategoryConsent {
    pub fn new(categories: Vec<DiscoveryCategory>) -> Self {
        Self {
            categories,
            updated_at: Utc::now().timestamp_millis(),
        }
    }

    /// Load a previously persisted choice, or the default when none exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist the choice so later runs can recall it.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn includes(&self, category: DiscoveryCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Parse a comma-separated category list, ignoring unknown entries.
    pub fn from_csv(s: &str) -> Self {
        let categories = s
            .split(',')
            .filter_map(DiscoveryCategory::parse)
            .collect::<Vec<_>>();
        Self::new(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_messages() {
        let consent = CategoryConsent::default();
        assert!(consent.includes(DiscoveryCategory::BrowsingBookmarks));
        assert!(consent.includes(DiscoveryCategory::DevEnvironment));
        assert!(consent.includes(DiscoveryCategory::AppsSystem));
        assert!(!consent.includes(DiscoveryCategory::MessagesNotes));
    }

    #[test]
    fn test_consent_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discovery_categories.json");

        let consent = CategoryConsent::from_csv("browsing_bookmarks,messages_notes,bogus");
        consent.save(&path).unwrap();

        let loaded = CategoryConsent::load(&path).unwrap();
        assert_eq!(loaded.categories.len(), 2);
        assert!(loaded.includes(DiscoveryCategory::MessagesNotes));
        assert!(!loaded.includes(DiscoveryCategory::AppsSystem));
        assert_eq!(loaded.updated_at, consent.updated_at);
    }

    #[test]
    fn test_disk_format_uses_camel_case_timestamp() {
        let consent = CategoryConsent::new(vec![DiscoveryCategory::DevEnvironment]);
        let json = serde_json::to_string(&consent).unwrap();
        assert!(json.contains("\"updatedAt\""));
        assert!(json.contains("\"dev_environment\""));
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let consent = CategoryConsent::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(consent.categories.len(), 3);
    }

    #[test]
    fn test_app_paths_layout() {
        let paths = AppPaths::with_home("/tmp/dossier-test");
        assert!(paths.digest_path().ends_with("state/CORE_MEMORY.MD"));
        assert!(paths.cache_dir().ends_with("cache"));
    }
}
