//! System-level signal collection.
//!
//! Three independent sub-collectors (dock pins, app-usage stores, and a
//! filesystem sample) run concurrently, each wrapped in its own timeout.
//! A slow or hung OS query substitutes an empty default; it never blocks
//! the run.

pub mod dock;
pub mod fs_scan;
pub mod usage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

// Re-export commonly used types
pub use dock::DockPin;
pub use fs_scan::{FilesystemSignals, NameCount};
pub use usage::AppUsage;

/// Per-sub-collector timeouts. The usage stores have a history of
/// hanging behind permission prompts, so they get the longest budget.
const DOCK_TIMEOUT: Duration = Duration::from_secs(3);
const USAGE_TIMEOUT: Duration = Duration::from_secs(10);
const FS_TIMEOUT: Duration = Duration::from_secs(5);

/// All system-derived signals for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSignals {
    pub dock_pins: Vec<DockPin>,
    /// Excludes entries with non-positive durations.
    pub app_usage: Vec<AppUsage>,
    pub filesystem: FilesystemSignals,
}

impl SystemSignals {
    pub fn is_empty(&self) -> bool {
        self.dock_pins.is_empty() && self.app_usage.is_empty() && self.filesystem.is_empty()
    }
}

/// Collects dock, usage, and filesystem signals.
pub struct SystemSignalCollector {
    os: String,
    home: PathBuf,
    local_data: PathBuf,
    cache_dir: PathBuf,
}

impl SystemSignalCollector {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            os: std::env::consts::OS.to_string(),
            local_data: dirs::data_local_dir().unwrap_or_else(|| home.clone()),
            home,
            cache_dir: cache_dir.into(),
        }
    }

    /// Explicit roots. `local_data` is derived from the home directory
    /// (`AppData/Local` on Windows).
    pub fn with_roots(
        os: &str,
        home: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        let home = home.into();
        let local_data = if os == "windows" {
            home.join("AppData/Local")
        } else {
            home.clone()
        };
        Self {
            os: os.to_string(),
            local_data,
            home,
            cache_dir: cache_dir.into(),
        }
    }

    /// Run all three sub-collectors concurrently under their timeouts.
    pub async fn collect(&self, now: DateTime<Utc>) -> SystemSignals {
        let dock_fut = timeout(DOCK_TIMEOUT, dock::dock_pins(&self.os, &self.home));
        let usage_fut = timeout(
            USAGE_TIMEOUT,
            usage::app_usage(&self.os, &self.home, &self.local_data, &self.cache_dir, now),
        );
        let fs_fut = timeout(FS_TIMEOUT, fs_scan::filesystem_signals(&self.home));

        let (dock, app_usage, filesystem) = tokio::join!(dock_fut, usage_fut, fs_fut);

        SystemSignals {
            dock_pins: dock.unwrap_or_else(|_| {
                warn!("dock pin collection timed out");
                Vec::new()
            }),
            app_usage: app_usage.unwrap_or_else(|_| {
                warn!("app usage collection timed out");
                Vec::new()
            }),
            filesystem: filesystem.unwrap_or_else(|_| {
                warn!("filesystem scan timed out");
                FilesystemSignals::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_on_empty_home_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let collector =
            SystemSignalCollector::with_roots("linux", dir.path(), dir.path().join("cache"));
        let signals = collector.collect(Utc::now()).await;
        assert!(signals.is_empty());
    }
}
