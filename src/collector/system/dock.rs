//! Dock pin collection (macOS).
//!
//! The Dock preference plist lists the user's pinned applications, a
//! strong signal for which tools they reach for daily.

use crate::probe;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// One pinned Dock application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockPin {
    pub label: String,
    pub path: String,
}

/// Read pinned apps from the Dock preference plist. Non-macOS hosts and
/// any probe/parse failure yield an empty list.
pub async fn dock_pins(os: &str, home: &Path) -> Vec<DockPin> {
    if os != "macos" {
        return Vec::new();
    }
    let plist = home.join("Library/Preferences/com.apple.dock.plist");
    if !plist.exists() {
        return Vec::new();
    }
    match probe::plutil_json(&plist).await {
        Ok(tree) => parse_dock(&tree),
        Err(e) => {
            warn!(error = %e, "dock plist unavailable");
            Vec::new()
        }
    }
}

/// Extract `persistent-apps[].tile-data.{file-label, file-data._CFURLString}`.
pub(crate) fn parse_dock(tree: &Value) -> Vec<DockPin> {
    let Some(apps) = tree.get("persistent-apps").and_then(Value::as_array) else {
        return Vec::new();
    };
    apps.iter()
        .filter_map(|app| {
            let tile = app.get("tile-data")?;
            let label = tile.get("file-label")?.as_str()?.to_string();
            let path = tile
                .get("file-data")
                .and_then(|d| d.get("_CFURLString"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(DockPin { label, path })
        })
        .collect()
}
