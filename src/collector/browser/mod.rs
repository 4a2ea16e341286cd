//! Browser history discovery and extraction.
//!
//! This module provides:
//! - Layered detection of the user's live browser + profile
//! - Safe extraction from locked Chromium history stores
//! - Safari history and bookmark collection (macOS)

pub mod history;
pub mod locator;
pub mod safari;
pub mod types;

// Re-export commonly used types
pub use history::{ExtractError, HistoryExtractor, ScratchCopy};
pub use locator::{BrowserLocator, Strategy, DEFAULT_STRATEGY_ORDER};
pub use safari::SafariCollector;
pub use types::{
    BookmarkEntry, BrowserKind, BrowserSignals, BrowserTarget, DomainDetail, DomainVisit,
};
