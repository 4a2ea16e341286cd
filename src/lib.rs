//! Dossier - Privacy-first local signal discovery.
//!
//! This library discovers a user's browser, development environment,
//! system usage, and (opt-in) messaging signals from OS-native stores,
//! aggregates them, and produces a bounded, de-identified text digest
//! for downstream synthesis.
//!
//! # Privacy Guarantees
//!
//! - **Opt-in categories**: Each signal category is collected only with
//!   explicit, persisted consent; messaging data is off by default
//! - **No raw persistence**: Scratch copies of locked stores are deleted
//!   on every exit path; only the aggregate digest is kept
//! - **Pseudonymization**: Real names and identifiers are replaced with
//!   stable aliases before the digest leaves the device
//! - **Read-only**: Collectors never mutate any OS store
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐     │
//! │  │ Browser  │  │  System  │  │  DevEnv  │  │ Messages │     │
//! │  │ locator/ │  │ dock/use │  │ dotfiles │  │ (opt-in) │     │
//! │  │ extract  │  │ /fs scan │  │ /git/rt  │  │          │     │
//! │  └────┬─────┘  └────┬─────┘  └────┬─────┘  └────┬─────┘     │
//! │       ▼             ▼             ▼             ▼           │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │      core: aggregate / filter / tier             │       │
//! │  └───────────────────────┬──────────────────────────┘       │
//! │                          ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │      privacy: identity map / pseudonymize        │       │
//! │  └───────────────────────┬──────────────────────────┘       │
//! │                          ▼                                  │
//! │                 state/CORE_MEMORY.MD                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dossier::config::{AppPaths, CategoryConsent};
//! use dossier::orchestrator::Orchestrator;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let paths = AppPaths::default();
//! let consent = CategoryConsent::load(&paths.categories_path())?;
//! let outcome = Orchestrator::new(paths).run(&consent).await?;
//! println!("digest written to {:?}", outcome.digest_path);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod digest;
pub mod orchestrator;
pub mod privacy;
pub mod probe;

// Re-export key types at crate root for convenience
pub use collector::{
    BrowserKind, BrowserLocator, BrowserSignals, BrowserTarget, DevEnvCollector, DevEnvSignals,
    HistoryExtractor, MessageSignals, MessagesCollector, SafariCollector, SystemSignalCollector,
    SystemSignals,
};
pub use config::{AppPaths, CategoryConsent, DiscoveryCategory};
pub use orchestrator::{DiscoveryOutcome, Orchestrator, SignalsBundle};
pub use privacy::{IdentityMap, IdentityRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              DOSSIER - PRIVACY DECLARATION                       ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool reads local signals to personalize your assistant.    ║
║                                                                  ║
║  ✓ WHAT WE COLLECT (only for categories you enable):             ║
║    • Visited domains and page titles, aggregated by count        ║
║    • Pinned and most-used applications                           ║
║    • Folder names and file types, never file contents            ║
║    • Dotfiles present, git identity, installed runtimes          ║
║                                                                  ║
║  ✗ WHAT NEVER LEAVES THIS DEVICE:                                ║
║    • Real names and contact identifiers (aliased before output)  ║
║    • Message contents (only aggregate counts are read)           ║
║    • Raw copies of any store (scratch files are deleted)         ║
║                                                                  ║
║  Messaging and notes collection is OFF unless you turn it on.    ║
║                                                                  ║
║  Review your consent anytime with:                               ║
║    dossier categories                                            ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER LEAVES"));
        assert!(PRIVACY_DECLARATION.contains("OFF unless you turn it on"));
    }
}
