//! Category-gated collection orchestration.
//!
//! Each selected category fans out to its collectors concurrently; a
//! collector failure is caught and replaced with its empty default, so
//! no single failure aborts the run. After collection the sections are
//! formatted in a fixed category order, tiered, pseudonymized, and
//! written to the digest file. Consent is persisted so later runs recall
//! the user's choice.

use crate::collector::browser::{
    BrowserLocator, BrowserSignals, HistoryExtractor, SafariCollector,
};
use crate::collector::devenv::{DevEnvCollector, DevEnvSignals};
use crate::collector::messages::{MessageSignals, MessagesCollector};
use crate::collector::system::{SystemSignalCollector, SystemSignals};
use crate::config::{AppPaths, CategoryConsent, DiscoveryCategory};
use crate::core::{tier_sections, DEFAULT_DIGEST_LINE_BUDGET};
use crate::digest;
use crate::privacy::{extract_names_from_titles, IdentityMap};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

/// Raw structured signals from one run, alongside the formatted digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalsBundle {
    pub browser: Option<BrowserSignals>,
    pub safari: Option<BrowserSignals>,
    pub devenv: Option<DevEnvSignals>,
    pub system: Option<SystemSignals>,
    pub messages: Option<MessageSignals>,
}

/// The result of one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub run_id: Uuid,
    pub categories: Vec<DiscoveryCategory>,
    pub digest: String,
    pub digest_path: PathBuf,
    pub bundle: SignalsBundle,
}

/// Drives one full collection pass.
pub struct Orchestrator {
    paths: AppPaths,
    os: String,
    home: PathBuf,
}

impl Orchestrator {
    pub fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            os: std::env::consts::OS.to_string(),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Explicit OS and home overrides (tests).
    pub fn with_env(paths: AppPaths, os: &str, home: impl Into<PathBuf>) -> Self {
        Self {
            paths,
            os: os.to_string(),
            home: home.into(),
        }
    }

    /// Run collection for the consented categories and write the digest.
    pub async fn run(&self, consent: &CategoryConsent) -> anyhow::Result<DiscoveryOutcome> {
        self.paths
            .ensure_directories()
            .context("creating app directories")?;

        let run_id = Uuid::new_v4();
        let now = Utc::now();
        info!(%run_id, categories = ?consent.categories, "starting discovery run");

        let browsing = consent.includes(DiscoveryCategory::BrowsingBookmarks);
        let dev = consent.includes(DiscoveryCategory::DevEnvironment);
        let apps = consent.includes(DiscoveryCategory::AppsSystem);
        let msgs = consent.includes(DiscoveryCategory::MessagesNotes);

        let cache_dir = self.paths.cache_dir();

        // All collectors for the selected categories run concurrently;
        // results are assembled by key below, never by finish order.
        let (browser, safari, devenv, system, messages) = tokio::join!(
            async {
                if browsing {
                    Some(self.collect_browser(&cache_dir).await)
                } else {
                    None
                }
            },
            async {
                if browsing && self.os == "macos" {
                    let collector = SafariCollector::new(self.home.clone(), cache_dir.clone());
                    Some(collector.collect(now).await)
                } else {
                    None
                }
            },
            async {
                if dev {
                    Some(DevEnvCollector::with_home(self.home.clone()).collect().await)
                } else {
                    None
                }
            },
            async {
                if apps {
                    let collector = SystemSignalCollector::with_roots(
                        &self.os,
                        self.home.clone(),
                        cache_dir.clone(),
                    );
                    Some(collector.collect(now).await)
                } else {
                    None
                }
            },
            async {
                if msgs {
                    let collector =
                        MessagesCollector::with_roots(&self.os, self.home.clone(), cache_dir.clone());
                    Some(collector.collect(now).await)
                } else {
                    None
                }
            },
        );

        let bundle = SignalsBundle {
            browser,
            safari,
            devenv,
            system,
            messages,
        };

        let identity = self.update_identity_map(&bundle);
        let digest = self.build_digest(consent, &bundle, &identity);

        std::fs::write(&self.paths.digest_path(), &digest).context("writing digest")?;
        consent
            .save(&self.paths.categories_path())
            .context("persisting category consent")?;

        info!(%run_id, bytes = digest.len(), "discovery run complete");
        Ok(DiscoveryOutcome {
            run_id,
            categories: consent.categories.clone(),
            digest,
            digest_path: self.paths.digest_path(),
            bundle,
        })
    }

    /// Locate and extract Chromium history. Any failure yields the empty
    /// default.
    async fn collect_browser(&self, cache_dir: &std::path::Path) -> BrowserSignals {
        let Some(target) = BrowserLocator::new().locate().await else {
            info!("no browser history store located");
            return BrowserSignals::default();
        };
        match HistoryExtractor::new(cache_dir).extract(&target).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(browser = %target.kind, error = %e, "history extraction failed");
                BrowserSignals::default()
            }
        }
    }

    /// Fold newly collected identifiers into the durable identity map.
    fn update_identity_map(&self, bundle: &SignalsBundle) -> IdentityMap {
        let path = self.paths.identity_map_path();
        let mut identity = match IdentityMap::load(&path) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "identity map unreadable, starting fresh");
                IdentityMap::default()
            }
        };

        let mut added = 0;
        if let Some(devenv) = &bundle.devenv {
            if let Some(name) = &devenv.git_name {
                added += identity.add_contacts([name.as_str()], "vcs");
            }
            if let Some(email) = &devenv.git_email {
                added += identity.add_contacts([email.as_str()], "vcs");
            }
        }
        if let Some(messages) = &bundle.messages {
            added += identity.add_contacts(&messages.contacts, "messages");
            let event_names = extract_names_from_titles(&messages.event_titles);
            added += identity.add_contacts(&event_names, "calendar");
        }

        if added > 0 {
            if let Err(e) = identity.save(&path) {
                warn!(error = %e, "identity map save failed");
            }
        }
        identity
    }

    /// Format, assemble, tier, and pseudonymize the final document.
    fn build_digest(
        &self,
        consent: &CategoryConsent,
        bundle: &SignalsBundle,
        identity: &IdentityMap,
    ) -> String {
        let mut sections: Vec<String> = Vec::new();
        for category in DiscoveryCategory::ALL {
            if !consent.includes(category) {
                continue;
            }
            let section = match category {
                DiscoveryCategory::BrowsingBookmarks => {
                    digest::format_browsing(bundle.browser.as_ref(), bundle.safari.as_ref())
                }
                DiscoveryCategory::DevEnvironment => bundle
                    .devenv
                    .as_ref()
                    .map(digest::format_devenv)
                    .unwrap_or_else(|| digest::format_devenv(&DevEnvSignals::default())),
                DiscoveryCategory::AppsSystem => bundle
                    .system
                    .as_ref()
                    .map(digest::format_system)
                    .unwrap_or_else(|| digest::format_system(&SystemSignals::default())),
                DiscoveryCategory::MessagesNotes => bundle
                    .messages
                    .as_ref()
                    .map(digest::format_messages)
                    .unwrap_or_else(|| digest::format_messages(&MessageSignals::default())),
            };
            sections.push(section);
        }

        let assembled = digest::assemble(&sections);
        let tiered = tier_sections(&assembled, DEFAULT_DIGEST_LINE_BUDGET);
        // No-op when the map is empty, so it is safe to run every time.
        identity.pseudonymize(&tiered)
    }
}
