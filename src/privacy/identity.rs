//! Durable name→alias mapping and text pseudonymization.
//!
//! Real names and identifiers collected from messaging contacts, VCS
//! config, and calendar titles are replaced with stable `Person N`
//! aliases before any text leaves the device. The mapping is persisted
//! append-only so the same real name maps to the same alias across runs;
//! reversal is possible only through the on-disk map.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One persistent name→alias record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub alias: String,
    pub source: String,
    pub added_at: DateTime<Utc>,
}

/// The append-only alias map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMap {
    records: Vec<IdentityRecord>,
}

/// Aliases follow this shape; real names that already look like aliases
/// are rejected so pseudonymization stays idempotent.
static ALIAS_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^person \d+$").expect("static alias pattern"));

/// Names extracted from event titles: `with <Name>` where the name is one
/// or two capitalized words.
static WITH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bwith\s+([A-Z][a-zA-Z'-]+(?:\s+[A-Z][a-zA-Z'-]+)?)").expect("static name pattern")
});

/// Words after "with" that are not names.
const NAME_STOPWORDS: [&str; 6] = ["The", "My", "Team", "Family", "Everyone", "Client"];

impl IdentityMap {
    /// Load the persisted map; a missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist the map, merging with whatever is already on disk so
    /// records written by another pass are never lost.
    pub fn save(&self, path: &Path) -> Result<(), IdentityError> {
        let mut merged = Self::load(path).unwrap_or_default();
        for record in &self.records {
            if merged.alias_for(&record.name).is_none() {
                merged.records.push(record.clone());
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&merged)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    /// The stable alias for a name, if one was ever assigned.
    pub fn alias_for(&self, name: &str) -> Option<&str> {
        let key = normalize_name(name);
        self.records
            .iter()
            .find(|r| normalize_name(&r.name) == key)
            .map(|r| r.alias.as_str())
    }

    /// Append new contacts, assigning the next sequential alias to each.
    /// Existing names keep their alias. Returns how many were added.
    pub fn add_contacts<I, S>(&mut self, names: I, source: &str) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for name in names {
            let name = name.as_ref().trim();
            if name.len() < 2 || ALIAS_SHAPE.is_match(name) {
                continue;
            }
            if self.alias_for(name).is_some() {
                continue;
            }
            let alias = format!("Person {}", self.records.len() + 1);
            debug!(source, alias = %alias, "new identity mapping");
            self.records.push(IdentityRecord {
                name: name.to_string(),
                alias,
                source: source.to_string(),
                added_at: Utc::now(),
            });
            added += 1;
        }
        added
    }

    /// Replace every mapped name in `text` with its alias.
    ///
    /// Longer names substitute first so "Ann Smith" is never corrupted
    /// by a prior "Ann" replacement. Idempotent, and the identity of the
    /// text when the map is empty.
    pub fn pseudonymize(&self, text: &str) -> String {
        if self.records.is_empty() {
            return text.to_string();
        }

        let mut ordered: Vec<&IdentityRecord> = self.records.iter().collect();
        ordered.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

        let mut out = text.to_string();
        for record in ordered {
            let Ok(re) = name_pattern(record.name.trim()) else {
                continue;
            };
            out = re.replace_all(&out, record.alias.as_str()).into_owned();
        }
        out
    }
}

/// Whole-word pattern for a name. Word boundaries only apply where the
/// name actually starts/ends with a word character, so identifiers like
/// `+15551234567` still match.
fn name_pattern(name: &str) -> Result<Regex, regex::Error> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pattern = String::new();
    if name.chars().next().map(is_word).unwrap_or(false) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(name));
    if name.chars().last().map(is_word).unwrap_or(false) {
        pattern.push_str(r"\b");
    }
    RegexBuilder::new(&pattern).case_insensitive(true).build()
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Pull probable person names out of event titles using the
/// `with <Name>` heuristic. Order-preserving, deduplicated.
pub fn extract_names_from_titles<I, S>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = Vec::new();
    for title in titles {
        for capture in WITH_NAME.captures_iter(title.as_ref()) {
            let name = capture[1].trim().to_string();
            let first_word = name.split_whitespace().next().unwrap_or("");
            if NAME_STOPWORDS.contains(&first_word) {
                continue;
            }
            if !names.iter().any(|n| normalize_name(n) == normalize_name(&name)) {
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_are_stable_and_sequential() {
        let mut map = IdentityMap::default();
        map.add_contacts(["Alice Chen", "Bob"], "messages");
        assert_eq!(map.alias_for("alice chen"), Some("Person 1"));
        assert_eq!(map.alias_for("Bob"), Some("Person 2"));

        // Re-adding does not reassign.
        map.add_contacts(["ALICE CHEN"], "vcs");
        assert_eq!(map.len(), 2);
        assert_eq!(map.alias_for("Alice Chen"), Some("Person 1"));
    }

    #[test]
    fn test_pseudonymize_replaces_names() {
        let mut map = IdentityMap::default();
        map.add_contacts(["Alice Chen", "Bob"], "messages");

        let text = "Lunch with Alice Chen, then review Bob's PR";
        let out = map.pseudonymize(text);
        assert_eq!(out, "Lunch with Person 1, then review Person 2's PR");
    }

    #[test]
    fn test_pseudonymize_idempotent() {
        let mut map = IdentityMap::default();
        map.add_contacts(["Alice Chen", "Bob"], "messages");

        let once = map.pseudonymize("Meeting with Alice Chen and Bob");
        let twice = map.pseudonymize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pseudonymize_empty_map_is_noop() {
        let map = IdentityMap::default();
        let text = "Nothing changes here, not even Alice";
        assert_eq!(map.pseudonymize(text), text);
    }

    #[test]
    fn test_longer_names_substitute_first() {
        let mut map = IdentityMap::default();
        map.add_contacts(["Ann", "Ann Smith"], "messages");

        let out = map.pseudonymize("Call Ann Smith tomorrow");
        // "Ann Smith" maps whole, rather than "Ann" clobbering its prefix.
        assert_eq!(out, "Call Person 2 tomorrow");
    }

    #[test]
    fn test_non_word_identifiers_replaced() {
        let mut map = IdentityMap::default();
        map.add_contacts(["+15551234567"], "messages");

        let out = map.pseudonymize("+15551234567\nother line");
        assert_eq!(out, "Person 1\nother line");
    }

    #[test]
    fn test_alias_shaped_names_rejected() {
        let mut map = IdentityMap::default();
        let added = map.add_contacts(["Person 7", "Real Name"], "messages");
        assert_eq!(added, 1);
        assert!(map.alias_for("Person 7").is_none());
    }

    #[test]
    fn test_save_merges_with_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity_map.json");

        let mut first = IdentityMap::default();
        first.add_contacts(["Alice"], "messages");
        first.save(&path).unwrap();

        let mut second = IdentityMap::load(&path).unwrap();
        second.add_contacts(["Bob"], "vcs");
        second.save(&path).unwrap();

        let loaded = IdentityMap::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.alias_for("Alice"), Some("Person 1"));
        assert_eq!(loaded.alias_for("Bob"), Some("Person 2"));
    }

    #[test]
    fn test_with_name_heuristic() {
        let names = extract_names_from_titles([
            "1:1 with Sarah Lee",
            "Coffee with Sarah Lee",
            "Sync with Team",
            "Standup",
            "Dinner with Marco",
        ]);
        assert_eq!(names, vec!["Sarah Lee".to_string(), "Marco".to_string()]);
    }
}
