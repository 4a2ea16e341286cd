//! Digest formatting.
//!
//! Turns collected signals into the Markdown document consumed by the
//! downstream synthesis step: `## <Section>` / `### <Subsection>` headers
//! over plain `name (count)` lines. Section order within a category is
//! fixed; assembly is by key, never by collector finish order.

use crate::collector::browser::types::{BookmarkEntry, BrowserSignals};
use crate::collector::devenv::DevEnvSignals;
use crate::collector::messages::MessageSignals;
use crate::collector::system::SystemSignals;
use crate::privacy::extract_names_from_titles;

/// Placeholder emitted when a category produced nothing.
pub const NO_DATA: &str = "No data available";

/// Formatting caps. Extraction already bounds the raw lists; these keep
/// the digest itself readable.
const CLUSTER_LINES: usize = 10;
const RECENT_LINES: usize = 20;
const ALL_TIME_LINES: usize = 15;
const DETAIL_DOMAINS: usize = 8;
const DETAIL_LINES: usize = 5;
const BOOKMARK_FOLDERS: usize = 15;
const BOOKMARKS_PER_FOLDER: usize = 8;

/// `## Browsing`: Chromium signals plus the optional Safari overlay.
pub fn format_browsing(
    chromium: Option<&BrowserSignals>,
    safari: Option<&BrowserSignals>,
) -> String {
    let mut out = String::from("## Browsing\n");

    let empty = chromium.map(|s| s.is_empty()).unwrap_or(true)
        && safari.map(|s| s.is_empty()).unwrap_or(true);
    if empty {
        out.push_str(NO_DATA);
        out.push('\n');
        return out;
    }

    if let Some(signals) = chromium {
        if let Some(browser) = signals.browser {
            out.push_str(&format!("Primary browser: {browser}\n"));
        }
        if !signals.cluster_labels.is_empty() {
            out.push_str("\n### Topic clusters\n");
            for label in signals.cluster_labels.iter().take(CLUSTER_LINES) {
                out.push_str(label);
                out.push('\n');
            }
        }
        if !signals.recent_domains.is_empty() {
            out.push_str("\n### Recent sites (last 7 days)\n");
            for visit in signals.recent_domains.iter().take(RECENT_LINES) {
                out.push_str(&format!("{} ({})\n", visit.domain, visit.visits));
            }
        }
        if !signals.all_time_domains.is_empty() {
            out.push_str("\n### All-time sites\n");
            for visit in signals.all_time_domains.iter().take(ALL_TIME_LINES) {
                out.push_str(&format!("{} ({})\n", visit.domain, visit.visits));
            }
        }
        for (domain, details) in signals.domain_details.iter().take(DETAIL_DOMAINS) {
            out.push_str(&format!("\n### Pages: {domain}\n"));
            for detail in details.iter().take(DETAIL_LINES) {
                out.push_str(&format!("{} ({})\n", detail.title, detail.visit_count));
            }
        }
    }

    if let Some(signals) = safari {
        if !signals.recent_domains.is_empty() {
            out.push_str("\n### Safari recent sites (last 7 days)\n");
            for visit in signals.recent_domains.iter().take(RECENT_LINES) {
                out.push_str(&format!("{} ({})\n", visit.domain, visit.visits));
            }
        }
        out.push_str(&format_bookmarks(&signals.bookmarks));
    }

    out
}

/// Group bookmarks by folder, capped at 15 folders of 8 entries.
fn format_bookmarks(bookmarks: &[BookmarkEntry]) -> String {
    if bookmarks.is_empty() {
        return String::new();
    }
    let mut folders: Vec<(&str, Vec<&BookmarkEntry>)> = Vec::new();
    for entry in bookmarks {
        match folders.iter_mut().find(|(name, _)| *name == entry.folder) {
            Some((_, entries)) => entries.push(entry),
            None => folders.push((entry.folder.as_str(), vec![entry])),
        }
    }

    let mut out = String::new();
    for (folder, entries) in folders.into_iter().take(BOOKMARK_FOLDERS) {
        out.push_str(&format!("\n### Bookmarks: {folder}\n"));
        for entry in entries.into_iter().take(BOOKMARKS_PER_FOLDER) {
            out.push_str(&entry.title);
            out.push('\n');
        }
    }
    out
}

/// `## Development environment`
pub fn format_devenv(signals: &DevEnvSignals) -> String {
    let mut out = String::from("## Development environment\n");
    if signals.is_empty() {
        out.push_str(NO_DATA);
        out.push('\n');
        return out;
    }

    if !signals.dotfiles.is_empty() {
        out.push_str("\n### Dotfiles\n");
        for dotfile in &signals.dotfiles {
            out.push_str(dotfile);
            out.push('\n');
        }
    }
    if signals.git_name.is_some() || signals.git_email.is_some() {
        out.push_str("\n### Git identity\n");
        if let Some(name) = &signals.git_name {
            out.push_str(&format!("user.name: {name}\n"));
        }
        if let Some(email) = &signals.git_email {
            out.push_str(&format!("user.email: {email}\n"));
        }
    }
    if !signals.runtimes.is_empty() {
        out.push_str("\n### Runtimes\n");
        for runtime in &signals.runtimes {
            out.push_str(&format!("{} ({})\n", runtime.name, runtime.version));
        }
    }
    out
}

/// `## Apps & system`
pub fn format_system(signals: &SystemSignals) -> String {
    let mut out = String::from("## Apps & system\n");
    if signals.is_empty() {
        out.push_str(NO_DATA);
        out.push('\n');
        return out;
    }

    if !signals.dock_pins.is_empty() {
        out.push_str("\n### Dock pins\n");
        for pin in &signals.dock_pins {
            out.push_str(&pin.label);
            out.push('\n');
        }
    }
    if !signals.app_usage.is_empty() {
        out.push_str("\n### App usage (minutes, last 7 days)\n");
        for usage in &signals.app_usage {
            out.push_str(&format!("{} ({})\n", usage.app, usage.duration_minutes));
        }
    }
    let fs = &signals.filesystem;
    if !fs.downloads_extensions.is_empty() {
        out.push_str("\n### Downloads file types\n");
        for item in &fs.downloads_extensions {
            out.push_str(&format!("{} ({})\n", item.name, item.count));
        }
    }
    if !fs.desktop_file_types.is_empty() {
        out.push_str("\n### Desktop file types\n");
        for item in &fs.desktop_file_types {
            out.push_str(&format!("{} ({})\n", item.name, item.count));
        }
    }
    if !fs.documents_folders.is_empty() {
        out.push_str("\n### Documents folders\n");
        for item in &fs.documents_folders {
            out.push_str(&item.name);
            out.push('\n');
        }
    }
    out
}

/// `## Messages & notes`, formatted raw; the privacy pass replaces
/// every mapped name afterwards.
pub fn format_messages(signals: &MessageSignals) -> String {
    let mut out = String::from("## Messages & notes\n");
    if signals.is_empty() {
        out.push_str(NO_DATA);
        out.push('\n');
        return out;
    }

    if signals.recent_message_count > 0 {
        out.push_str("\n### Activity\n");
        out.push_str(&format!(
            "messages last 7 days ({})\n",
            signals.recent_message_count
        ));
    }
    if !signals.contacts.is_empty() {
        out.push_str("\n### Frequent contacts\n");
        for contact in signals.contacts.iter().take(15) {
            out.push_str(contact);
            out.push('\n');
        }
    }
    let people = extract_names_from_titles(&signals.event_titles);
    if !people.is_empty() {
        out.push_str("\n### Recurring meetings with\n");
        for person in people.iter().take(15) {
            out.push_str(person);
            out.push('\n');
        }
    }
    out
}

/// Concatenate category sections in their fixed order.
pub fn assemble(sections: &[String]) -> String {
    sections
        .iter()
        .map(|s| s.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
        + "\n"
}
