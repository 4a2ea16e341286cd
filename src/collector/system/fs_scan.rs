//! Filesystem sampling.
//!
//! Samples the user's Downloads and Desktop by file-extension frequency
//! and Documents by subfolder name. Dotfiles and dot-directories are
//! ignored; only names and counts are kept, never file contents.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-N caps per sample.
const EXTENSION_LIMIT: usize = 5;
const FOLDER_LIMIT: usize = 20;

/// A name with an occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

/// Folder and extension frequencies sampled from the user's home.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesystemSignals {
    pub downloads_extensions: Vec<NameCount>,
    pub documents_folders: Vec<NameCount>,
    pub desktop_file_types: Vec<NameCount>,
}

impl FilesystemSignals {
    pub fn is_empty(&self) -> bool {
        self.downloads_extensions.is_empty()
            && self.documents_folders.is_empty()
            && self.desktop_file_types.is_empty()
    }
}

/// Sample Downloads, Desktop, and Documents under `home`. Missing
/// directories contribute empty lists.
pub async fn filesystem_signals(home: &Path) -> FilesystemSignals {
    let (downloads, desktop, documents) = tokio::join!(
        extension_counts(home.join("Downloads"), EXTENSION_LIMIT),
        extension_counts(home.join("Desktop"), EXTENSION_LIMIT),
        folder_names(home.join("Documents"), FOLDER_LIMIT),
    );
    FilesystemSignals {
        downloads_extensions: downloads,
        documents_folders: documents,
        desktop_file_types: desktop,
    }
}

/// Count file extensions (lowercased) in one directory, non-recursive.
async fn extension_counts(dir: std::path::PathBuf, limit: usize) -> Vec<NameCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
        return Vec::new();
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(ext) = Path::new(&name).extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            *counts.entry(ext).or_insert(0) += 1;
        }
    }
    top_counts(counts, limit)
}

/// Collect subfolder names from one directory, non-recursive.
async fn folder_names(dir: std::path::PathBuf, limit: usize) -> Vec<NameCount> {
    let mut names: Vec<String> = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
        return Vec::new();
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            names.push(name);
        }
    }
    names.sort();
    names.truncate(limit);
    names
        .into_iter()
        .map(|name| NameCount { name, count: 1 })
        .collect()
}

/// Order counts descending, ties alphabetically, and truncate.
fn top_counts(counts: HashMap<String, usize>, limit: usize) -> Vec<NameCount> {
    let mut out: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount { name, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_extension_frequencies() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("Downloads");
        fs::create_dir_all(&downloads).unwrap();
        for name in ["a.pdf", "b.pdf", "c.PDF", "d.zip", ".hidden.pdf"] {
            fs::write(downloads.join(name), b"x").unwrap();
        }
        fs::create_dir_all(downloads.join("subdir.pdf")).unwrap();

        let signals = filesystem_signals(dir.path()).await;
        assert_eq!(signals.downloads_extensions.len(), 2);
        assert_eq!(signals.downloads_extensions[0].name, "pdf");
        assert_eq!(signals.downloads_extensions[0].count, 3);
        assert_eq!(signals.downloads_extensions[1].name, "zip");
    }

    #[tokio::test]
    async fn test_documents_folders_skip_dotdirs() {
        let dir = tempfile::tempdir().unwrap();
        let documents = dir.path().join("Documents");
        fs::create_dir_all(documents.join("Taxes")).unwrap();
        fs::create_dir_all(documents.join("Recipes")).unwrap();
        fs::create_dir_all(documents.join(".obsidian")).unwrap();
        fs::write(documents.join("loose-file.txt"), b"x").unwrap();

        let signals = filesystem_signals(dir.path()).await;
        let names: Vec<&str> = signals
            .documents_folders
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["Recipes", "Taxes"]);
    }

    #[tokio::test]
    async fn test_missing_directories_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let signals = filesystem_signals(dir.path()).await;
        assert!(signals.is_empty());
    }
}
