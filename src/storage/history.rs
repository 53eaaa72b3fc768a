use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{read_json, write_json, StorageError};
use crate::domain::{AudioFormat, Bitrate, DownloadOutcome, DownloadRequest};

pub const HISTORY_FILE: &str = "download_history.json";
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub content: String,
    pub status: DownloadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub format: AudioFormat,
    pub quality: Bitrate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl HistoryEntry {
    pub fn from_outcome(outcome: &DownloadOutcome, request: &DownloadRequest) -> Self {
        let content = if outcome.content_summary.is_empty() {
            request.source_url.clone()
        } else {
            outcome.content_summary.clone()
        };

        if outcome.success {
            Self {
                timestamp: outcome.timestamp.clone(),
                content,
                status: DownloadStatus::Success,
                error: None,
                format: request.audio_format,
                quality: request.bitrate,
                path: Some(request.output_directory.clone()),
            }
        } else {
            Self {
                timestamp: outcome.timestamp.clone(),
                content,
                status: DownloadStatus::Failed,
                error: Some(outcome.message.clone()),
                format: request.audio_format,
                quality: request.bitrate,
                path: None,
            }
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            DownloadStatus::Success => write!(
                f,
                "✅ {} - {} ({}, {})",
                self.timestamp, self.content, self.quality, self.format
            ),
            DownloadStatus::Failed => write!(
                f,
                "❌ {} - {} - Error: {}",
                self.timestamp,
                self.content,
                self.error.as_deref().unwrap_or("Unknown error")
            ),
        }
    }
}

/// Newest-first download log persisted as a JSON array
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Load from `dir`. A missing or unreadable file gives an empty history.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(HISTORY_FILE);
        let entries = match read_json::<Vec<HistoryEntry>>(&path) {
            Ok(Some(mut entries)) => {
                entries.truncate(HISTORY_LIMIT);
                entries
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable history");
                Vec::new()
            }
        };

        Self { path, entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Insert at the front, dropping the oldest past the limit, and persist.
    pub fn add(&mut self, entry: HistoryEntry) -> Result<(), StorageError> {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_LIMIT);
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear();
        self.save()
    }

    pub fn save(&self) -> Result<(), StorageError> {
        write_json(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            timestamp: format!("2025-01-01 00:00:{:02}", n % 60),
            content: format!("track {}", n),
            status: DownloadStatus::Success,
            error: None,
            format: AudioFormat::Mp3,
            quality: Bitrate::K320,
            path: None,
        }
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path());

        for n in 0..=HISTORY_LIMIT {
            store.add(entry(n)).unwrap();
        }

        assert_eq!(store.entries().len(), HISTORY_LIMIT);
        assert_eq!(store.entries()[0].content, "track 100");
        assert_eq!(store.entries()[HISTORY_LIMIT - 1].content, "track 1");

        let reloaded = HistoryStore::load(dir.path());
        assert_eq!(reloaded.entries(), store.entries());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), "{not json").unwrap();

        let store = HistoryStore::load(dir.path());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_failed_entry() {
        let request = DownloadRequest::new("https://open.spotify.com/track/1", "/music");
        let outcome = DownloadOutcome::failed(
            "Download failed with return code 1.".to_string(),
            request.source_url.clone(),
        );

        let entry = HistoryEntry::from_outcome(&outcome, &request);
        assert_eq!(entry.status, DownloadStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("Download failed with return code 1."));
        assert!(entry.to_string().starts_with("❌"));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["quality"], "320k");
        assert_eq!(json["format"], "mp3");
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_success_entry_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path());
        let request = DownloadRequest::new("saved", "/music");
        let outcome = DownloadOutcome::succeeded("A, B".to_string());

        store.add(HistoryEntry::from_outcome(&outcome, &request)).unwrap();
        let line = store.entries()[0].to_string();
        assert!(line.ends_with("A, B (320k, mp3)"), "{}", line);

        store.clear().unwrap();
        assert!(HistoryStore::load(dir.path()).entries().is_empty());
    }
}
