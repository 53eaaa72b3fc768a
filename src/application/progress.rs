use std::sync::LazyLock;

use regex::Regex;

use crate::domain::TrackProgress;

static FOUND_TRACKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Found (\d+) tracks").expect("valid regex"));
static DOWNLOADING_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Downloading (.+)").expect("valid regex"));

const CONSOLE_MARKERS: [&str; 4] = ["Downloading", "Found", "Downloaded", "Error"];

/// What a single downloader output line means for the job
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineSignal {
    /// Line to show on the console, trimmed
    pub console: Option<String>,
    /// Emitted when the line starts a new track
    pub progress: Option<TrackProgress>,
}

/// Folds downloader output lines into track counts and titles.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    current: u32,
    total: u32,
    titles: Vec<String>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self {
            current: 0,
            total: 1,
            titles: Vec::new(),
        }
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, line: &str) -> LineSignal {
        let mut signal = LineSignal::default();

        if CONSOLE_MARKERS.iter().any(|marker| line.contains(marker)) {
            signal.console = Some(line.trim().to_string());
        }

        if line.contains("Downloading ") {
            self.current += 1;
            signal.progress = Some(self.snapshot());

            if let Some(caps) = DOWNLOADING_TITLE.captures(line) {
                let title = caps[1].trim();
                if !title.is_empty() {
                    self.titles.push(title.to_string());
                }
            }
        } else if let Some(caps) = FOUND_TRACKS.captures(line) {
            // The total can arrive after downloads have started; a later
            // value always replaces the earlier one.
            if let Ok(total) = caps[1].parse::<u32>() {
                self.total = total;
            }
        }

        signal
    }

    pub fn snapshot(&self) -> TrackProgress {
        TrackProgress {
            current: self.current,
            total: self.total.max(1),
        }
    }

    /// Comma-joined titles, or `fallback` when none were seen
    pub fn summary(&self, fallback: &str) -> String {
        if self.titles.is_empty() {
            fallback.to_string()
        } else {
            self.titles.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_then_downloading() {
        let mut tracker = ProgressTracker::new();

        let found = tracker.observe("Found 3 tracks in album");
        assert_eq!(found.console.as_deref(), Some("Found 3 tracks in album"));
        assert!(found.progress.is_none());

        let mut percents = Vec::new();
        for title in ["Song A", "Song B", "Song C"] {
            let signal = tracker.observe(&format!("Downloading {}\n", title));
            let progress = signal.progress.unwrap();
            assert_eq!(progress.total, 3);
            percents.push(progress.percent());
        }

        assert_eq!(percents, vec![33, 66, 100]);
        assert_eq!(tracker.summary("url"), "Song A, Song B, Song C");
    }

    #[test]
    fn test_total_corrected_mid_run() {
        let mut tracker = ProgressTracker::new();

        let first = tracker.observe("Downloading Intro").progress.unwrap();
        assert_eq!(first, TrackProgress { current: 1, total: 1 });
        assert_eq!(first.percent(), 100);

        tracker.observe("Found 4 tracks");
        let second = tracker.observe("Downloading Outro").progress.unwrap();
        assert_eq!(second, TrackProgress { current: 2, total: 4 });
        assert_eq!(second.percent(), 50);
    }

    #[test]
    fn test_noise_is_dropped() {
        let mut tracker = ProgressTracker::new();
        let signal = tracker.observe("Processing query: spotify:track:123");
        assert_eq!(signal, LineSignal::default());

        let error = tracker.observe("  Error: rate limited  ");
        assert_eq!(error.console.as_deref(), Some("Error: rate limited"));
        assert!(error.progress.is_none());

        let done = tracker.observe("Downloaded \"Song A\": https://youtube.com/x");
        assert!(done.console.is_some());
        assert!(done.progress.is_none());
        assert_eq!(tracker.summary("saved"), "saved");
    }

    #[test]
    fn test_zero_total_is_guarded() {
        let mut tracker = ProgressTracker::new();
        tracker.observe("Found 0 tracks");
        let progress = tracker.observe("Downloading Something").progress.unwrap();
        assert_eq!(progress.total, 1);
        assert_eq!(progress.percent(), 100);
    }
}
