use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{read_json, write_json, StorageError};
use crate::utils::default_music_dir;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_music_dir")]
    pub download_location: PathBuf,
    /// Keys written by other front-ends, kept as-is on save
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_location: default_music_dir(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load from `dir`, falling back to defaults when missing or unreadable.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let settings = match read_json::<Settings>(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Settings::default()
            }
        };

        Self { path, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn download_location(&self) -> &Path {
        &self.settings.download_location
    }

    pub fn set_download_location(&mut self, location: impl Into<PathBuf>) -> Result<(), StorageError> {
        self.settings.download_location = location.into();
        self.save()
    }

    pub fn save(&self) -> Result<(), StorageError> {
        write_json(&self.path, &self.settings)
    }
}
