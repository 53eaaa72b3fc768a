use std::path::PathBuf;

pub const APP_NAME: &str = "SpotifyDownloaderPro";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time formatted the way history entries store it
pub fn get_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Directory holding the running executable; bundled tools live next to it.
pub fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Per-user directory for settings and history files
pub fn app_data_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default download location, `~/Music`
pub fn default_music_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Music"))
        .unwrap_or_else(|| PathBuf::from("Music"))
}
