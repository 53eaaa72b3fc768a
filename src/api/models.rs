use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Response from the releases/latest endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "browser_download_url", default)]
    pub download_url: String,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub latest_release_url: String,
    pub user_agent: String,
    /// Cap on the whole release-feed request
    pub metadata_timeout: Duration,
    /// Longest wait for connecting or for any single read of an asset body.
    /// A slow but steady download is never cut off.
    pub asset_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            latest_release_url:
                "https://api.github.com/repos/spotdl/spotify-downloader/releases/latest"
                    .to_string(),
            user_agent: format!(
                "SpotifyDownloaderPro/{} (+https://github.com/OmiiiDev/SpotifyDL)",
                env!("CARGO_PKG_VERSION")
            ),
            metadata_timeout: Duration::from_secs(15),
            asset_timeout: Duration::from_secs(60),
        }
    }
}
