use futures::Stream;
use futures::TryStreamExt;
use reqwest::Client;
use thiserror::Error;

use super::models::{ApiConfig, Release};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    client: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.asset_timeout)
            .read_timeout(config.asset_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// Fetch tag and asset list of the newest release
    pub async fn latest_release(&self) -> Result<Release> {
        let response = self
            .client
            .get(&self.config.latest_release_url)
            .header("Accept", "application/vnd.github+json")
            .timeout(self.config.metadata_timeout)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Release request failed: {}", e)))?;

        let release: Release = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        Ok(release)
    }

    /// Download a release asset with progress stream
    /// Returns (total_size, stream)
    pub async fn download_asset_stream(
        &self,
        download_url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .client
            .get(download_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Download request failed: {}", e)))?;

        let total_size = response.content_length().filter(|size| *size > 0);
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use std::time::Duration;

    fn client_for(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(ApiConfig {
            latest_release_url: format!("{}/releases/latest", server.url()),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_latest_release() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/releases/latest")
            .match_header("user-agent", mockito::Matcher::Regex("SpotifyDownloaderPro".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"tag_name":"v4.2.11","assets":[{"name":"spotdl-4.2.11-win32.exe","browser_download_url":"https://example.com/a.exe","size":12}]}"#,
            )
            .create_async()
            .await;

        let release = client_for(&server).latest_release().await.unwrap();
        mock.assert_async().await;
        assert_eq!(release.tag_name, "v4.2.11");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].download_url, "https://example.com/a.exe");
    }

    #[tokio::test]
    async fn test_latest_release_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/releases/latest")
            .with_status(403)
            .create_async()
            .await;

        let err = client_for(&server).latest_release().await.unwrap_err();
        assert!(matches!(err, ApiError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_download_asset_stream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/asset.exe")
            .with_status(200)
            .with_body("binary-payload")
            .create_async()
            .await;

        let client = client_for(&server);
        let (total, stream) = client
            .download_asset_stream(&format!("{}/asset.exe", server.url()))
            .await
            .unwrap();
        assert_eq!(total, Some(14));

        let chunks: Vec<_> = stream.collect().await;
        let body: Vec<u8> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.unwrap().to_vec())
            .collect();
        assert_eq!(body, b"binary-payload");
    }

    #[tokio::test]
    async fn test_slow_asset_outlasts_read_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/slow.exe")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..4 {
                    w.write_all(b"chunk")?;
                    w.flush()?;
                    std::thread::sleep(Duration::from_millis(400));
                }
                Ok(())
            })
            .create_async()
            .await;

        // Each gap is under the timeout, the whole body is not.
        let client = ApiClient::new(ApiConfig {
            asset_timeout: Duration::from_secs(1),
            ..ApiConfig::default()
        })
        .unwrap();
        let (total, stream) = client
            .download_asset_stream(&format!("{}/slow.exe", server.url()))
            .await
            .unwrap();
        assert_eq!(total, None);

        let body: Vec<u8> = stream
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await;
        assert_eq!(body, b"chunkchunkchunkchunk".to_vec());
    }
}
