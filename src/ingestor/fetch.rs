//! Downloads a source's playlist or guide into the import folder
//!
//! Content is staged in `<destination>.tmp` and renamed over the destination
//! only once the transfer has fully succeeded, so a failed or abandoned fetch
//! leaves the previous import untouched.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::errors::{FetchError, FetchResult};
use crate::utils::atomic_file::temp_path_for;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `locator` into `destination`, returning the number of bytes stored
    async fn fetch(&self, locator: &str, destination: &Path) -> FetchResult<u64>;
}

/// Where a locator points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Remote(Url),
    Local(PathBuf),
}

impl Locator {
    pub fn parse(locator: &str) -> FetchResult<Self> {
        let invalid = || FetchError::InvalidLocator {
            locator: locator.to_string(),
        };
        if locator.trim().is_empty() {
            return Err(invalid());
        }

        match Url::parse(locator) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Remote(url)),
                "file" => url.to_file_path().map(Self::Local).map_err(|_| invalid()),
                // Single letter schemes are Windows drive prefixes
                scheme if scheme.len() == 1 => Ok(Self::Local(PathBuf::from(locator))),
                _ => Err(invalid()),
            },
            Err(_) => Ok(Self::Local(PathBuf::from(locator))),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &Url, temp: &Path) -> FetchResult<u64> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(temp)
            .await
            .map_err(|e| FetchError::staging(temp.display().to_string(), e))?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::staging(temp.display().to_string(), e))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| FetchError::staging(temp.display().to_string(), e))?;
        Ok(downloaded)
    }

    async fn copy_local(&self, source: &Path, temp: &Path) -> FetchResult<u64> {
        tokio::fs::copy(source, temp)
            .await
            .map_err(|e| FetchError::staging(source.display().to_string(), e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str, destination: &Path) -> FetchResult<u64> {
        let locator = Locator::parse(locator)?;
        debug!("> Fetch {:?} into {}", locator, destination.display());

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::staging(parent.display().to_string(), e))?;
        }

        let temp = temp_path_for(destination);
        let result = match &locator {
            Locator::Remote(url) => self.download(url, &temp).await,
            Locator::Local(path) => self.copy_local(path, &temp).await,
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove {}: {}", temp.display(), cleanup);
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&temp, destination)
            .await
            .map_err(|e| FetchError::staging(destination.display().to_string(), e))?;

        info!("Fetched {} bytes into {}", bytes, destination.display());
        Ok(bytes)
    }
}
