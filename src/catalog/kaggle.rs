//! Kaggle public dataset API client.
//!
//! Covers the three calls the pipeline needs: authenticate, list datasets and
//! download a single dataset file.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDateTime};
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{archive_path, CatalogClient, CatalogError, DatasetDescriptor, SearchRequest};
use crate::config::CatalogConfig;

/// API username and key, as issued on the account settings page.
#[derive(Clone, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl std::fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl KaggleCredentials {
    /// Resolve credentials the way the official client does:
    /// `KAGGLE_USERNAME` + `KAGGLE_KEY`, else `kaggle.json` in
    /// `KAGGLE_CONFIG_DIR` or `~/.kaggle`.
    pub fn discover() -> Result<Self, CatalogError> {
        if let (Ok(username), Ok(key)) =
            (std::env::var("KAGGLE_USERNAME"), std::env::var("KAGGLE_KEY"))
        {
            return Ok(Self { username, key });
        }

        let dir = match std::env::var("KAGGLE_CONFIG_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME")
                    .or_else(|_| std::env::var("USERPROFILE"))
                    .map_err(|_| {
                        CatalogError::Authentication(
                            "Unable to determine home directory".to_string(),
                        )
                    })?;
                PathBuf::from(home).join(".kaggle")
            }
        };

        Self::from_file(&dir.join("kaggle.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Authentication(format!(
                "Could not read {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            CatalogError::Authentication(format!("Malformed {}: {}", path.display(), e))
        })
    }
}

/// Raw listing entry. Only the fields the descriptor needs are decoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KaggleDataset {
    #[serde(rename = "ref")]
    reference: String,
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    total_bytes: Option<u64>,
    last_updated: String,
    #[serde(default, alias = "usabilityRatingNullable")]
    usability_rating: Option<f64>,
}

impl KaggleDataset {
    fn into_descriptor(self, web_root: &str) -> Result<DatasetDescriptor, CatalogError> {
        let last_updated_year = parse_year(&self.last_updated).ok_or_else(|| {
            CatalogError::InvalidResponse(format!(
                "Unparseable lastUpdated '{}' for {}",
                self.last_updated, self.reference
            ))
        })?;
        let url = self
            .url
            .unwrap_or_else(|| format!("{}/datasets/{}", web_root, self.reference));

        Ok(DatasetDescriptor {
            title: self.title.unwrap_or_else(|| self.reference.clone()),
            url,
            reference: self.reference,
            usability: self.usability_rating.unwrap_or(0.0),
            last_updated_year,
            size_bytes: self.total_bytes.unwrap_or(0),
        })
    }
}

/// Timestamps come back either as RFC 3339 or without an offset.
fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.year());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ts| ts.year())
}

fn split_reference(dataset_ref: &str) -> Result<(&str, &str), CatalogError> {
    match dataset_ref.split_once('/') {
        Some((owner, slug)) if !owner.is_empty() && !slug.is_empty() && !slug.contains('/') => {
            Ok((owner, slug))
        }
        _ => Err(CatalogError::InvalidReference(dataset_ref.to_string())),
    }
}

/// Map non-success statuses onto the catalog error taxonomy.
async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CatalogError::Authentication(format!("HTTP {} for {}", status, what))
        }
        StatusCode::NOT_FOUND => CatalogError::NotFound(what.to_string()),
        _ => CatalogError::Unavailable(format!("HTTP {} for {} - {}", status, what, body)),
    })
}

/// Authenticated Kaggle API client.
#[derive(Debug)]
pub struct KaggleCatalog {
    base_url: String,
    credentials: KaggleCredentials,
    client: reqwest::Client,
}

impl KaggleCatalog {
    /// Discover credentials and build a client for the configured API root.
    pub fn authenticate(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let credentials = KaggleCredentials::discover()?;
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(
        config: &CatalogConfig,
        credentials: KaggleCredentials,
    ) -> Result<Self, CatalogError> {
        // Idle limits only: an archive may take arbitrarily long to stream.
        let idle = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(idle)
            .read_timeout(idle)
            .build()
            .map_err(|e| CatalogError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(user = %credentials.username, "Catalog client authenticated");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    /// Site root used to build dataset URLs when a listing omits them.
    fn web_root(&self) -> &str {
        self.base_url
            .strip_suffix("/api/v1")
            .unwrap_or(self.base_url.as_str())
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
    }
}

#[async_trait]
impl CatalogClient for KaggleCatalog {
    #[tracing::instrument(
        name = "catalog_search",
        skip(self, request),
        fields(ingest.search = %request.search)
    )]
    async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<DatasetDescriptor>, CatalogError> {
        let response = self
            .get(format!("{}/datasets/list", self.base_url))
            .query(&[
                ("search", request.search.clone()),
                ("minSize", request.min_size.to_string()),
                ("maxSize", request.max_size.to_string()),
                ("page", "1".to_string()),
            ])
            .send()
            .await?;
        let response = check_status(response, "dataset listing").await?;

        let raw: Vec<KaggleDataset> = response.json().await?;
        tracing::debug!(count = raw.len(), "Catalog search returned datasets");

        let web_root = self.web_root().to_string();
        raw.into_iter()
            .map(|entry| entry.into_descriptor(&web_root))
            .collect()
    }

    #[tracing::instrument(name = "catalog_download", skip(self, dest_dir))]
    async fn download_file(
        &self,
        dataset_ref: &str,
        file_name: &str,
        dest_dir: &Path,
        force: bool,
    ) -> Result<PathBuf, CatalogError> {
        let (owner, slug) = split_reference(dataset_ref)?;
        let target = archive_path(dest_dir, file_name);

        if !force && tokio::fs::try_exists(&target).await? {
            tracing::info!(path = %target.display(), "Archive already present, skipping download");
            return Ok(target);
        }

        let url = format!(
            "{}/datasets/download/{}/{}/{}",
            self.base_url,
            urlencoding::encode(owner),
            urlencoding::encode(slug),
            urlencoding::encode(file_name)
        );
        let response = self.get(url).send().await?;
        let response =
            check_status(response, &format!("{}/{}", dataset_ref, file_name)).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let bytes = write_archive(response, &target).await?;

        tracing::info!(
            path = %target.display(),
            bytes,
            "Downloaded dataset archive"
        );
        Ok(target)
    }
}

/// Sibling path the archive is streamed into before it is renamed into place.
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream the response body to `target`. The archive only appears at
/// `target` once every byte has been written; a failed transfer leaves
/// nothing behind.
async fn write_archive(response: reqwest::Response, target: &Path) -> Result<u64, CatalogError> {
    let partial = partial_path(target);
    let written = match stream_to_file(response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %partial.display(),
                        error = %remove_err,
                        "Failed to remove partial archive"
                    );
                }
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, target).await?;
    Ok(written)
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, CatalogError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
