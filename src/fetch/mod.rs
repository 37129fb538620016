//! Dataset file retrieval: download the archive, unpack it, drop the archive.

mod archive;
mod error;

pub use archive::extract_all;
pub use error::FetchError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::CatalogClient;

/// A dataset file extracted into the working directory.
///
/// Handed to the loader, which decides when it is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    /// Path of the requested file.
    pub path: PathBuf,
    /// Every file the archive produced, the requested one included.
    pub extracted: Vec<PathBuf>,
}

impl LocalFile {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Downloads dataset archives into `temp_dir` and extracts them into
/// `data_dir`.
#[derive(Debug)]
pub struct Fetcher {
    catalog: Arc<dyn CatalogClient>,
    temp_dir: PathBuf,
    data_dir: PathBuf,
}

impl Fetcher {
    pub fn new(catalog: Arc<dyn CatalogClient>, temp_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            catalog,
            temp_dir,
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Fetch `file_name` from `dataset_ref`.
    ///
    /// The archive is removed once extraction succeeds; on failure it stays in
    /// `temp_dir` and the error is returned as is.
    #[tracing::instrument(name = "fetch_file", skip(self))]
    pub async fn fetch_file(
        &self,
        dataset_ref: &str,
        file_name: &str,
        force: bool,
    ) -> Result<LocalFile, FetchError> {
        let archive = self
            .catalog
            .download_file(dataset_ref, file_name, &self.temp_dir, force)
            .await?;

        let dest = self.data_dir.clone();
        let archive_for_extract = archive.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_all(&archive_for_extract, &dest)
        })
        .await
        .map_err(|e| FetchError::Archive(format!("extraction task failed: {}", e)))??;

        tokio::fs::remove_file(&archive).await?;

        tracing::info!(
            files = extracted.len(),
            "Extracted all files to {}",
            self.data_dir.display()
        );

        let path = self.data_dir.join(file_name);
        if !extracted.contains(&path) {
            tracing::warn!(
                expected = %path.display(),
                "Archive did not contain the requested file"
            );
        }

        Ok(LocalFile { path, extracted })
    }
}
