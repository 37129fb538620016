//! Dataset catalog access: search, discovery filter and file downloads.

mod error;
mod filter;
mod kaggle;
mod mock_catalog;

pub use error::CatalogError;
pub use filter::{
    list_matching_datasets, report_datasets, DatasetQuery, LISTING_COMPLETED, SEPARATOR,
};
pub use kaggle::{KaggleCatalog, KaggleCredentials};
pub use mock_catalog::MockCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A dataset as listed by the catalog, reduced to the fields the filter and
/// the listing need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Catalog reference, `owner/slug`.
    pub reference: String,
    pub url: String,
    pub title: String,
    /// Catalog-provided quality score in `[0, 1]`.
    pub usability: f64,
    pub last_updated_year: i32,
    pub size_bytes: u64,
}

/// Server-side search bounds sent with a single catalog search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub search: String,
    pub min_size: u64,
    pub max_size: u64,
}

/// Trait for the external dataset catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync + std::fmt::Debug {
    /// Run one search bounded by name and size. Results keep catalog order.
    async fn search(&self, request: &SearchRequest)
        -> Result<Vec<DatasetDescriptor>, CatalogError>;

    /// Download the archive holding `file_name` from `dataset_ref` into
    /// `dest_dir` as `<file_name>.zip` and return its path.
    ///
    /// Without `force` an archive already present at that path is kept and
    /// no download happens.
    async fn download_file(
        &self,
        dataset_ref: &str,
        file_name: &str,
        dest_dir: &Path,
        force: bool,
    ) -> Result<PathBuf, CatalogError>;
}

/// Path a catalog client writes the archive of `file_name` to.
pub fn archive_path(dest_dir: &Path, file_name: &str) -> PathBuf {
    dest_dir.join(format!("{}.zip", file_name))
}
