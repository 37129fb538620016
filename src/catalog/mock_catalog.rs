//! Mock catalog implementation for testing.
//!
//! Serves datasets and archives from memory so the filter and the fetcher can
//! be exercised without network access.

use super::{archive_path, CatalogClient, CatalogError, DatasetDescriptor, SearchRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock catalog that can be configured to fail for testing error handling.
#[derive(Debug, Default)]
pub struct MockCatalog {
    datasets: Mutex<Vec<DatasetDescriptor>>,
    archives: Mutex<HashMap<(String, String), Vec<u8>>>,
    last_search: Mutex<Option<SearchRequest>>,
    fail_auth: AtomicBool,
    searches: AtomicUsize,
    downloads: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset returned by every search, in insertion order.
    pub fn add_dataset(&self, dataset: DatasetDescriptor) {
        self.datasets.lock().unwrap().push(dataset);
    }

    /// Register the archive bytes served for `file_name` of `dataset_ref`.
    pub fn add_archive(&self, dataset_ref: &str, file_name: &str, bytes: Vec<u8>) {
        self.archives
            .lock()
            .unwrap()
            .insert((dataset_ref.to_string(), file_name.to_string()), bytes);
    }

    /// Configure whether every call should fail authentication.
    pub fn set_fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        self.last_search.lock().unwrap().clone()
    }

    fn check_auth(&self) -> Result<(), CatalogError> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(CatalogError::Authentication("mock credentials rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<DatasetDescriptor>, CatalogError> {
        self.check_auth()?;
        self.searches.fetch_add(1, Ordering::SeqCst);
        *self.last_search.lock().unwrap() = Some(request.clone());
        Ok(self.datasets.lock().unwrap().clone())
    }

    async fn download_file(
        &self,
        dataset_ref: &str,
        file_name: &str,
        dest_dir: &Path,
        force: bool,
    ) -> Result<PathBuf, CatalogError> {
        self.check_auth()?;

        let target = archive_path(dest_dir, file_name);
        if target.exists() && !force {
            return Ok(target);
        }

        let bytes = self
            .archives
            .lock()
            .unwrap()
            .get(&(dataset_ref.to_string(), file_name.to_string()))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("{}/{}", dataset_ref, file_name)))?;

        std::fs::create_dir_all(dest_dir)?;
        std::fs::write(&target, bytes)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(target)
    }
}
