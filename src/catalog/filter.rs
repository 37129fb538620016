//! Dataset discovery: one bounded catalog search plus a client-side quality
//! filter.

use std::io::Write;

use super::{CatalogClient, CatalogError, DatasetDescriptor, SearchRequest};

/// Printed after each listed dataset URL.
pub const SEPARATOR: &str = "------------------------------------------------------";

/// Printed once the listing is done.
pub const LISTING_COMPLETED: &str = "Listing Completed";

/// Bounds for dataset discovery.
///
/// Name and size go to the catalog; usability and year are checked locally.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetQuery {
    pub name_pattern: String,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
    /// Exclusive lower bound on usability.
    pub min_usability: f64,
    /// Inclusive lower bound on the last-update year.
    pub min_year: i32,
}

impl DatasetQuery {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name_pattern.trim().is_empty() {
            return Err(CatalogError::InvalidQuery(
                "name pattern cannot be empty".to_string(),
            ));
        }
        if self.min_size_bytes > self.max_size_bytes {
            return Err(CatalogError::InvalidQuery(format!(
                "min size {} exceeds max size {}",
                self.min_size_bytes, self.max_size_bytes
            )));
        }
        if !(0.0..=1.0).contains(&self.min_usability) {
            return Err(CatalogError::InvalidQuery(format!(
                "min usability {} is outside [0, 1]",
                self.min_usability
            )));
        }
        if !(1000..=9999).contains(&self.min_year) {
            return Err(CatalogError::InvalidQuery(format!(
                "min year {} is not a 4-digit year",
                self.min_year
            )));
        }
        Ok(())
    }

    /// Usability must be strictly above the threshold; a dataset sitting
    /// exactly on it is dropped.
    pub fn accepts(&self, dataset: &DatasetDescriptor) -> bool {
        dataset.usability > self.min_usability && dataset.last_updated_year >= self.min_year
    }

    fn search_request(&self) -> SearchRequest {
        SearchRequest {
            search: self.name_pattern.clone(),
            min_size: self.min_size_bytes,
            max_size: self.max_size_bytes,
        }
    }
}

/// Search the catalog and keep the datasets the query accepts, in catalog
/// order.
#[tracing::instrument(
    name = "list_matching_datasets",
    skip(catalog, query),
    fields(
        ingest.search = %query.name_pattern,
        ingest.candidates = tracing::field::Empty,
        ingest.matches = tracing::field::Empty,
    )
)]
pub async fn list_matching_datasets(
    catalog: &dyn CatalogClient,
    query: &DatasetQuery,
) -> Result<Vec<DatasetDescriptor>, CatalogError> {
    query.validate()?;

    let candidates = catalog.search(&query.search_request()).await?;
    let span = tracing::Span::current();
    span.record("ingest.candidates", candidates.len());

    let matches: Vec<DatasetDescriptor> = candidates
        .into_iter()
        .filter(|dataset| query.accepts(dataset))
        .collect();
    span.record("ingest.matches", matches.len());

    tracing::debug!(
        references = ?matches.iter().map(|d| d.reference.as_str()).collect::<Vec<_>>(),
        "Datasets passed discovery filter"
    );

    Ok(matches)
}

/// Write the listing: each URL followed by a separator line, then the
/// completion marker.
pub fn report_datasets<W: Write>(datasets: &[DatasetDescriptor], mut out: W) -> std::io::Result<()> {
    for dataset in datasets {
        writeln!(out, "{}", dataset.url)?;
        writeln!(out, "{}", SEPARATOR)?;
    }
    writeln!(out, "{}", LISTING_COMPLETED)?;
    out.flush()
}
