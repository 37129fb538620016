//! Single-shot ingestion run: discover, fetch, load.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::Arc;

use crate::catalog::{
    list_matching_datasets, report_datasets, CatalogClient, DatasetDescriptor, DatasetQuery,
    KaggleCatalog,
};
use crate::config::AppConfig;
use crate::fetch::{Fetcher, LocalFile};
use crate::loader::{LoadReport, LoadStrategy, Loader};
use crate::warehouse::SnowflakeWarehouse;

/// Printed once the warehouse accepted the load.
pub const LOADING_FINISHED: &str = "Loading Finished, please check results on Snowflake";

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub query: DatasetQuery,
    pub dataset_ref: String,
    pub file_name: String,
    pub force: bool,
    /// `None` fetches the file but leaves it unloaded.
    pub strategy: Option<LoadStrategy>,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            query: DatasetQuery {
                name_pattern: "fraud".to_string(),
                min_size_bytes: 100_000,
                max_size_bytes: 300_000,
                min_usability: 0.7,
                min_year: 2022,
            },
            dataset_ref: "sgpjesus/bank-account-fraud-dataset-neurips-2022".to_string(),
            file_name: "Base.csv".to_string(),
            force: true,
            strategy: Some(LoadStrategy::DirectAppend),
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub datasets: Vec<DatasetDescriptor>,
    pub local_file: LocalFile,
    pub load: Option<LoadReport>,
}

#[derive(Debug)]
pub struct Pipeline {
    catalog: Arc<dyn CatalogClient>,
    fetcher: Fetcher,
    loader: Loader,
}

impl Pipeline {
    pub fn new(catalog: Arc<dyn CatalogClient>, fetcher: Fetcher, loader: Loader) -> Self {
        Self {
            catalog,
            fetcher,
            loader,
        }
    }

    /// Wire the Kaggle catalog and the Snowflake warehouse from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog: Arc<dyn CatalogClient> = Arc::new(
            KaggleCatalog::authenticate(&config.catalog)
                .context("Failed to authenticate with the dataset catalog")?,
        );
        let fetcher = Fetcher::new(
            catalog.clone(),
            config.paths.temp_dir.clone(),
            config.paths.data_dir.clone(),
        );
        let loader = Loader::new(
            Arc::new(SnowflakeWarehouse::new()),
            config.warehouse.connection_file.clone(),
            config.paths.data_dir.clone(),
            config.paths.temp_dir.clone(),
        )
        .with_cleanup(config.warehouse.cleanup);

        Ok(Self::new(catalog, fetcher, loader))
    }

    /// Run every stage in order, writing the user-facing progress lines to
    /// `out`. The first failing stage aborts the run.
    pub async fn run<W: Write>(&self, plan: &RunPlan, mut out: W) -> Result<PipelineOutcome> {
        let datasets = list_matching_datasets(self.catalog.as_ref(), &plan.query)
            .await
            .context("Dataset listing failed")?;
        report_datasets(&datasets, &mut out)?;

        let local_file = self
            .fetcher
            .fetch_file(&plan.dataset_ref, &plan.file_name, plan.force)
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch '{}' from '{}'",
                    plan.file_name, plan.dataset_ref
                )
            })?;
        writeln!(
            out,
            "Extracted all files to {}",
            dir_label(self.fetcher.data_dir())
        )?;

        let load = match plan.strategy {
            Some(strategy) => {
                let report = self
                    .loader
                    .load(strategy, &plan.file_name)
                    .await
                    .with_context(|| format!("Failed to load '{}'", plan.file_name))?;
                writeln!(out, "{}", LOADING_FINISHED)?;
                Some(report)
            }
            None => {
                tracing::info!(path = %local_file.path.display(), "Load skipped");
                None
            }
        };

        Ok(PipelineOutcome {
            datasets,
            local_file,
            load,
        })
    }
}

/// Directory as shown to the user, always ending in a separator.
fn dir_label(dir: &Path) -> String {
    let shown = dir.display().to_string();
    if shown.ends_with(MAIN_SEPARATOR) {
        shown
    } else {
        format!("{}{}", shown, MAIN_SEPARATOR)
    }
}
