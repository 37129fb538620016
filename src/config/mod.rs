use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::CleanupPolicy;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Root of the catalog REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connect timeout and per-read idle timeout for catalog calls. A
    /// transfer that keeps making progress is never cut off.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.kaggle.com/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Where downloaded archives land before extraction.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Where extracted dataset files live until they are loaded.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WarehouseConfig {
    /// JSON connection descriptor, read fresh by every loader operation.
    #[serde(default = "default_connection_file")]
    pub connection_file: PathBuf,
    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            connection_file: default_connection_file(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

fn default_connection_file() -> PathBuf {
    PathBuf::from("connection.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector. `OTEL_EXPORTER_OTLP_ENDPOINT` takes precedence.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "catalog-ingest".to_string()
}

/// Environment variables with prefix INGEST_
/// Example: INGEST_PATHS__DATA_DIR=/var/lib/ingest/data
fn environment() -> config::Environment {
    config::Environment::with_prefix("INGEST")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from an optional file and environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, environment())
    }

    fn load_with_env(config_path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(env);

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.catalog.base_url.trim().is_empty() {
            anyhow::bail!("Catalog 'base_url' cannot be empty");
        }
        if self.catalog.timeout_secs == 0 {
            anyhow::bail!("Catalog 'timeout_secs' must be greater than zero");
        }
        if self.paths.temp_dir.as_os_str().is_empty() || self.paths.data_dir.as_os_str().is_empty()
        {
            anyhow::bail!("Paths 'temp_dir' and 'data_dir' are required");
        }
        if self.telemetry.service_name.trim().is_empty() {
            anyhow::bail!("Telemetry 'service_name' cannot be empty");
        }
        Ok(())
    }
}
