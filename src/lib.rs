pub mod catalog;
pub mod config;
pub mod fetch;
pub mod loader;
pub mod pipeline;
pub mod telemetry;
pub mod warehouse;

pub use catalog::{CatalogClient, DatasetDescriptor, DatasetQuery};
pub use fetch::{Fetcher, LocalFile};
pub use loader::{CleanupPolicy, LoadReport, LoadStrategy, Loader};
pub use pipeline::{Pipeline, RunPlan};
pub use warehouse::{ConnectionConfig, Warehouse, WarehouseSession};
