//! Warehouse loading of an extracted dataset file.
//!
//! One `Loader` covers both ingestion paths:
//! - `DirectAppend`: parse the file into memory and append it to the
//!   destination table.
//! - `StageAndCopy`: upload the file verbatim to a named stage, then COPY it
//!   into the destination table, skipping bad rows.
//!
//! Every operation opens its own session from a freshly read connection
//! descriptor and closes it before returning, on success and on failure.
//! Whether the local file is deleted after a failed load is decided by the
//! loader's `CleanupPolicy`.

pub mod sql;
mod table;

pub use table::InMemoryTable;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::warehouse::{ConnectionConfig, Warehouse, WarehouseError, WarehouseSession};

/// When the local source file is removed after a load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Remove the file once the warehouse call returns, even if it failed.
    Always,
    /// Remove the file only after the warehouse confirmed the load.
    #[default]
    OnSuccess,
}

/// Ingestion path into the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    DirectAppend,
    StageAndCopy,
}

/// Outcome of a load that reached the warehouse successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub strategy: LoadStrategy,
    /// Rows read locally. Not known for staged loads, which never parse the
    /// file client-side.
    pub rows: Option<usize>,
    pub local_file_removed: bool,
}

/// Loads files from `data_dir` into the fixed destination table.
#[derive(Debug)]
pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
    connection_file: PathBuf,
    data_dir: PathBuf,
    temp_dir: PathBuf,
    cleanup: CleanupPolicy,
}

impl Loader {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        connection_file: PathBuf,
        data_dir: PathBuf,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            warehouse,
            connection_file,
            data_dir,
            temp_dir,
            cleanup: CleanupPolicy::default(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn cleanup(&self) -> CleanupPolicy {
        self.cleanup
    }

    /// Run the whole ingestion path for `strategy`.
    pub async fn load(
        &self,
        strategy: LoadStrategy,
        file_name: &str,
    ) -> Result<LoadReport, WarehouseError> {
        match strategy {
            LoadStrategy::DirectAppend => self.load_table_direct(file_name).await,
            LoadStrategy::StageAndCopy => {
                let report = self.load_via_stage(file_name).await?;
                self.copy_staged_into_table(file_name).await?;
                Ok(report)
            }
        }
    }

    /// Parse `file_name` into memory and append it to the destination table.
    ///
    /// The table is created from the inferred schema when missing. Rows are
    /// shipped as a transient Parquet file through the table's own stage.
    #[tracing::instrument(
        name = "load_table_direct",
        skip(self),
        fields(ingest.table = sql::DESTINATION_TABLE, ingest.rows = tracing::field::Empty)
    )]
    pub async fn load_table_direct(&self, file_name: &str) -> Result<LoadReport, WarehouseError> {
        let path = self.data_dir.join(file_name);

        let table = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || InMemoryTable::read_csv(&path))
                .await
                .map_err(|e| WarehouseError::Data(format!("CSV read task failed: {}", e)))??
        };
        let rows = table.num_rows();
        tracing::Span::current().record("ingest.rows", rows);

        let parquet_name = format!("{}.parquet", file_stem(file_name));
        let parquet_path = self.temp_dir.join(&parquet_name);

        let mut session = self.open_session().await?;
        let outcome = append_table(session.as_mut(), table, &parquet_path, &parquet_name).await;
        remove_transient(&parquet_path).await;
        let outcome = finish_session(session, outcome).await;

        let removed = self.release_local_file(&path, &outcome).await?;
        outcome?;

        tracing::info!(rows, "Loading Finished");
        Ok(LoadReport {
            strategy: LoadStrategy::DirectAppend,
            rows: Some(rows),
            local_file_removed: removed,
        })
    }

    /// Upload `file_name` verbatim to the fixed stage, uncompressed and
    /// overwriting any previous upload of the same name.
    #[tracing::instrument(name = "load_via_stage", skip(self), fields(ingest.stage = sql::STAGE))]
    pub async fn load_via_stage(&self, file_name: &str) -> Result<LoadReport, WarehouseError> {
        let path = self.data_dir.join(file_name);
        let absolute = std::path::absolute(&path)?;

        let mut session = self.open_session().await?;
        let outcome = session
            .execute(&sql::put_file(&absolute, sql::STAGE, false, true))
            .await;
        let outcome = finish_session(session, outcome).await;

        let removed = self.release_local_file(&path, &outcome).await?;
        outcome?;

        tracing::info!("File staged");
        Ok(LoadReport {
            strategy: LoadStrategy::StageAndCopy,
            rows: None,
            local_file_removed: removed,
        })
    }

    /// COPY a previously staged `file_name` into the destination table.
    ///
    /// Rows the file format rejects are skipped by the warehouse and not
    /// reported; a stage holding no matching file is not an error either.
    #[tracing::instrument(
        name = "copy_staged_into_table",
        skip(self),
        fields(ingest.table = sql::DESTINATION_TABLE, ingest.stage = sql::STAGE)
    )]
    pub async fn copy_staged_into_table(&self, file_name: &str) -> Result<(), WarehouseError> {
        let mut session = self.open_session().await?;
        let outcome = session
            .execute(&sql::copy_staged_csv(
                sql::DESTINATION_TABLE,
                sql::STAGE,
                file_name,
                sql::FILE_FORMAT,
            ))
            .await;
        finish_session(session, outcome).await?;

        tracing::info!("Staged copy finished");
        Ok(())
    }

    /// Read the connection descriptor and open a session with it.
    async fn open_session(&self) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        let config = ConnectionConfig::from_file(&self.connection_file).await?;
        self.warehouse.connect(config).await
    }

    /// Apply the cleanup policy to the local file once the warehouse call has
    /// returned. Returns whether the file was removed.
    ///
    /// A removal failure after a successful load is an error; after a failed
    /// load it is only logged so the load error is what surfaces.
    async fn release_local_file<T>(
        &self,
        path: &Path,
        outcome: &Result<T, WarehouseError>,
    ) -> Result<bool, WarehouseError> {
        let remove = match self.cleanup {
            CleanupPolicy::Always => true,
            CleanupPolicy::OnSuccess => outcome.is_ok(),
        };
        if !remove {
            tracing::warn!(path = %path.display(), "Load failed, keeping local file");
            return Ok(false);
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                if outcome.is_err() {
                    tracing::warn!(path = %path.display(), "Load failed, local file removed anyway");
                }
                Ok(true)
            }
            Err(e) if outcome.is_ok() => Err(e.into()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove local file");
                Ok(false)
            }
        }
    }
}

/// Create the table if needed, stage the rows as Parquet and COPY them in.
async fn append_table(
    session: &mut dyn WarehouseSession,
    table: InMemoryTable,
    parquet_path: &Path,
    parquet_name: &str,
) -> Result<(), WarehouseError> {
    session
        .execute(&sql::create_table_if_absent(
            sql::DESTINATION_TABLE,
            table.schema(),
        ))
        .await?;

    let bytes = {
        let parquet_path = parquet_path.to_path_buf();
        tokio::task::spawn_blocking(move || table.write_parquet(&parquet_path))
            .await
            .map_err(|e| WarehouseError::Data(format!("Parquet write task failed: {}", e)))??
    };
    tracing::debug!(bytes, "Transient Parquet file written");

    let absolute = std::path::absolute(parquet_path)?;
    session
        .execute(&sql::put_file(
            &absolute,
            &sql::table_stage(sql::DESTINATION_TABLE),
            false,
            true,
        ))
        .await?;
    session
        .execute(&sql::copy_parquet_from_table_stage(
            sql::DESTINATION_TABLE,
            parquet_name,
        ))
        .await
}

/// Close the session exactly once and merge its result with the operation's.
/// The operation's error wins over a close error.
async fn finish_session<T>(
    mut session: Box<dyn WarehouseSession>,
    outcome: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    let closed = session.close().await;
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!(error = %close_err, "Failed to close session after load error");
            Err(e)
        }
    }
}

async fn remove_transient(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove transient file");
        }
    }
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_drops_extension() {
        assert_eq!(file_stem("Base.csv"), "Base");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(file_stem(""), "upload");
    }

    #[test]
    fn cleanup_policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&CleanupPolicy::OnSuccess).unwrap(),
            "\"on_success\""
        );
        assert_eq!(
            serde_json::from_str::<CleanupPolicy>("\"always\"").unwrap(),
            CleanupPolicy::Always
        );
    }
}
