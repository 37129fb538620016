//! Warehouse access: connection descriptor, sessions and the Snowflake
//! implementation.

mod error;
mod mock_warehouse;
mod snowflake;

pub use error::WarehouseError;
pub use mock_warehouse::{MockWarehouse, SessionEvent};
pub use snowflake::SnowflakeWarehouse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Warehouse connection parameters as read from the JSON descriptor.
///
/// Nothing beyond JSON shape is checked here; a descriptor lacking what the
/// warehouse needs fails when the session is opened.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// PEM-encoded private key for key-pair authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Keys this crate does not use are carried along untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("has_password", &self.password.is_some())
            .field("has_private_key", &self.private_key.is_some())
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

impl ConnectionConfig {
    /// Read the descriptor from disk. Called once per loader operation.
    pub async fn from_file(path: &Path) -> Result<Self, WarehouseError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            WarehouseError::Config(format!("Could not read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
            .map_err(|e| WarehouseError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// One open warehouse connection.
///
/// The owner must call `close` exactly once when done, whatever happened in
/// between.
#[async_trait]
pub trait WarehouseSession: Send {
    /// Execute a single SQL statement (including `PUT`).
    async fn execute(&mut self, sql: &str) -> Result<(), WarehouseError>;

    /// Release the underlying connection.
    async fn close(&mut self) -> Result<(), WarehouseError>;
}

/// Factory for warehouse sessions.
#[async_trait]
pub trait Warehouse: Send + Sync + std::fmt::Debug {
    async fn connect(
        &self,
        config: ConnectionConfig,
    ) -> Result<Box<dyn WarehouseSession>, WarehouseError>;
}
