//! Snowflake warehouse implementation using snowflake-api

use async_trait::async_trait;
use snowflake_api::{QueryResult, SnowflakeApi};

use super::{ConnectionConfig, Warehouse, WarehouseError, WarehouseSession};

/// Build a Snowflake client from the descriptor, preferring password auth
/// and falling back to key-pair auth.
fn build_client(config: &ConnectionConfig) -> Result<SnowflakeApi, WarehouseError> {
    let account = config
        .account
        .as_deref()
        .ok_or_else(|| WarehouseError::Session("connection config has no 'account'".into()))?;
    let user = config
        .user
        .as_deref()
        .ok_or_else(|| WarehouseError::Session("connection config has no 'user'".into()))?;

    // API signature: with_password_auth(account, warehouse, database, schema, username, role, password)
    if let Some(password) = config.password.as_deref() {
        SnowflakeApi::with_password_auth(
            account,
            config.warehouse.as_deref(),
            config.database.as_deref(),
            config.schema.as_deref(),
            user,
            config.role.as_deref(),
            password,
        )
        .map_err(|e| WarehouseError::Session(format!("Failed to create Snowflake client: {}", e)))
    } else if let Some(private_key) = config.private_key.as_deref() {
        SnowflakeApi::with_certificate_auth(
            account,
            config.warehouse.as_deref(),
            config.database.as_deref(),
            config.schema.as_deref(),
            user,
            config.role.as_deref(),
            private_key,
        )
        .map_err(|e| {
            WarehouseError::Session(format!(
                "Failed to create Snowflake client with key-pair: {}",
                e
            ))
        })
    } else {
        Err(WarehouseError::Session(
            "Invalid connection config: expected 'password' or 'private_key'".to_string(),
        ))
    }
}

/// Opens Snowflake sessions from connection descriptors.
#[derive(Debug, Default)]
pub struct SnowflakeWarehouse;

impl SnowflakeWarehouse {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    #[tracing::instrument(
        name = "snowflake_connect",
        skip(self, config),
        fields(ingest.account = config.account.as_deref().unwrap_or(""))
    )]
    async fn connect(
        &self,
        config: ConnectionConfig,
    ) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        let client = build_client(&config)?;

        // Authentication is lazy in the client; force it so a bad descriptor
        // fails here rather than on the first load statement.
        client
            .exec("SELECT 1")
            .await
            .map_err(|e| WarehouseError::Session(format!("Login failed: {}", e)))?;

        tracing::debug!("Snowflake session established");
        Ok(Box::new(SnowflakeSession {
            client,
            closed: false,
        }))
    }
}

struct SnowflakeSession {
    client: SnowflakeApi,
    closed: bool,
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        let result = self
            .client
            .exec(sql)
            .await
            .map_err(|e| WarehouseError::Statement(e.to_string()))?;

        match result {
            QueryResult::Arrow(batches) => {
                tracing::debug!(batches = batches.len(), "Statement returned arrow result")
            }
            QueryResult::Json(_) => tracing::debug!("Statement returned JSON result"),
            QueryResult::Empty => tracing::debug!("Statement returned no result"),
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client
            .close_session()
            .await
            .map_err(|e| WarehouseError::Session(format!("Failed to close session: {}", e)))
    }
}
