//! Seams between the connection manager and the warehouse service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::client::HttpSession;
use crate::error::WarehouseError;
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::warehouses::{ListWarehousesResponse, WarehouseRef};
use crate::workspace::WorkspaceClient;

/// Workspace-level warehouse operations.
#[async_trait]
pub trait WarehouseApi: Send + Sync {
    /// All SQL warehouses visible to the caller, in API order.
    async fn list_warehouses(&self) -> Result<Vec<WarehouseRef>, WarehouseError>;

    /// Open a session on `warehouse`. Authentication or network failures are
    /// reported as [`WarehouseError::Connection`].
    async fn connect(&self, warehouse: &WarehouseRef) -> Result<Arc<dyn SqlSession>, WarehouseError>;
}

/// An open connection to one warehouse.
#[async_trait]
pub trait SqlSession: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, WarehouseError>;

    /// `false` once the session has seen a connection failure or was closed.
    fn is_alive(&self) -> bool;

    async fn close(&self);
}

/// [`WarehouseApi`] backed by the workspace REST API.
pub struct HttpWarehouseApi {
    workspace: WorkspaceClient,
    query_timeout: Duration,
}

impl HttpWarehouseApi {
    pub fn new(workspace: WorkspaceClient, query_timeout: Duration) -> Self {
        Self { workspace, query_timeout }
    }

    pub fn workspace(&self) -> &WorkspaceClient {
        &self.workspace
    }
}

#[async_trait]
impl WarehouseApi for HttpWarehouseApi {
    async fn list_warehouses(&self) -> Result<Vec<WarehouseRef>, WarehouseError> {
        let resp: ListWarehousesResponse = self
            .workspace
            .get_json("/api/2.0/sql/warehouses", &[])
            .await?;
        Ok(resp.warehouses)
    }

    async fn connect(&self, warehouse: &WarehouseRef) -> Result<Arc<dyn SqlSession>, WarehouseError> {
        // Round-trip once so bad credentials or an unknown warehouse surface
        // here, not on the first statement.
        let path = format!("/api/2.0/sql/warehouses/{}", warehouse.id);
        let current: WarehouseRef = self
            .workspace
            .get_json(&path, &[])
            .await
            .map_err(|e| match e {
                WarehouseError::Api { status: 404, body } => {
                    WarehouseError::Connection(format!("warehouse {} not found: {}", warehouse.id, body))
                }
                other => other,
            })?;

        info!(
            warehouse_id = %current.id,
            state = %current.state,
            "Warehouse session opened"
        );

        Ok(Arc::new(HttpSession::new(
            self.workspace.clone(),
            current.id,
            self.query_timeout,
        )))
    }
}

/// [`WarehouseApi`] for a workspace that could not be configured (no host,
/// no credentials). Every call reports the configuration problem.
pub struct UnavailableApi {
    error: WarehouseError,
}

impl UnavailableApi {
    pub fn new(error: WarehouseError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl WarehouseApi for UnavailableApi {
    async fn list_warehouses(&self) -> Result<Vec<WarehouseRef>, WarehouseError> {
        Err(self.error.clone())
    }

    async fn connect(&self, _warehouse: &WarehouseRef) -> Result<Arc<dyn SqlSession>, WarehouseError> {
        Err(self.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use lakedash_core::ConfigError;

    use super::*;

    #[tokio::test]
    async fn unavailable_api_reports_connection_error() {
        let api = UnavailableApi::new(ConfigError::MissingHost.into());
        let err = api.list_warehouses().await.unwrap_err();
        assert!(err.is_connection());
        let err = api
            .connect(&WarehouseRef::pinned("abc"))
            .await
            .err()
            .unwrap();
        assert!(err.is_connection());
    }
}
