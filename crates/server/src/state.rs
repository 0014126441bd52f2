use std::sync::Arc;
use std::time::Duration;

use lakedash_catalog::{CatalogSessions, MetadataSource, UnavailableSource, UnityCatalogSource};
use lakedash_core::Config;
use lakedash_warehouse::{
    ConnectionManager, HttpWarehouseApi, UnavailableApi, WarehouseApi, WarehouseError,
    WorkspaceClient,
};
use tracing::warn;

pub struct AppState {
    pub config: Config,
    /// The single shared warehouse connection.
    pub warehouse: Arc<ConnectionManager>,
    pub catalog: CatalogSessions,
    /// Service-principal workspace client; `None` when the workspace is not
    /// configured. The identity page derives per-user clients from it.
    pub workspace: Option<WorkspaceClient>,
}

impl AppState {
    /// Wire the workspace services described by `config`.
    ///
    /// An unconfigured workspace does not stop the server: every page then
    /// reports the configuration problem as a connection error.
    pub fn from_config(config: Config) -> Self {
        let ttl = Duration::from_secs(config.server.catalog_session_ttl_seconds);
        let pinned = config.databricks.warehouse_id.clone();

        let api: Arc<dyn WarehouseApi>;
        let source: Arc<dyn MetadataSource>;
        let workspace = match WorkspaceClient::from_config(&config.databricks) {
            Ok(ws) => {
                let timeout = Duration::from_secs(config.databricks.query_timeout_seconds);
                api = Arc::new(HttpWarehouseApi::new(ws.clone(), timeout));
                source = Arc::new(UnityCatalogSource::new(ws.clone()));
                Some(ws)
            }
            Err(e) => {
                warn!(error = %e, "Databricks workspace not configured, data pages will report errors");
                api = Arc::new(UnavailableApi::new(e.clone()));
                source = Arc::new(UnavailableSource::new(e));
                None
            }
        };

        Self::new(
            config,
            ConnectionManager::new(api, pinned),
            CatalogSessions::new(source, ttl),
            workspace,
        )
    }

    pub fn new(
        config: Config,
        warehouse: ConnectionManager,
        catalog: CatalogSessions,
        workspace: Option<WorkspaceClient>,
    ) -> Self {
        Self {
            config,
            warehouse: Arc::new(warehouse),
            catalog,
            workspace,
        }
    }

    /// Client for the workspace, or the configuration error explaining why
    /// there is none.
    pub fn workspace(&self) -> Result<&WorkspaceClient, WarehouseError> {
        self.workspace.as_ref().ok_or_else(|| {
            WarehouseError::Connection("Databricks workspace is not configured".to_string())
        })
    }
}
