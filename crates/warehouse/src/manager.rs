//! Process-wide warehouse connection management.
//!
//! [`ConnectionManager`] discovers the warehouse once, owns the single shared
//! [`ConnectionHandle`] and serializes statement execution on it. A
//! connection failure during a statement discards the handle, opens a fresh
//! one and retries that statement exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{SqlSession, WarehouseApi};
use crate::error::WarehouseError;
use crate::result::QueryResult;
use crate::statement::{Params, Statement};
use crate::warehouses::{select_warehouse, WarehouseRef};

/// The shared connection: a session on the selected warehouse plus identity.
pub struct ConnectionHandle {
    id: Uuid,
    warehouse: WarehouseRef,
    session: Arc<dyn SqlSession>,
    opened_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn warehouse(&self) -> &WarehouseRef {
        &self.warehouse
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_alive(&self) -> bool {
        self.session.is_alive()
    }

    async fn execute(&self, statement: &Statement) -> Result<QueryResult, WarehouseError> {
        self.session.execute(statement).await
    }

    async fn close(&self) {
        self.session.close().await;
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("warehouse", &self.warehouse.id)
            .field("opened_at", &self.opened_at)
            .finish()
    }
}

pub struct ConnectionManager {
    api: Arc<dyn WarehouseApi>,
    pinned_warehouse_id: Option<String>,
    warehouse: OnceCell<WarehouseRef>,
    /// Guards the handle and doubles as the statement serializer.
    slot: Mutex<Option<Arc<ConnectionHandle>>>,
    connections_opened: AtomicU64,
}

impl ConnectionManager {
    pub fn new(api: Arc<dyn WarehouseApi>, pinned_warehouse_id: Option<String>) -> Self {
        Self {
            api,
            pinned_warehouse_id,
            warehouse: OnceCell::new(),
            slot: Mutex::new(None),
            connections_opened: AtomicU64::new(0),
        }
    }

    /// Resolve the warehouse to use, once per process.
    ///
    /// A pinned id is used as-is. Otherwise the workspace is listed and
    /// [`select_warehouse`] picks one. Failures are not memoized, so the next
    /// page load tries again.
    pub async fn discover_warehouse(&self) -> Result<WarehouseRef, WarehouseError> {
        self.warehouse
            .get_or_try_init(|| async {
                if let Some(id) = &self.pinned_warehouse_id {
                    info!(warehouse_id = %id, "Using pinned SQL warehouse");
                    return Ok(WarehouseRef::pinned(id.clone()));
                }

                let warehouses = self.api.list_warehouses().await?;
                let chosen = select_warehouse(&warehouses)
                    .cloned()
                    .ok_or(WarehouseError::NoWarehouseAvailable)?;
                info!(
                    warehouse_id = %chosen.id,
                    name = chosen.name.as_deref().unwrap_or(""),
                    state = %chosen.state,
                    serverless = chosen.serverless,
                    candidates = warehouses.len(),
                    "Discovered SQL warehouse"
                );
                Ok::<WarehouseRef, WarehouseError>(chosen)
            })
            .await
            .cloned()
    }

    /// The warehouse selected so far, without triggering discovery.
    pub fn discovered_warehouse(&self) -> Option<&WarehouseRef> {
        self.warehouse.get()
    }

    /// The shared handle, opened on first use and reopened if it died.
    pub async fn get_connection(&self) -> Result<Arc<ConnectionHandle>, WarehouseError> {
        let mut slot = self.slot.lock().await;
        self.ensure_open(&mut slot).await
    }

    /// Execute `sql` with optional named parameters on the shared connection.
    pub async fn run_query(
        &self,
        sql: &str,
        params: Option<Params>,
    ) -> Result<QueryResult, WarehouseError> {
        let statement = Statement::with_params(sql, params.unwrap_or_default());
        self.execute(&statement).await
    }

    pub async fn execute(&self, statement: &Statement) -> Result<QueryResult, WarehouseError> {
        let mut slot = self.slot.lock().await;
        let handle = self.ensure_open(&mut slot).await?;

        match handle.execute(statement).await {
            Err(e) if e.is_connection() => {
                warn!(
                    connection_id = %handle.id(),
                    error = %e,
                    "Connection lost during statement, reconnecting once"
                );
                Self::discard(&mut slot).await;

                let handle = self.ensure_open(&mut slot).await?;
                let result = handle.execute(statement).await;
                if matches!(&result, Err(e) if e.is_connection()) {
                    Self::discard(&mut slot).await;
                }
                result
            }
            other => other,
        }
    }

    /// Close the shared connection. Further queries reopen it.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            info!(connection_id = %handle.id(), "Closing warehouse connection");
        }
        Self::discard(&mut slot).await;
    }

    /// Number of connections opened over the manager's lifetime.
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    async fn ensure_open(
        &self,
        slot: &mut Option<Arc<ConnectionHandle>>,
    ) -> Result<Arc<ConnectionHandle>, WarehouseError> {
        if let Some(handle) = slot.as_ref() {
            if handle.is_alive() {
                return Ok(Arc::clone(handle));
            }
            warn!(connection_id = %handle.id(), "Cached connection is dead, reopening");
            Self::discard(slot).await;
        }

        let warehouse = self.discover_warehouse().await?;
        let session = self.api.connect(&warehouse).await?;
        let handle = Arc::new(ConnectionHandle {
            id: Uuid::new_v4(),
            warehouse,
            session,
            opened_at: Utc::now(),
        });
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        info!(
            connection_id = %handle.id,
            warehouse_id = %handle.warehouse.id,
            "Opened warehouse connection"
        );

        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    async fn discard(slot: &mut Option<Arc<ConnectionHandle>>) {
        if let Some(handle) = slot.take() {
            handle.close().await;
        }
    }
}
