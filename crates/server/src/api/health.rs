//! Health and warehouse status endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use lakedash_warehouse::WarehouseState;
use serde::Serialize;

use crate::state::AppState;

use super::{warehouse_error, ApiError};

// ── Health ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Redacted runtime configuration.
    pub config: serde_json::Value,
    /// Only present once a page has triggered discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        config: state.config.redacted_summary(),
        warehouse_id: state
            .warehouse
            .discovered_warehouse()
            .map(|w| w.id.clone()),
    })
}

// ── Warehouse banner ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct WarehouseResponse {
    pub id: String,
    pub name: Option<String>,
    pub state: WarehouseState,
    pub serverless: bool,
    pub http_path: String,
    pub pinned: bool,
    pub connections_opened: u64,
}

/// Warehouse every data page runs against. Triggers discovery on first call;
/// 503 when the workspace has none.
pub async fn warehouse_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WarehouseResponse>, ApiError> {
    let warehouse = state
        .warehouse
        .discover_warehouse()
        .await
        .map_err(warehouse_error)?;

    Ok(Json(WarehouseResponse {
        http_path: warehouse.http_path(),
        pinned: state.config.databricks.warehouse_id.is_some(),
        connections_opened: state.warehouse.connections_opened(),
        id: warehouse.id,
        name: warehouse.name,
        state: warehouse.state,
        serverless: warehouse.serverless,
    }))
}
