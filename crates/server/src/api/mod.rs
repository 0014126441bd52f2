//! Domain-focused API endpoint modules.
//!
//! Each sub-module backs one page of the app. Shared response types and the
//! error → status mapping live here.

mod catalog;
mod health;
mod identity;
mod sales;
mod sql_explorer;
mod taxi;

use axum::http::StatusCode;
use axum::Json;
use indexmap::IndexMap;
use lakedash_catalog::CatalogError;
use lakedash_core::Value;
use lakedash_warehouse::{Column, QueryResult, WarehouseError};
use serde::Serialize;
use tracing::warn;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct QueryErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<QueryErrorResponse>);

/// A result set as the pages consume it: one JSON object per row.
#[derive(Debug, Serialize)]
pub struct TableResponse {
    pub columns: Vec<Column>,
    pub rows: Vec<IndexMap<String, Value>>,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<String>,
}

impl From<QueryResult> for TableResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            rows: result.records(),
            row_count: result.row_count(),
            statement_id: result.metadata.statement_id,
            columns: result.columns,
        }
    }
}

// ── Error mapping ────────────────────────────────────────────────

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(QueryErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Map a warehouse failure onto the page-facing status code.
pub(crate) fn warehouse_error(err: WarehouseError) -> ApiError {
    let status = match &err {
        WarehouseError::NoWarehouseAvailable => StatusCode::SERVICE_UNAVAILABLE,
        WarehouseError::Query { .. } | WarehouseError::Timeout { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WarehouseError::Connection(_) | WarehouseError::Api { .. } | WarehouseError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    warn!(status = status.as_u16(), error = %err, "Warehouse request failed");
    error_response(status, err.to_string())
}

pub(crate) fn catalog_error(err: CatalogError) -> ApiError {
    match err {
        CatalogError::Metadata(e) => warehouse_error(e),
        CatalogError::SessionNotFound(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        CatalogError::NotATable(_) => bad_request(err.to_string()),
    }
}

// ── Re-exports ───────────────────────────────────────────────────
// Flat `api::foo` paths used by router.rs route registration.

pub use catalog::{
    catalog_session_close, catalog_session_create, catalog_session_event, catalog_table_detail,
};
pub use health::{health, warehouse_info};
pub use identity::identity;
pub use sales::{sales_customers, sales_kpis, sales_regions, sales_trend};
pub use sql_explorer::{sql_run, sql_starters};
pub use taxi::{taxi_distributions, taxi_hourly, taxi_kpis, taxi_scatter};
