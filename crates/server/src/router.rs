//! HTTP router construction.
//!
//! Assembles all Axum routes and middleware into a single `Router`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .route("/api/warehouse", get(api::warehouse_info))
        .route("/api/identity", get(api::identity))
        // Sales (TPC-H)
        .route("/api/sales/kpis", get(api::sales_kpis))
        .route("/api/sales/trend", get(api::sales_trend))
        .route("/api/sales/regions", get(api::sales_regions))
        .route("/api/sales/customers", get(api::sales_customers))
        // Taxi (NYC trips)
        .route("/api/taxi/kpis", get(api::taxi_kpis))
        .route("/api/taxi/distributions", get(api::taxi_distributions))
        .route("/api/taxi/hourly", get(api::taxi_hourly))
        .route("/api/taxi/scatter", get(api::taxi_scatter))
        // SQL explorer
        .route("/api/sql/starters", get(api::sql_starters))
        .route("/api/sql/run", post(api::sql_run))
        // Catalog browser sessions
        .route("/api/catalog/sessions", post(api::catalog_session_create))
        .route(
            "/api/catalog/sessions/{id}",
            delete(api::catalog_session_close),
        )
        .route(
            "/api/catalog/sessions/{id}/events",
            post(api::catalog_session_event),
        )
        .route(
            "/api/catalog/sessions/{id}/tables/{catalog}/{schema}/{table}",
            get(api::catalog_table_detail),
        )
        .layer(cors)
        .with_state(state)
}

/// `*` allows any origin; anything else pins the allowed origin.
fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}
