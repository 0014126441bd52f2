//! Catalog drill-down sessions.
//!
//! A page opens a session, streams node clicks into it, and closes it on
//! unload. All tree state lives server-side in the session's browser.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lakedash_catalog::{
    CatalogError, EventOutcome, NodePath, ObjectSummary, TableDetail, TreeEvent, VisibleNode,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::state::AppState;

use super::{catalog_error, ApiError};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub catalogs: Vec<ObjectSummary>,
    pub nodes: Vec<VisibleNode>,
}

/// Open a browser session and load the top-level catalogs.
///
/// When the catalog listing fails the session is discarded, so the page can
/// simply retry.
pub async fn catalog_session_create(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (id, browser) = state.catalog.create().await;
    let mut browser = browser.lock().await;

    let catalogs = match browser.list_catalogs().await.map(<[ObjectSummary]>::to_vec) {
        Ok(catalogs) => catalogs,
        Err(e) => {
            drop(browser);
            state.catalog.remove(id).await;
            return Err(catalog_error(e));
        }
    };
    info!(session_id = %id, catalogs = catalogs.len(), "Catalog session opened");

    Ok(Json(SessionResponse {
        session_id: id,
        catalogs,
        nodes: browser.visible_nodes(),
    }))
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    #[serde(flatten)]
    pub outcome: EventOutcome,
    /// The whole tree after the event, ready to render.
    pub nodes: Vec<VisibleNode>,
}

/// Apply one expand/collapse/toggle click.
pub async fn catalog_session_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(event): Json<TreeEvent>,
) -> Result<Json<EventResponse>, ApiError> {
    let browser = state.catalog.get(id).await.map_err(catalog_error)?;
    let mut browser = browser.lock().await;
    let outcome = browser.handle(&event).await.map_err(catalog_error)?;
    Ok(Json(EventResponse {
        outcome,
        nodes: browser.visible_nodes(),
    }))
}

/// Detail panel for one table.
pub async fn catalog_table_detail(
    State(state): State<Arc<AppState>>,
    Path((id, catalog, schema, table)): Path<(Uuid, String, String, String)>,
) -> Result<Json<TableDetail>, ApiError> {
    let browser = state.catalog.get(id).await.map_err(catalog_error)?;
    let mut browser = browser.lock().await;
    let path = NodePath::table(catalog, schema, table);
    let detail = browser.table_detail(&path).await.map_err(catalog_error)?;
    Ok(Json(detail.clone()))
}

pub async fn catalog_session_close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(catalog_error(CatalogError::SessionNotFound(id)))
    }
}
