use lakedash_warehouse::WarehouseError;
use thiserror::Error;
use uuid::Uuid;

use crate::types::NodePath;

/// Errors produced while browsing catalog metadata.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The metadata service failed. Carries the underlying workspace error so
    /// callers can still tell connection problems from rejected requests.
    #[error("{0}")]
    Metadata(#[from] WarehouseError),

    /// No browser session with this id (never created, closed, or expired).
    #[error("Catalog session {0} not found")]
    SessionNotFound(Uuid),

    /// The requested operation needs a table path.
    #[error("{0} is not a table")]
    NotATable(NodePath),
}

impl CatalogError {
    pub fn is_connection(&self) -> bool {
        matches!(self, CatalogError::Metadata(e) if e.is_connection())
    }
}
