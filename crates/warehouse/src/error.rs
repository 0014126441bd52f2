use lakedash_core::ConfigError;

/// Errors that can occur while talking to a SQL warehouse.
///
/// Callers mostly care about three buckets: [`WarehouseError::NoWarehouseAvailable`],
/// connection failures ([`WarehouseError::is_connection`]) and query failures
/// ([`WarehouseError::is_query`]).
#[derive(Debug, Clone, thiserror::Error)]
pub enum WarehouseError {
    /// Discovery found no SQL warehouse in the workspace.
    #[error("No SQL warehouse available. Set DATABRICKS_WAREHOUSE_ID or create a SQL warehouse.")]
    NoWarehouseAvailable,

    /// Network, authentication or configuration failure. Retried once by the
    /// connection manager.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The warehouse rejected or failed the statement (syntax error,
    /// permission denied, ...). Carries the warehouse-reported message.
    #[error("{message}")]
    Query {
        message: String,
        error_code: Option<String>,
        statement_id: Option<String>,
    },

    /// The statement exceeded the configured query timeout.
    #[error("Query timed out after {seconds}s")]
    Timeout {
        statement_id: Option<String>,
        seconds: u64,
    },

    /// Unexpected non-success status from a workspace API.
    #[error("Databricks API error {status}: {body}")]
    Api { status: u16, body: String },

    /// A response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WarehouseError {
    pub fn is_connection(&self) -> bool {
        matches!(self, WarehouseError::Connection(_))
    }

    /// Query failures, timeouts included.
    pub fn is_query(&self) -> bool {
        matches!(self, WarehouseError::Query { .. } | WarehouseError::Timeout { .. })
    }

    pub(crate) fn query(message: impl Into<String>) -> Self {
        WarehouseError::Query {
            message: message.into(),
            error_code: None,
            statement_id: None,
        }
    }

    /// Classify a `reqwest` failure. Body decoding problems are parse errors,
    /// everything else means the wire went away.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WarehouseError::Parse(err.to_string())
        } else {
            WarehouseError::Connection(err.to_string())
        }
    }
}

impl From<ConfigError> for WarehouseError {
    fn from(err: ConfigError) -> Self {
        WarehouseError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for WarehouseError {
    fn from(err: serde_json::Error) -> Self {
        WarehouseError::Parse(err.to_string())
    }
}
