//! Databricks SQL statement execution over HTTP.
//!
//! Provides [`HttpSession`], the [`SqlSession`] used in production: it submits
//! statements to `/api/2.0/sql/statements`, polls pending ones with
//! exponential backoff, enforces the query timeout (cancelling on expiry) and
//! gathers every result chunk into a [`QueryResult`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use lakedash_core::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::SqlSession;
use crate::error::WarehouseError;
use crate::result::{Column, QueryMetadata, QueryResult};
use crate::statement::{Statement, WireParameter};
use crate::workspace::WorkspaceClient;

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

/// Longest server-side wait the API accepts on submit.
const MAX_WAIT_SECONDS: u64 = 30;

/// Upper bound on a best-effort cancel request.
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    warehouse_id: &'a str,
    statement: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<WireParameter<'a>>,
    wait_timeout: String,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

impl StatementState {
    fn is_terminal(self) -> bool {
        !matches!(self, StatementState::Pending | StatementState::Running)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatementStatus {
    state: StatementState,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    type_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultSchema {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultManifest {
    #[serde(default)]
    schema: ResultSchema,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultChunk {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<ResultManifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live connection to one SQL warehouse through the statement execution API.
///
/// The API itself is stateless; "alive" tracks whether the last exchange
/// reached the warehouse. A transport failure marks the session dead so the
/// connection manager replaces it.
pub struct HttpSession {
    workspace: WorkspaceClient,
    warehouse_id: String,
    timeout: Duration,
    alive: AtomicBool,
}

impl HttpSession {
    pub fn new(workspace: WorkspaceClient, warehouse_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            workspace,
            warehouse_id: warehouse_id.into(),
            timeout,
            alive: AtomicBool::new(true),
        }
    }

    fn track<T>(&self, result: Result<T, WarehouseError>) -> Result<T, WarehouseError> {
        if let Err(e) = &result {
            if e.is_connection() {
                self.alive.store(false, Ordering::Relaxed);
            }
        }
        result
    }

    /// Run one workspace call bounded by the time left before `deadline`.
    ///
    /// Once the statement exists (`statement_id` is set), expiry or a lost
    /// connection also cancels it on the warehouse.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        statement_id: Option<&str>,
        call: impl Future<Output = Result<T, WarehouseError>>,
    ) -> Result<T, WarehouseError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, call).await {
            Ok(result) => {
                let result = self.track(result);
                if let (Err(e), Some(id)) = (&result, statement_id) {
                    if e.is_connection() {
                        warn!(statement_id = %id, error = %e, "Connection lost mid-statement, cancelling");
                        self.cancel_quietly(id).await;
                    }
                }
                result
            }
            Err(_) => Err(self.timed_out(statement_id).await),
        }
    }

    async fn timed_out(&self, statement_id: Option<&str>) -> WarehouseError {
        warn!(
            statement_id = ?statement_id,
            timeout_seconds = self.timeout.as_secs(),
            "Statement timed out"
        );
        if let Some(id) = statement_id {
            self.cancel_quietly(id).await;
        }
        WarehouseError::Timeout {
            statement_id: statement_id.map(str::to_string),
            seconds: self.timeout.as_secs(),
        }
    }

    async fn submit(&self, statement: &Statement) -> Result<StatementResponse, WarehouseError> {
        let request = ExecuteRequest {
            warehouse_id: &self.warehouse_id,
            statement: &statement.sql,
            parameters: statement.wire_parameters(),
            wait_timeout: format!("{}s", wait_timeout_seconds(self.timeout)),
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        };

        let response = self.workspace.post_json(STATEMENTS_PATH, &request).await;
        // A 400 on submit is the warehouse rejecting the statement itself.
        response.map_err(|e| match e {
            WarehouseError::Api { status: 400, body } => WarehouseError::query(body),
            other => other,
        })
    }

    /// Poll until the statement reaches a terminal state or the deadline passes.
    async fn poll_until_complete(
        &self,
        mut response: StatementResponse,
        start: Instant,
        deadline: Instant,
    ) -> Result<StatementResponse, WarehouseError> {
        let initial_delay_ms: u64 = 200;
        let max_delay_ms: u64 = 2000;
        let backoff_factor: f64 = 1.5;

        let mut delay_ms = initial_delay_ms;

        while !response.status.state.is_terminal() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(Some(response.statement_id.as_str())).await);
            }

            let delay = Duration::from_millis(delay_ms + jitter_ms());
            tokio::time::sleep(delay.min(remaining)).await;
            delay_ms = next_delay_ms(delay_ms, backoff_factor, max_delay_ms);

            let path = format!("{}/{}", STATEMENTS_PATH, response.statement_id);
            let id = response.statement_id.clone();
            response = self
                .bounded(deadline, Some(id.as_str()), self.workspace.get_json(&path, &[]))
                .await?;

            debug!(
                statement_id = %response.statement_id,
                state = ?response.status.state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling statement status"
            );
        }

        Ok(response)
    }

    async fn cancel(&self, statement_id: &str) -> Result<(), WarehouseError> {
        let path = format!("{}/{}/cancel", STATEMENTS_PATH, statement_id);
        let _: serde_json::Value = self.workspace.post_json(&path, &serde_json::json!({})).await?;
        info!(statement_id = %statement_id, "Statement cancellation requested");
        Ok(())
    }

    /// Cancel without surfacing failures; the caller reports its own error.
    async fn cancel_quietly(&self, statement_id: &str) {
        match tokio::time::timeout(CANCEL_TIMEOUT, self.cancel(statement_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(statement_id = %statement_id, error = %e, "Failed to cancel statement");
            }
            Err(_) => {
                warn!(statement_id = %statement_id, "Cancel request timed out");
            }
        }
    }

    /// Turn a terminal response into rows, following chunk links.
    async fn collect(
        &self,
        response: StatementResponse,
        start: Instant,
        deadline: Instant,
    ) -> Result<QueryResult, WarehouseError> {
        let StatementResponse { statement_id, status, manifest, result } = response;

        match status.state {
            StatementState::Succeeded => {}
            StatementState::Failed => {
                let (message, error_code) = status
                    .error
                    .map(|e| (e.message.unwrap_or_else(|| "statement failed".into()), e.error_code))
                    .unwrap_or_else(|| ("statement failed".into(), None));
                error!(statement_id = %statement_id, message = %message, "Statement failed");
                return Err(WarehouseError::Query {
                    message,
                    error_code,
                    statement_id: Some(statement_id),
                });
            }
            StatementState::Canceled | StatementState::Closed => {
                warn!(statement_id = %statement_id, state = ?status.state, "Statement did not complete");
                return Err(WarehouseError::Query {
                    message: format!("statement was {:?}", status.state).to_lowercase(),
                    error_code: None,
                    statement_id: Some(statement_id),
                });
            }
            StatementState::Pending | StatementState::Running => {
                return Err(WarehouseError::Parse(format!(
                    "statement {} still {:?} after polling",
                    statement_id, status.state
                )));
            }
        }

        let manifest = manifest.unwrap_or_default();
        let columns: Vec<Column> = manifest
            .schema
            .columns
            .into_iter()
            .map(|c| {
                let type_name = c.type_name.or(c.type_text).unwrap_or_default();
                Column::new(c.name, type_name)
            })
            .collect();

        let mut rows = Vec::new();
        let mut chunk = result.unwrap_or_default();
        loop {
            rows.extend(convert_rows(&columns, chunk.data_array));
            let Some(link) = chunk.next_chunk_internal_link else {
                break;
            };
            chunk = self
                .bounded(deadline, Some(statement_id.as_str()), self.workspace.get_json(&link, &[]))
                .await?;
        }

        debug!(
            columns = columns.len(),
            rows = rows.len(),
            statement_id = %statement_id,
            "Parsed statement results"
        );

        let metadata = QueryMetadata {
            statement_id: Some(statement_id),
            row_count: rows.len() as u64,
            truncated: manifest.truncated,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        Ok(QueryResult { columns, rows, metadata })
    }
}

#[async_trait]
impl SqlSession for HttpSession {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, WarehouseError> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        info!(warehouse_id = %self.warehouse_id, sql = %statement.sql, "Submitting statement");

        let response = self.bounded(deadline, None, self.submit(statement)).await?;
        let response = self.poll_until_complete(response, start, deadline).await?;
        let result = self.collect(response, start, deadline).await?;

        self.alive.store(true, Ordering::Relaxed);
        Ok(result)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
        debug!(warehouse_id = %self.warehouse_id, "Session closed");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Server-side wait on submit: 0 (return immediately) or 5..=30 seconds,
/// at most half the query timeout so a statement id comes back before expiry.
fn wait_timeout_seconds(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() / 2;
    if secs < 5 {
        0
    } else {
        secs.min(MAX_WAIT_SECONDS)
    }
}

fn next_delay_ms(delay_ms: u64, factor: f64, max_delay_ms: u64) -> u64 {
    ((delay_ms as f64 * factor) as u64).min(max_delay_ms)
}

/// Jitter without rand: nanosecond fraction of the current time.
fn jitter_ms() -> u64 {
    (SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos()
        % 100) as u64
}

fn convert_rows(columns: &[Column], data: Vec<Vec<Option<String>>>) -> Vec<Vec<Value>> {
    data.into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, cell)| {
                    let type_name = columns.get(i).map(|c| c.type_name.as_str()).unwrap_or("");
                    Value::from_typed(type_name, cell.as_deref())
                })
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests: parsing and helpers. Request flow is covered in tests/http_session.rs
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..1000 {
            assert!(jitter_ms() < 100);
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let mut d = 200;
        d = next_delay_ms(d, 1.5, 2000);
        assert_eq!(d, 300);
        for _ in 0..20 {
            d = next_delay_ms(d, 1.5, 2000);
        }
        assert_eq!(d, 2000);
    }

    #[test]
    fn wait_timeout_is_within_api_bounds() {
        assert_eq!(wait_timeout_seconds(Duration::from_secs(2)), 0);
        assert_eq!(wait_timeout_seconds(Duration::from_secs(9)), 0);
        assert_eq!(wait_timeout_seconds(Duration::from_secs(20)), 10);
        assert_eq!(wait_timeout_seconds(Duration::from_secs(300)), 30);
    }

    #[test]
    fn execute_request_shape() {
        let stmt = Statement::new("SELECT * FROM t WHERE y = :y").bind("y", 1995_i64);
        let req = ExecuteRequest {
            warehouse_id: "w1",
            statement: &stmt.sql,
            parameters: stmt.wire_parameters(),
            wait_timeout: "30s".into(),
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["warehouse_id"], "w1");
        assert_eq!(json["parameters"][0]["name"], "y");
        assert_eq!(json["parameters"][0]["type"], "BIGINT");
        assert_eq!(json["format"], "JSON_ARRAY");

        let bare = Statement::new("SELECT 1");
        let req = ExecuteRequest { parameters: bare.wire_parameters(), ..req };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("parameters").is_none());
    }

    #[test]
    fn parses_succeeded_response() {
        let json = r#"{
            "statement_id": "01ef-aa",
            "status": {"state": "SUCCEEDED"},
            "manifest": {
                "format": "JSON_ARRAY",
                "schema": {"column_count": 2, "columns": [
                    {"name": "month", "type_name": "DATE", "type_text": "DATE", "position": 0},
                    {"name": "revenue", "type_name": "DOUBLE", "type_text": "DOUBLE", "position": 1}
                ]},
                "total_chunk_count": 1,
                "truncated": false
            },
            "result": {"chunk_index": 0, "row_count": 2, "data_array": [["1995-01-01", "123.5"], ["1995-02-01", null]]}
        }"#;
        let resp: StatementResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status.state, StatementState::Succeeded);

        let manifest = resp.manifest.unwrap();
        let columns: Vec<Column> = manifest
            .schema
            .columns
            .into_iter()
            .map(|c| Column::new(c.name, c.type_name.unwrap_or_default()))
            .collect();
        let rows = convert_rows(&columns, resp.result.unwrap().data_array);
        assert_eq!(rows[0][0], Value::Text("1995-01-01".into()));
        assert_eq!(rows[0][1], Value::Float(123.5));
        assert_eq!(rows[1][1], Value::Null);
    }

    #[test]
    fn parses_failed_response() {
        let json = r#"{
            "statement_id": "01ef-bb",
            "status": {"state": "FAILED", "error": {"error_code": "BAD_REQUEST", "message": "[TABLE_OR_VIEW_NOT_FOUND] nope"}}
        }"#;
        let resp: StatementResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status.state, StatementState::Failed);
        let err = resp.status.error.unwrap();
        assert_eq!(err.error_code.as_deref(), Some("BAD_REQUEST"));
        assert!(err.message.unwrap().contains("TABLE_OR_VIEW_NOT_FOUND"));
    }

    #[test]
    fn terminal_states() {
        assert!(!StatementState::Pending.is_terminal());
        assert!(!StatementState::Running.is_terminal());
        assert!(StatementState::Succeeded.is_terminal());
        assert!(StatementState::Canceled.is_terminal());
    }

    #[tokio::test]
    async fn session_starts_alive_and_close_marks_dead() {
        let ws = WorkspaceClient::new("https://h.invalid", crate::auth::Credentials::Token("t".into()));
        let session = HttpSession::new(ws, "w1", Duration::from_secs(10));
        assert!(session.is_alive());
        session.close().await;
        assert!(!session.is_alive());
    }

    #[test]
    fn track_marks_session_dead_on_connection_error() {
        let ws = WorkspaceClient::new("https://h.invalid", crate::auth::Credentials::Token("t".into()));
        let session = HttpSession::new(ws, "w1", Duration::from_secs(10));

        let _ = session.track::<()>(Err(WarehouseError::query("syntax")));
        assert!(session.is_alive());

        let _ = session.track::<()>(Err(WarehouseError::Connection("reset".into())));
        assert!(!session.is_alive());
    }
}
