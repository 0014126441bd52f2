//! Ad-hoc SQL against the shared warehouse.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use lakedash_core::Value;
use lakedash_warehouse::{Column, QueryResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

use super::{bad_request, warehouse_error, ApiError};

const DEFAULT_MAX_ROWS: u32 = 500;
const MIN_MAX_ROWS: u32 = 10;
const MAX_MAX_ROWS: u32 = 5_000;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StarterQuery {
    pub label: &'static str,
    pub sql: &'static str,
}

pub const STARTER_QUERIES: &[StarterQuery] = &[
    StarterQuery {
        label: "TPC-H: Top 10 orders by value",
        sql: "SELECT o_orderkey, o_custkey, o_totalprice, o_orderdate, o_orderstatus\n\
              FROM samples.tpch.orders\nORDER BY o_totalprice DESC\nLIMIT 10",
    },
    StarterQuery {
        label: "TPC-H: Revenue by nation",
        sql: "SELECT n.n_name AS nation, ROUND(SUM(o.o_totalprice), 0) AS total_revenue\n\
              FROM samples.tpch.orders o\n\
              JOIN samples.tpch.customer c ON o.o_custkey = c.c_custkey\n\
              JOIN samples.tpch.nation n ON c.c_nationkey = n.n_nationkey\n\
              GROUP BY 1 ORDER BY 2 DESC",
    },
    StarterQuery {
        label: "TPC-H: Order status breakdown",
        sql: "SELECT o_orderstatus, COUNT(*) AS orders, ROUND(AVG(o_totalprice),2) AS avg_value\n\
              FROM samples.tpch.orders\nGROUP BY 1 ORDER BY 2 DESC",
    },
    StarterQuery {
        label: "TPC-H: Monthly revenue trend",
        sql: "SELECT DATE_TRUNC('month', o_orderdate) AS month, ROUND(SUM(o_totalprice),0) AS revenue\n\
              FROM samples.tpch.orders\nGROUP BY 1 ORDER BY 1",
    },
    StarterQuery {
        label: "Taxi: Average fare by trip type",
        sql: "SELECT\n  CASE\n    WHEN trip_distance < 1 THEN 'Short (< 1 mi)'\n    \
              WHEN trip_distance < 5 THEN 'Medium (1-5 mi)'\n    \
              ELSE 'Long (5+ mi)'\n  END AS trip_type,\n  \
              COUNT(*) AS trips, ROUND(AVG(fare_amount),2) AS avg_fare\n\
              FROM samples.nyctaxi.trips\nWHERE fare_amount > 0 AND trip_distance > 0\n\
              GROUP BY 1 ORDER BY MIN(trip_distance)",
    },
    StarterQuery {
        label: "Taxi: Busiest pickup hours",
        sql: "SELECT HOUR(tpep_pickup_datetime) AS hour, COUNT(*) AS trips\n\
              FROM samples.nyctaxi.trips\nGROUP BY 1 ORDER BY 1",
    },
    StarterQuery {
        label: "Taxi: Distance bucket distribution",
        sql: "SELECT\n  CASE\n    WHEN trip_distance < 1  THEN '< 1 mile'\n    \
              WHEN trip_distance < 3  THEN '1-3 miles'\n    \
              WHEN trip_distance < 5  THEN '3-5 miles'\n    \
              WHEN trip_distance < 10 THEN '5-10 miles'\n    \
              ELSE '10+ miles'\n  END AS bucket,\n  COUNT(*) AS trips\n\
              FROM samples.nyctaxi.trips\nWHERE trip_distance > 0\n\
              GROUP BY 1 ORDER BY MIN(trip_distance)",
    },
];

/// Editor content when the page first loads.
pub const DEFAULT_SQL: &str = "SELECT * FROM samples.tpch.orders LIMIT 20";

#[derive(Serialize)]
pub struct StartersResponse {
    pub default_sql: &'static str,
    pub starters: &'static [StarterQuery],
}

pub async fn sql_starters() -> Json<StartersResponse> {
    Json(StartersResponse {
        default_sql: DEFAULT_SQL,
        starters: STARTER_QUERIES,
    })
}

// ── Run ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub max_rows: Option<u32>,
}

/// Row cap for queries without their own `LIMIT`. Missing or zero means the
/// default; anything else is clamped to what the page offers.
pub fn effective_max_rows(max_rows: Option<u32>) -> u32 {
    match max_rows {
        None | Some(0) => DEFAULT_MAX_ROWS,
        Some(n) => n.clamp(MIN_MAX_ROWS, MAX_MAX_ROWS),
    }
}

/// Normalize editor input into the statement actually sent.
///
/// Blank input is rejected. A trailing `;` is dropped, and SQL that does not
/// mention `limit` anywhere is wrapped in an outer `SELECT ... LIMIT`.
pub fn prepare_sql(sql: &str, max_rows: Option<u32>) -> Result<String, &'static str> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err("Please enter a SQL query.");
    }
    let safe = trimmed.trim_end_matches(';');
    if safe.to_lowercase().contains("limit") {
        Ok(safe.to_string())
    } else {
        Ok(format!(
            "SELECT * FROM ({safe}) _q LIMIT {}",
            effective_max_rows(max_rows)
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSuggestion {
    pub x: String,
    pub y: String,
    pub kind: ChartKind,
    pub alternatives: Vec<ChartKind>,
    /// Columns the page may offer for each axis.
    pub x_options: Vec<String>,
    pub y_options: Vec<String>,
}

/// Suggest a chart when there is something numeric to plot against another
/// column: x is the first column, y the first numeric one.
pub fn suggest_chart(result: &QueryResult) -> Option<ChartSuggestion> {
    let numeric: Vec<String> = result
        .numeric_columns()
        .into_iter()
        .map(str::to_string)
        .collect();
    if numeric.is_empty() || result.column_count() < 2 {
        return None;
    }
    let x_options: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    Some(ChartSuggestion {
        x: x_options[0].clone(),
        y: numeric[0].clone(),
        kind: ChartKind::Bar,
        alternatives: vec![ChartKind::Line, ChartKind::Scatter, ChartKind::Area],
        x_options,
        y_options: numeric,
    })
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    /// Statement as executed, after limit wrapping.
    pub sql: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub elapsed_ms: u64,
    pub csv: String,
    pub chart: Option<ChartSuggestion>,
}

pub async fn sql_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let sql = prepare_sql(&req.sql, req.max_rows).map_err(bad_request)?;
    let result = state
        .warehouse
        .run_query(&sql, None)
        .await
        .map_err(warehouse_error)?;
    info!(rows = result.row_count(), elapsed_ms = result.metadata.elapsed_ms, "SQL explorer query finished");

    Ok(Json(RunResponse {
        csv: result.to_csv(),
        chart: suggest_chart(&result),
        row_count: result.row_count(),
        elapsed_ms: result.metadata.elapsed_ms,
        sql,
        columns: result.columns,
        rows: result.rows,
    }))
}
