//! Sales analytics over the TPC-H sample schema.
//!
//! Every query takes the same filters: an order-year range and an order
//! status. Filters are bound as named parameters, never spliced into SQL.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use indexmap::IndexMap;
use lakedash_core::Value;
use lakedash_warehouse::{Params, QueryResult};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::{bad_request, warehouse_error, ApiError, TableResponse};

pub const FIRST_YEAR: i64 = 1992;
pub const LAST_YEAR: i64 = 1998;
const STATUSES: &[&str] = &["ALL", "O", "F", "P"];

const KPIS_SQL: &str = "\
SELECT
    COUNT(DISTINCT o.o_orderkey)  AS total_orders,
    COUNT(DISTINCT o.o_custkey)   AS unique_customers,
    ROUND(SUM(o.o_totalprice), 0) AS total_revenue,
    ROUND(AVG(o.o_totalprice), 2) AS avg_order_value
FROM samples.tpch.orders o
WHERE YEAR(o.o_orderdate) BETWEEN :year_from AND :year_to
  AND (:status = 'ALL' OR o.o_orderstatus = :status)";

const TREND_SQL: &str = "\
SELECT DATE_TRUNC('month', o.o_orderdate) AS month,
       ROUND(SUM(o.o_totalprice), 0)      AS revenue
FROM samples.tpch.orders o
WHERE YEAR(o.o_orderdate) BETWEEN :year_from AND :year_to
  AND (:status = 'ALL' OR o.o_orderstatus = :status)
GROUP BY 1 ORDER BY 1";

const REGIONS_SQL: &str = "\
SELECT r.r_name AS region, n.n_name AS nation,
       ROUND(SUM(o.o_totalprice), 0) AS revenue
FROM samples.tpch.orders o
JOIN samples.tpch.customer c ON o.o_custkey   = c.c_custkey
JOIN samples.tpch.nation   n ON c.c_nationkey = n.n_nationkey
JOIN samples.tpch.region   r ON n.n_regionkey = r.r_regionkey
WHERE YEAR(o.o_orderdate) BETWEEN :year_from AND :year_to
  AND (:status = 'ALL' OR o.o_orderstatus = :status)
GROUP BY 1, 2 ORDER BY 1, 3 DESC";

const CUSTOMERS_SQL: &str = "\
SELECT c.c_name        AS customer,
       c.c_mktsegment  AS segment,
       COUNT(o.o_orderkey)           AS orders,
       ROUND(SUM(o.o_totalprice), 0) AS revenue,
       ROUND(AVG(o.o_totalprice), 2) AS avg_order
FROM samples.tpch.orders o
JOIN samples.tpch.customer c ON o.o_custkey = c.c_custkey
WHERE YEAR(o.o_orderdate) BETWEEN :year_from AND :year_to
  AND (:status = 'ALL' OR o.o_orderstatus = :status)
GROUP BY 1, 2 ORDER BY 4 DESC LIMIT :top_n";

// ── Filters ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SalesFilter {
    #[serde(default = "default_year_from")]
    pub year_from: i64,
    #[serde(default = "default_year_to")]
    pub year_to: i64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_top_n")]
    pub top_n: i64,
}

fn default_year_from() -> i64 {
    1994
}

fn default_year_to() -> i64 {
    1997
}

fn default_status() -> String {
    "ALL".to_string()
}

fn default_top_n() -> i64 {
    10
}

impl Default for SalesFilter {
    fn default() -> Self {
        Self {
            year_from: default_year_from(),
            year_to: default_year_to(),
            status: default_status(),
            top_n: default_top_n(),
        }
    }
}

impl SalesFilter {
    /// Check ranges and build the bound parameters shared by every query.
    pub fn params(&self) -> Result<Params, String> {
        for year in [self.year_from, self.year_to] {
            if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
                return Err(format!(
                    "Year {year} is outside {FIRST_YEAR}-{LAST_YEAR}"
                ));
            }
        }
        if self.year_from > self.year_to {
            return Err("year_from must not be after year_to".to_string());
        }
        let status = self.status.to_ascii_uppercase();
        if !STATUSES.contains(&status.as_str()) {
            return Err(format!(
                "Unknown order status '{}', expected one of ALL, O, F, P",
                self.status
            ));
        }

        let mut params = Params::new();
        params.insert("year_from".into(), Value::Int(self.year_from));
        params.insert("year_to".into(), Value::Int(self.year_to));
        params.insert("status".into(), Value::Text(status));
        Ok(params)
    }

    pub fn customer_params(&self) -> Result<Params, String> {
        if !(5..=25).contains(&self.top_n) {
            return Err(format!("top_n must be between 5 and 25, got {}", self.top_n));
        }
        let mut params = self.params()?;
        params.insert("top_n".into(), Value::Int(self.top_n));
        Ok(params)
    }
}

async fn run(state: &AppState, sql: &str, params: Params) -> Result<QueryResult, ApiError> {
    state
        .warehouse
        .run_query(sql, Some(params))
        .await
        .map_err(warehouse_error)
}

// ── Handlers ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct KpiResponse {
    pub kpis: IndexMap<String, Value>,
}

pub async fn sales_kpis(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SalesFilter>,
) -> Result<Json<KpiResponse>, ApiError> {
    let params = filter.params().map_err(bad_request)?;
    let result = run(&state, KPIS_SQL, params).await?;
    Ok(Json(KpiResponse {
        kpis: result.first_record().unwrap_or_default(),
    }))
}

pub async fn sales_trend(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SalesFilter>,
) -> Result<Json<TableResponse>, ApiError> {
    let params = filter.params().map_err(bad_request)?;
    Ok(Json(run(&state, TREND_SQL, params).await?.into()))
}

#[derive(Debug, Serialize)]
pub struct RegionTotal {
    pub region: String,
    pub revenue: f64,
}

#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    /// Per-region sums for the donut chart, in first-seen order.
    pub regions: Vec<RegionTotal>,
    /// Region × nation breakdown.
    pub nations: TableResponse,
}

pub async fn sales_regions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SalesFilter>,
) -> Result<Json<RegionsResponse>, ApiError> {
    let params = filter.params().map_err(bad_request)?;
    let result = run(&state, REGIONS_SQL, params).await?;
    Ok(Json(RegionsResponse {
        regions: region_totals(&result),
        nations: result.into(),
    }))
}

/// Sum `revenue` per `region`, keeping the order regions first appear in.
pub fn region_totals(result: &QueryResult) -> Vec<RegionTotal> {
    let mut totals: IndexMap<String, f64> = IndexMap::new();
    for row in 0..result.row_count() {
        let Some(region) = result.get_value(row, "region").and_then(Value::as_str) else {
            continue;
        };
        let revenue = result
            .get_value(row, "revenue")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        *totals.entry(region.to_string()).or_default() += revenue;
    }
    totals
        .into_iter()
        .map(|(region, revenue)| RegionTotal { region, revenue })
        .collect()
}

pub async fn sales_customers(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SalesFilter>,
) -> Result<Json<TableResponse>, ApiError> {
    let params = filter.customer_params().map_err(bad_request)?;
    Ok(Json(run(&state, CUSTOMERS_SQL, params).await?.into()))
}
