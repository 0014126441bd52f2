//! NYC taxi analytics over `samples.nyctaxi.trips`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use lakedash_core::Value;
use lakedash_warehouse::Params;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::sales::KpiResponse;
use super::{bad_request, warehouse_error, ApiError, TableResponse};

const SAMPLE_SIZES: &[i64] = &[10_000, 50_000, 100_000];
/// Upper bound on points sent to the scatter plot.
pub const SCATTER_CAP: i64 = 5_000;

const KPIS_SQL: &str = "\
SELECT COUNT(*) AS total_trips,
       ROUND(AVG(fare_amount), 2)  AS avg_fare,
       ROUND(AVG(trip_distance), 2) AS avg_distance,
       ROUND(AVG(fare_amount / NULLIF(trip_distance, 0)), 2) AS avg_fare_per_mile
FROM samples.nyctaxi.trips
WHERE fare_amount BETWEEN :fare_min AND :fare_max
  AND trip_distance BETWEEN :dist_min AND :dist_max
  AND trip_distance > 0 AND fare_amount > 0";

const DISTRIBUTIONS_SQL: &str = "\
SELECT fare_amount, trip_distance
FROM samples.nyctaxi.trips
WHERE fare_amount BETWEEN :fare_min AND :fare_max
  AND trip_distance BETWEEN :dist_min AND :dist_max
  AND trip_distance > 0 AND fare_amount > 0
LIMIT :row_limit";

const HOURLY_SQL: &str = "\
SELECT HOUR(tpep_pickup_datetime)      AS hour_of_day,
       COUNT(*)                        AS trips,
       ROUND(AVG(fare_amount), 2)      AS avg_fare
FROM samples.nyctaxi.trips
WHERE fare_amount BETWEEN :fare_min AND :fare_max
  AND trip_distance BETWEEN :dist_min AND :dist_max
  AND trip_distance > 0 AND fare_amount > 0
GROUP BY 1 ORDER BY 1";

const SCATTER_SQL: &str = "\
SELECT fare_amount, trip_distance
FROM samples.nyctaxi.trips
WHERE fare_amount BETWEEN :fare_min AND :fare_max
  AND trip_distance BETWEEN :dist_min AND :dist_max
  AND trip_distance > 0 AND fare_amount > 0
ORDER BY RAND() LIMIT :row_limit";

#[derive(Debug, Deserialize)]
pub struct TaxiFilter {
    #[serde(default)]
    pub fare_min: f64,
    #[serde(default = "default_fare_max")]
    pub fare_max: f64,
    #[serde(default)]
    pub dist_min: f64,
    #[serde(default = "default_dist_max")]
    pub dist_max: f64,
    #[serde(default = "default_sample")]
    pub sample: i64,
}

fn default_fare_max() -> f64 {
    100.0
}

fn default_dist_max() -> f64 {
    20.0
}

fn default_sample() -> i64 {
    10_000
}

impl Default for TaxiFilter {
    fn default() -> Self {
        Self {
            fare_min: 0.0,
            fare_max: default_fare_max(),
            dist_min: 0.0,
            dist_max: default_dist_max(),
            sample: default_sample(),
        }
    }
}

fn check_range(name: &str, min: f64, max: f64, limit: f64) -> Result<(), String> {
    if !(0.0..=limit).contains(&min) || !(0.0..=limit).contains(&max) {
        return Err(format!("{name} range must lie within 0-{limit}"));
    }
    if min > max {
        return Err(format!("{name} minimum must not exceed maximum"));
    }
    Ok(())
}

impl TaxiFilter {
    /// Validate the sliders and bind the shared `WHERE` parameters.
    pub fn params(&self) -> Result<Params, String> {
        check_range("Fare", self.fare_min, self.fare_max, 200.0)?;
        check_range("Distance", self.dist_min, self.dist_max, 50.0)?;

        let mut params = Params::new();
        params.insert("fare_min".into(), Value::Float(self.fare_min));
        params.insert("fare_max".into(), Value::Float(self.fare_max));
        params.insert("dist_min".into(), Value::Float(self.dist_min));
        params.insert("dist_max".into(), Value::Float(self.dist_max));
        Ok(params)
    }

    /// Shared parameters plus `row_limit`, capped at `cap` when given.
    pub fn sampled_params(&self, cap: Option<i64>) -> Result<Params, String> {
        if !SAMPLE_SIZES.contains(&self.sample) {
            return Err(format!(
                "sample must be one of 10000, 50000, 100000, got {}",
                self.sample
            ));
        }
        let limit = cap.map_or(self.sample, |c| self.sample.min(c));
        let mut params = self.params()?;
        params.insert("row_limit".into(), Value::Int(limit));
        Ok(params)
    }
}

async fn run_table(state: &AppState, sql: &str, params: Params) -> Result<TableResponse, ApiError> {
    state
        .warehouse
        .run_query(sql, Some(params))
        .await
        .map(TableResponse::from)
        .map_err(warehouse_error)
}

pub async fn taxi_kpis(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaxiFilter>,
) -> Result<Json<KpiResponse>, ApiError> {
    let params = filter.params().map_err(bad_request)?;
    let result = state
        .warehouse
        .run_query(KPIS_SQL, Some(params))
        .await
        .map_err(warehouse_error)?;
    Ok(Json(KpiResponse {
        kpis: result.first_record().unwrap_or_default(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DistributionsResponse {
    pub fare_amount: Vec<f64>,
    pub trip_distance: Vec<f64>,
    pub row_count: usize,
}

/// Raw fare and distance samples for the two histograms.
pub async fn taxi_distributions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaxiFilter>,
) -> Result<Json<DistributionsResponse>, ApiError> {
    let params = filter.sampled_params(None).map_err(bad_request)?;
    let result = state
        .warehouse
        .run_query(DISTRIBUTIONS_SQL, Some(params))
        .await
        .map_err(warehouse_error)?;

    let column = |name: &str| -> Vec<f64> {
        (0..result.row_count())
            .filter_map(|row| result.get_value(row, name).and_then(Value::as_f64))
            .collect()
    };
    Ok(Json(DistributionsResponse {
        fare_amount: column("fare_amount"),
        trip_distance: column("trip_distance"),
        row_count: result.row_count(),
    }))
}

pub async fn taxi_hourly(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaxiFilter>,
) -> Result<Json<TableResponse>, ApiError> {
    let params = filter.params().map_err(bad_request)?;
    Ok(Json(run_table(&state, HOURLY_SQL, params).await?))
}

/// Random fare/distance pairs, never more than [`SCATTER_CAP`].
pub async fn taxi_scatter(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaxiFilter>,
) -> Result<Json<TableResponse>, ApiError> {
    let params = filter
        .sampled_params(Some(SCATTER_CAP))
        .map_err(bad_request)?;
    Ok(Json(run_table(&state, SCATTER_SQL, params).await?))
}
