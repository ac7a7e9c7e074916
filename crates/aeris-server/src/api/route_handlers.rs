//! Route analysis and pollution-optimized routing endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use aeris_core::spatial::haversine_distance;

use crate::raster::{mean_max_or_fallback, read_raster, SAMPLE_STEP_M};
use crate::routing::{optimized_routes, RouteQuery};
use crate::state::AppState;
use crate::upes::latest_final_raster;

use super::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RouteAnalyzeForm {
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub use_optimized: bool,
    #[serde(default)]
    pub alternatives: u32,
}

fn default_mode() -> String {
    "commute".to_string()
}

async fn run_optimized(state: &Arc<AppState>, query: RouteQuery) -> ApiResult<Json<Value>> {
    if !state.config.route_optimization_enabled {
        return Err(ApiError::FeatureDisabled("route optimization"));
    }
    query.validate().map_err(ApiError::Validation)?;
    let body = optimized_routes(state, &query)
        .await
        .map_err(|e| ApiError::Upstream(format!("route computation failed: {e}")))?;
    Ok(Json(body))
}

pub async fn optimized_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> ApiResult<Json<Value>> {
    run_optimized(&state, query).await
}

pub async fn optimized_post(
    State(state): State<Arc<AppState>>,
    Form(query): Form<RouteQuery>,
) -> ApiResult<Json<Value>> {
    run_optimized(&state, query).await
}

/// Straight-line exposure summary; `use_optimized=true` defers to the
/// graph engine instead.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RouteAnalyzeForm>,
) -> ApiResult<Json<Value>> {
    if form.use_optimized {
        return run_optimized(
            &state,
            RouteQuery {
                start_lat: form.origin_lat,
                start_lon: form.origin_lon,
                end_lat: form.dest_lat,
                end_lon: form.dest_lon,
                mode: form.mode,
                alternatives: form.alternatives,
            },
        )
        .await;
    }

    let query = RouteQuery {
        start_lat: form.origin_lat,
        start_lon: form.origin_lon,
        end_lat: form.dest_lat,
        end_lon: form.dest_lon,
        mode: form.mode.clone(),
        alternatives: 0,
    };
    query.validate().map_err(ApiError::Validation)?;

    let raster = latest_final_raster(&state.config.upes_output_base)
        .and_then(|path| read_raster(&path).ok());
    let line = vec![
        (form.origin_lon, form.origin_lat),
        (form.dest_lon, form.dest_lat),
    ];
    let (mean, max) = mean_max_or_fallback(raster.as_ref(), &line, SAMPLE_STEP_M);
    let distance_km =
        haversine_distance(form.origin_lat, form.origin_lon, form.dest_lat, form.dest_lon) / 1000.0;

    Ok(Json(json!({
        "origin": { "lat": form.origin_lat, "lon": form.origin_lon },
        "destination": { "lat": form.dest_lat, "lon": form.dest_lon },
        "mode": aeris_core::TravelMode::parse(&form.mode).as_str(),
        "distance_km": (distance_km * 10_000.0).round() / 10_000.0,
        "mean_upes": mean,
        "max_upes": max,
        "score_source": if raster.is_some() { "upes" } else { "fallback" },
    })))
}
