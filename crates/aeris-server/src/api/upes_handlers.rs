//! UPES artifact introspection: latest run, per-hour paths, heatmap.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::raster::read_raster;
use crate::state::AppState;
use crate::upes::heatmap::render_heatmap;
use crate::upes::outputs::{latest_log, log_path, paths_for_slot};
use crate::upes::{hour_slot, latest_final_raster};

use super::error::{ApiError, ApiResult};

pub async fn latest(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let base = &state.config.upes_output_base;
    let (path, log) = latest_log(base).ok_or(ApiError::NotFound)?;

    // The log name carries the hour slot: upes_YYYYMMDD_HH.json.
    let slot = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("upes_"))
        .unwrap_or_default()
        .to_string();
    let paths = paths_for_slot(base, &slot);

    Ok(Json(json!({
        "slot": slot,
        "log": log,
        "paths": paths.map(|(satellite, final_score, log)| json!({
            "satellite_score": satellite,
            "final_score": final_score,
            "log": log,
        })),
    })))
}

#[derive(Debug, Deserialize)]
pub struct GridQuery {
    pub timestamp: String,
}

pub async fn grid(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GridQuery>,
) -> ApiResult<Json<Value>> {
    let raw = query.timestamp.trim();
    // Accept either the artifact slot format or an RFC3339 timestamp.
    let slot = if raw.len() == 11 && raw.as_bytes().get(8) == Some(&b'_') {
        raw.to_string()
    } else {
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map_err(|_| ApiError::Validation(format!("unparseable timestamp {raw}")))?;
        hour_slot(parsed.with_timezone(&chrono::Utc))
    };

    let base = &state.config.upes_output_base;
    let (satellite, final_score, _) = paths_for_slot(base, &slot).ok_or(ApiError::NotFound)?;
    let log = log_path(base, &slot);
    Ok(Json(json!({
        "slot": slot,
        "satellite_score": satellite,
        "final_score": final_score,
        "log": log.exists().then_some(log),
    })))
}

pub async fn heatmap(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let path =
        latest_final_raster(&state.config.upes_output_base).ok_or(ApiError::NotFound)?;
    let raster = read_raster(&path)
        .map_err(|e| ApiError::Internal(e.context("latest UPES raster unreadable")))?;
    let png = render_heatmap(&raster, state.config.upes_alert_threshold)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        png,
    )
        .into_response())
}
