//! Point analysis endpoints over the latest pollution grid window:
//! per-gas summaries, hotspots and the combined satellite + weather view.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Form, Json};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use aeris_core::spatial::BoundingBox;
use aeris_core::{GasType, ALL_GASES};

use crate::persistence::pollution_grid::{self, CellSample};
use crate::state::AppState;

use super::error::{ApiError, ApiResult};
use super::weather_handlers::validate_point;

const DEFAULT_RADIUS_KM: f64 = 25.0;
const HOTSPOT_LIMIT: usize = 50;

fn severity_label(severity: i64) -> &'static str {
    match severity {
        4 => "hazardous",
        3 => "very_unhealthy",
        2 => "unhealthy",
        1 => "moderate",
        _ => "good",
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
    pub gases: Option<String>,
    #[serde(default)]
    pub include_weather: bool,
    #[serde(default)]
    pub include_pollutant_prediction: bool,
}

#[derive(Debug, Deserialize)]
pub struct HotspotsQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius: Option<f64>,
    pub gases: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CombinedQuery {
    pub lat: f64,
    pub lon: f64,
}

fn parse_gases(raw: Option<&str>) -> Vec<GasType> {
    match raw {
        None => ALL_GASES.to_vec(),
        Some(raw) => {
            let parsed: Vec<GasType> =
                raw.split(',').filter_map(|g| GasType::parse(g)).collect();
            if parsed.is_empty() {
                ALL_GASES.to_vec()
            } else {
                parsed
            }
        }
    }
}

struct WindowCells {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cells: Vec<CellSample>,
}

/// Cells of the latest one-hour window around a point.
async fn gather_cells(
    state: &AppState,
    lat: f64,
    lon: f64,
    radius_km: f64,
    gases: &[GasType],
) -> ApiResult<Option<WindowCells>> {
    let Some(max_ts) = pollution_grid::max_timestamp(state.db.pool()).await? else {
        return Ok(None);
    };
    let start = max_ts - Duration::hours(1);
    let bbox = BoundingBox::new(lon, lat, lon, lat).expanded_km(radius_km.clamp(1.0, 500.0));
    let cells = pollution_grid::cells_in_window(state.db.pool(), start, max_ts, &bbox)
        .await?
        .into_iter()
        .filter(|cell| gases.contains(&cell.gas_type))
        .collect();
    Ok(Some(WindowCells { start, end: max_ts, cells }))
}

fn summarize(cells: &[CellSample], gases: &[GasType]) -> (Value, Value, Vec<Value>, Vec<Value>) {
    let mut summaries = BTreeMap::new();
    let mut units = BTreeMap::new();
    let mut alerts = Vec::new();

    for gas in gases {
        let gas_cells: Vec<&CellSample> =
            cells.iter().filter(|c| c.gas_type == *gas).collect();
        if gas_cells.is_empty() {
            continue;
        }
        let count = gas_cells.len();
        let mean = gas_cells.iter().map(|c| c.pollution_value).sum::<f64>() / count as f64;
        let Some(max_cell) = gas_cells.iter().max_by(|a, b| {
            a.pollution_value
                .partial_cmp(&b.pollution_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            continue;
        };
        let max_severity = gas_cells.iter().map(|c| c.severity_level).max().unwrap_or(0);

        summaries.insert(
            gas.as_str().to_string(),
            json!({
                "cells": count,
                "mean_value": mean,
                "max_value": max_cell.pollution_value,
                "max_severity": max_severity,
                "level": severity_label(max_severity),
            }),
        );
        units.insert(gas.as_str().to_string(), gas.unit());

        if max_severity >= 3 {
            alerts.push(json!({
                "gas": gas.as_str(),
                "level": severity_label(max_severity),
                "message": format!(
                    "{} {} levels detected in the area",
                    severity_label(max_severity),
                    gas.as_str(),
                ),
            }));
        }
    }

    let mut hotspots: Vec<&CellSample> =
        cells.iter().filter(|c| c.severity_level >= 2).collect();
    hotspots.sort_by(|a, b| {
        b.severity_level
            .cmp(&a.severity_level)
            .then(b.pollution_value.partial_cmp(&a.pollution_value).unwrap_or(std::cmp::Ordering::Equal))
    });
    let hotspots: Vec<Value> = hotspots
        .into_iter()
        .take(HOTSPOT_LIMIT)
        .map(|c| {
            json!({
                "lat": c.lat,
                "lon": c.lon,
                "gas": c.gas_type.as_str(),
                "value": c.pollution_value,
                "severity": c.severity_level,
                "level": severity_label(c.severity_level),
            })
        })
        .collect();

    (json!(summaries), json!(units), hotspots, alerts)
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AnalyzeForm>,
) -> ApiResult<Json<Value>> {
    let (lat, lon, place) = match (form.latitude, form.longitude) {
        (Some(lat), Some(lon)) => {
            validate_point(lat, lon)?;
            (lat, lon, None)
        }
        _ => {
            let location = form
                .location
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::Validation("location or latitude/longitude required".to_string())
                })?;
            let (lat, lon) = state
                .geocoder
                .search(location)
                .await
                .map_err(|e| ApiError::Upstream(format!("geocoder failed: {e}")))?
                .ok_or_else(|| ApiError::Validation(format!("location not found: {location}")))?;
            (lat, lon, Some(location.to_string()))
        }
    };

    let gases = parse_gases(form.gases.as_deref());
    let radius = form.radius.unwrap_or(DEFAULT_RADIUS_KM);
    let window = gather_cells(&state, lat, lon, radius, &gases).await?;

    let mut response = json!({
        "location": { "lat": lat, "lon": lon, "name": place },
        "image_url": Value::Null,
    });

    match window {
        Some(window) => {
            let (summaries, units, hotspots, alerts) = summarize(&window.cells, &gases);
            response["window"] = json!({ "start": window.start, "end": window.end });
            response["gases"] = summaries;
            response["units"] = units;
            response["hotspots"] = json!(hotspots);
            response["alerts"] = json!(alerts);
        }
        None => {
            response["gases"] = json!({});
            response["units"] = json!({});
            response["hotspots"] = json!([]);
            response["alerts"] = json!([]);
        }
    }

    if form.include_weather {
        if let Some(weather) = &state.weather {
            if let Ok(bundle) = weather.bundle(lat, lon, 1).await {
                response["weather"] = bundle;
            }
        }
    }
    if form.include_pollutant_prediction {
        if let Some(weather) = &state.weather {
            if let Ok(prediction) = weather.pollutant_movement(lat, lon).await {
                response["pollutant_prediction"] = prediction;
            }
        }
    }

    Ok(Json(response))
}

pub async fn hotspots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HotspotsQuery>,
) -> ApiResult<Json<Value>> {
    validate_point(query.lat, query.lon)?;
    let gases = parse_gases(query.gases.as_deref());
    let radius = query.radius.unwrap_or(DEFAULT_RADIUS_KM);
    let window = gather_cells(&state, query.lat, query.lon, radius, &gases).await?;

    let features: Vec<Value> = match window {
        None => Vec::new(),
        Some(window) => {
            let (_, _, hotspots, _) = summarize(&window.cells, &gases);
            hotspots
                .into_iter()
                .map(|h| {
                    json!({
                        "type": "Feature",
                        "geometry": {
                            "type": "Point",
                            "coordinates": [h["lon"], h["lat"]],
                        },
                        "properties": {
                            "gas": h["gas"],
                            "value": h["value"],
                            "severity": h["severity"],
                            "level": h["level"],
                            "radius_km": 2.5,
                        },
                    })
                })
                .collect()
        }
    };

    Ok(Json(json!({ "type": "FeatureCollection", "features": features })))
}

pub async fn combined_analysis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CombinedQuery>,
) -> ApiResult<Json<Value>> {
    validate_point(query.lat, query.lon)?;
    let gases = ALL_GASES.to_vec();
    let window = gather_cells(&state, query.lat, query.lon, DEFAULT_RADIUS_KM, &gases).await?;

    let (satellite, overall_severity) = match &window {
        Some(window) => {
            let (summaries, _, _, _) = summarize(&window.cells, &gases);
            let overall = window.cells.iter().map(|c| c.severity_level).max().unwrap_or(0);
            (summaries, overall)
        }
        None => (json!({}), 0),
    };

    let mut weather_value = Value::Null;
    if let Some(weather) = &state.weather {
        if let Ok(current) = weather.current(query.lat, query.lon).await {
            weather_value = json!({
                "temp_c": current.temp_c,
                "humidity": current.humidity,
                "wind_kph": current.wind_kph,
                "wind_degree": current.wind_degree,
                "condition": current.condition.text,
            });
        }
    }

    Ok(Json(json!({
        "location": { "lat": query.lat, "lon": query.lon },
        "satellite": satellite,
        "weather": weather_value,
        "overall_status": severity_label(overall_severity),
    })))
}
