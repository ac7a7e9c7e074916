//! Weather and pollutant-movement endpoints, cached.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{key_pollutant_movement, key_weather, TTL_POLLUTANT_MOVEMENT, TTL_WEATHER};
use crate::state::AppState;

use super::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lon: f64,
}

pub(crate) fn validate_point(lat: f64, lon: f64) -> Result<(), ApiError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::Validation("lat out of range".to_string()));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::Validation("lon out of range".to_string()));
    }
    Ok(())
}

pub async fn weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> ApiResult<Json<Value>> {
    validate_point(query.lat, query.lon)?;
    if !(1..=10).contains(&query.days) {
        return Err(ApiError::Validation("days must be 1..=10".to_string()));
    }
    let Some(weather) = &state.weather else {
        return Err(ApiError::FeatureDisabled("weather"));
    };

    let key = key_weather(query.lat, query.lon, query.days);
    if let Some(cached) = state.cache.get_json::<Value>(&key).await {
        return Ok(Json(cached));
    }
    let bundle = weather
        .bundle(query.lat, query.lon, query.days)
        .await
        .map_err(|e| ApiError::Upstream(format!("weather provider failed: {e}")))?;
    state.cache.set_json(&key, &bundle, TTL_WEATHER).await;
    Ok(Json(bundle))
}

pub async fn pollutant_movement(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PointQuery>,
) -> ApiResult<Json<Value>> {
    validate_point(query.lat, query.lon)?;
    let Some(weather) = &state.weather else {
        return Err(ApiError::FeatureDisabled("weather"));
    };

    let key = key_pollutant_movement(query.lat, query.lon);
    if let Some(cached) = state.cache.get_json::<Value>(&key).await {
        return Ok(Json(cached));
    }
    let prediction = weather
        .pollutant_movement(query.lat, query.lon)
        .await
        .map_err(|e| ApiError::Upstream(format!("weather provider failed: {e}")))?;
    state
        .cache
        .set_json(&key, &prediction, TTL_POLLUTANT_MOVEMENT)
        .await;
    Ok(Json(prediction))
}
