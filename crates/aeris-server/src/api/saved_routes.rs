//! Saved-route CRUD, scoped to the authenticated user.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use aeris_core::SavedRoute;

use crate::persistence::saved_routes;
use crate::state::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};

const ACTIVITY_TYPES: [&str; 3] = ["commute", "jogger", "cyclist"];

#[derive(Debug, Deserialize)]
pub struct SavedRouteRequest {
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub activity_type: Option<String>,
}

fn validate_point(lat: f64, lon: f64, name: &str) -> Result<(), ApiError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::Validation(format!("{name} latitude out of range")));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::Validation(format!("{name} longitude out of range")));
    }
    Ok(())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<SavedRouteRequest>,
) -> ApiResult<(StatusCode, Json<SavedRoute>)> {
    validate_point(body.origin_lat, body.origin_lon, "origin")?;
    validate_point(body.dest_lat, body.dest_lon, "destination")?;
    if let Some(activity) = &body.activity_type {
        if !ACTIVITY_TYPES.contains(&activity.as_str()) {
            return Err(ApiError::Validation(format!(
                "activity_type must be one of {ACTIVITY_TYPES:?}"
            )));
        }
    }

    let route = saved_routes::create(
        state.db.pool(),
        user.id,
        body.origin_lat,
        body.origin_lon,
        body.dest_lat,
        body.dest_lon,
        body.activity_type.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<SavedRoute>>> {
    Ok(Json(saved_routes::list_for_user(state.db.pool(), user.id).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(route_id): Path<i64>,
) -> ApiResult<Json<SavedRoute>> {
    let route = saved_routes::get_for_user(state.db.pool(), route_id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(route))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(route_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let deleted = saved_routes::delete_for_user(state.db.pool(), route_id, user.id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
