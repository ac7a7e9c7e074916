//! Registration, login and profile endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use aeris_core::sensitivity::sensitivity_label;
use aeris_core::User;

use crate::persistence::users;
use crate::state::AppState;

use super::auth::{create_access_token, hash_password, verify_password, AuthUser};
use super::error::{ApiError, ApiResult};

const KNOWN_CHANNELS: [&str; 3] = ["email", "push", "in_app"];

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfilePatch {
    pub notification_preferences: Option<Value>,
    pub exposure_sensitivity_level: Option<i64>,
}

fn user_response(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "notification_preferences": user.notification_preferences,
        "exposure_sensitivity_level": user.exposure_sensitivity_level,
        "sensitivity_label": sensitivity_label(user.exposure_sensitivity_level),
        "created_at": user.created_at,
    })
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let email = body.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
        return Err(ApiError::Validation("invalid email".to_string()));
    }
    if body.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let hash = hash_password(&body.password)?;
    let user = users::create_user(state.db.pool(), &email, &hash)
        .await?
        .ok_or(ApiError::EmailTaken)?;
    Ok((StatusCode::CREATED, Json(user_response(&user))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let email = body.email.trim().to_lowercase();
    let user = users::find_by_email(state.db.pool(), &email)
        .await?
        .filter(|user| verify_password(&body.password, &user.password_hash))
        .ok_or_else(|| ApiError::Auth("invalid email or password".to_string()))?;

    let token = create_access_token(
        user.id,
        &state.config.secret_key,
        state.config.access_token_expire_minutes,
    )?;
    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(user_response(&user))
}

pub async fn patch_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<ProfilePatch>,
) -> ApiResult<Json<Value>> {
    if let Some(level) = body.exposure_sensitivity_level {
        if !(1..=5).contains(&level) {
            return Err(ApiError::Validation(
                "exposure_sensitivity_level must be 1..=5".to_string(),
            ));
        }
    }
    if let Some(prefs) = &body.notification_preferences {
        let Some(map) = prefs.as_object() else {
            return Err(ApiError::Validation(
                "notification_preferences must be a map".to_string(),
            ));
        };
        for (channel, enabled) in map {
            if !KNOWN_CHANNELS.contains(&channel.as_str()) {
                return Err(ApiError::Validation(format!("unknown channel {channel}")));
            }
            if !enabled.is_boolean() {
                return Err(ApiError::Validation(format!(
                    "channel {channel} must map to a boolean"
                )));
            }
        }
    }

    let updated = users::update_profile(
        state.db.pool(),
        user.id,
        body.notification_preferences.as_ref(),
        body.exposure_sensitivity_level,
    )
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(user_response(&updated)))
}
