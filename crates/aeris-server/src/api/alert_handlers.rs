//! Alert history endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;

use aeris_core::{AlertLogEntry, AlertType};

use crate::persistence::alert_log;
use crate::state::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub route_id: Option<i64>,
    pub alert_type: Option<String>,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    7
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Json<Vec<AlertLogEntry>>> {
    if !(1..=90).contains(&query.days) {
        return Err(ApiError::Validation("days must be 1..=90".to_string()));
    }
    let alert_type = match &query.alert_type {
        Some(raw) => Some(
            AlertType::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("unknown alert_type {raw}")))?,
        ),
        None => None,
    };
    let since = Utc::now() - Duration::days(query.days);
    let alerts =
        alert_log::list_for_user(state.db.pool(), user.id, query.route_id, alert_type, since)
            .await?;
    Ok(Json(alerts))
}
