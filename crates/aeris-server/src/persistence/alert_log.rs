//! Alert log persistence: append-only triggered alerts.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use aeris_core::{AlertLogEntry, AlertType, TriggeredAlert};

use super::{decode_ts, encode_ts};

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    user_id: i64,
    route_id: Option<i64>,
    alert_type: String,
    score_before: Option<f64>,
    score_after: Option<f64>,
    threshold: Option<f64>,
    metadata: Option<String>,
    notified_channels: Option<String>,
    created_at: String,
}

impl AlertRow {
    fn into_entry(self) -> Option<AlertLogEntry> {
        Some(AlertLogEntry {
            id: self.id,
            user_id: self.user_id,
            route_id: self.route_id,
            alert_type: AlertType::parse(&self.alert_type)?,
            score_before: self.score_before,
            score_after: self.score_after,
            threshold: self.threshold,
            alert_metadata: self
                .metadata
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(serde_json::Value::Null),
            notified_channels: self
                .notified_channels
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            created_at: decode_ts(&self.created_at),
        })
    }
}

/// Persist one triggered alert; the `metadata` column carries the alert's
/// free-form map (the API field is named `alert_metadata`).
pub async fn insert(
    pool: &SqlitePool,
    user_id: i64,
    route_id: Option<i64>,
    alert: &TriggeredAlert,
    channels: &[String],
) -> Result<i64> {
    let done = sqlx::query(
        "INSERT INTO alert_log \
         (user_id, route_id, alert_type, score_before, score_after, threshold, \
          metadata, notified_channels, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(user_id)
    .bind(route_id)
    .bind(alert.alert_type.as_str())
    .bind(alert.score_before)
    .bind(alert.score_after)
    .bind(alert.threshold)
    .bind(serde_json::to_string(&alert.metadata)?)
    .bind(serde_json::to_string(channels)?)
    .bind(encode_ts(Utc::now()))
    .execute(pool)
    .await?;
    Ok(done.last_insert_rowid())
}

/// Alerts for one user, newest first, optionally filtered by route and type.
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: i64,
    route_id: Option<i64>,
    alert_type: Option<AlertType>,
    since: DateTime<Utc>,
) -> Result<Vec<AlertLogEntry>> {
    let mut sql = String::from(
        "SELECT id, user_id, route_id, alert_type, score_before, score_after, threshold, \
         metadata, notified_channels, created_at \
         FROM alert_log WHERE user_id = ?1 AND created_at >= ?2",
    );
    if route_id.is_some() {
        sql.push_str(" AND route_id = ?3");
    }
    if alert_type.is_some() {
        sql.push_str(if route_id.is_some() {
            " AND alert_type = ?4"
        } else {
            " AND alert_type = ?3"
        });
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut query = sqlx::query_as::<_, AlertRow>(&sql)
        .bind(user_id)
        .bind(encode_ts(since));
    if let Some(route_id) = route_id {
        query = query.bind(route_id);
    }
    if let Some(alert_type) = alert_type {
        query = query.bind(alert_type.as_str());
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().filter_map(AlertRow::into_entry).collect())
}

/// True when an alert of this type already exists for the route since the
/// cutoff; used to suppress duplicate deterioration alerts within an hour.
pub async fn exists_since(
    pool: &SqlitePool,
    route_id: i64,
    alert_type: AlertType,
    since: DateTime<Utc>,
) -> Result<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM alert_log \
         WHERE route_id = ?1 AND alert_type = ?2 AND created_at >= ?3",
    )
    .bind(route_id)
    .bind(alert_type.as_str())
    .bind(encode_ts(since))
    .fetch_one(pool)
    .await?;
    Ok(row.0 > 0)
}
