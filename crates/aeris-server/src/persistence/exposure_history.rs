//! Route exposure history: immutable per-run scoring log.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use aeris_core::ExposureSample;

use super::{decode_ts, encode_ts};

#[derive(sqlx::FromRow)]
struct ExposureRow {
    id: i64,
    route_id: i64,
    timestamp: String,
    upes_score: f64,
    max_upes_along_route: Option<f64>,
    score_source: String,
}

impl From<ExposureRow> for ExposureSample {
    fn from(row: ExposureRow) -> Self {
        ExposureSample {
            id: row.id,
            route_id: row.route_id,
            timestamp: decode_ts(&row.timestamp),
            upes_score: row.upes_score,
            max_upes_along_route: row.max_upes_along_route,
            score_source: row.score_source,
        }
    }
}

pub async fn insert(
    pool: &SqlitePool,
    route_id: i64,
    timestamp: DateTime<Utc>,
    upes_score: f64,
    max_upes_along_route: Option<f64>,
    score_source: &str,
) -> Result<i64> {
    let done = sqlx::query(
        "INSERT INTO route_exposure_history \
         (route_id, timestamp, upes_score, max_upes_along_route, score_source) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(route_id)
    .bind(encode_ts(timestamp))
    .bind(upes_score)
    .bind(max_upes_along_route)
    .bind(score_source)
    .execute(pool)
    .await?;
    Ok(done.last_insert_rowid())
}

/// Latest rows first; limit 2 gives (current, previous) for detection.
pub async fn latest(pool: &SqlitePool, route_id: i64, limit: u32) -> Result<Vec<ExposureSample>> {
    let rows = sqlx::query_as::<_, ExposureRow>(
        "SELECT id, route_id, timestamp, upes_score, max_upes_along_route, score_source \
         FROM route_exposure_history WHERE route_id = ?1 \
         ORDER BY timestamp DESC, id DESC LIMIT ?2",
    )
    .bind(route_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ExposureSample::from).collect())
}

/// Minimum score since a cutoff, for the time-based check.
pub async fn min_since(
    pool: &SqlitePool,
    route_id: i64,
    since: DateTime<Utc>,
) -> Result<Option<f64>> {
    let row: (Option<f64>,) = sqlx::query_as(
        "SELECT MIN(upes_score) FROM route_exposure_history \
         WHERE route_id = ?1 AND timestamp >= ?2",
    )
    .bind(route_id)
    .bind(encode_ts(since))
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn count_for_route(pool: &SqlitePool, route_id: i64) -> Result<u64> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM route_exposure_history WHERE route_id = ?1")
            .bind(route_id)
            .fetch_one(pool)
            .await?;
    Ok(row.0 as u64)
}
