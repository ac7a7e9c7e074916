//! Pollution grid persistence: append-only rows produced by the raster
//! normalizer, queried by time window and envelope.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use aeris_core::spatial::BoundingBox;
use aeris_core::{CellBounds, GasType, GridRow};

use super::{decode_ts, encode_ts};

/// Insert one normalizer chunk inside a single transaction. A failure
/// aborts only this chunk.
pub async fn insert_chunk(pool: &SqlitePool, rows: &[GridRow]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    let created_at = encode_ts(Utc::now());
    for row in rows {
        sqlx::query(
            "INSERT INTO pollution_grid \
             (timestamp, gas_type, geom_wkt, min_lon, min_lat, max_lon, max_lat, \
              pollution_value, severity_level, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(encode_ts(row.timestamp))
        .bind(row.gas_type.as_str())
        .bind(row.bounds.to_wkt())
        .bind(row.bounds.min_lon)
        .bind(row.bounds.min_lat)
        .bind(row.bounds.max_lon)
        .bind(row.bounds.max_lat)
        .bind(row.pollution_value)
        .bind(row.severity_level)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

/// Most recent ingestion timestamp across all gases, if any.
pub async fn max_timestamp(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT MAX(timestamp) FROM pollution_grid")
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(ts,)| ts).map(|ts| decode_ts(&ts)))
}

/// A cell read back for aggregation or analysis.
#[derive(Debug, Clone)]
pub struct CellSample {
    pub gas_type: GasType,
    pub lon: f64,
    pub lat: f64,
    pub pollution_value: f64,
    pub severity_level: i64,
}

#[derive(sqlx::FromRow)]
struct CellRow {
    gas_type: String,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    pollution_value: f64,
    severity_level: i64,
}

impl CellRow {
    fn into_sample(self) -> Option<CellSample> {
        let gas = GasType::parse(&self.gas_type)?;
        let bounds = CellBounds {
            min_lon: self.min_lon,
            min_lat: self.min_lat,
            max_lon: self.max_lon,
            max_lat: self.max_lat,
        };
        let (lon, lat) = bounds.centroid();
        Some(CellSample {
            gas_type: gas,
            lon,
            lat,
            pollution_value: self.pollution_value,
            severity_level: self.severity_level,
        })
    }
}

/// Cells inside a closed time window whose envelope overlaps the bbox.
pub async fn cells_in_window(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bbox: &BoundingBox,
) -> Result<Vec<CellSample>> {
    let rows = sqlx::query_as::<_, CellRow>(
        "SELECT gas_type, min_lon, min_lat, max_lon, max_lat, pollution_value, severity_level \
         FROM pollution_grid \
         WHERE timestamp >= ?1 AND timestamp <= ?2 \
           AND max_lon >= ?3 AND min_lon <= ?4 \
           AND max_lat >= ?5 AND min_lat <= ?6",
    )
    .bind(encode_ts(start))
    .bind(encode_ts(end))
    .bind(bbox.west)
    .bind(bbox.east)
    .bind(bbox.south)
    .bind(bbox.north)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(CellRow::into_sample).collect())
}

/// Centroid of the most recent hazard-severity cell overlapping the bbox,
/// used as the wind-shift source point.
pub async fn hazard_cell_in_window(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bbox: &BoundingBox,
) -> Result<Option<(f64, f64)>> {
    let row = sqlx::query_as::<_, CellRow>(
        "SELECT gas_type, min_lon, min_lat, max_lon, max_lat, pollution_value, severity_level \
         FROM pollution_grid \
         WHERE severity_level >= 4 \
           AND timestamp >= ?1 AND timestamp <= ?2 \
           AND max_lon >= ?3 AND min_lon <= ?4 \
           AND max_lat >= ?5 AND min_lat <= ?6 \
         ORDER BY timestamp DESC, pollution_value DESC LIMIT 1",
    )
    .bind(encode_ts(start))
    .bind(encode_ts(end))
    .bind(bbox.west)
    .bind(bbox.east)
    .bind(bbox.south)
    .bind(bbox.north)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|r| r.into_sample()).map(|c| (c.lat, c.lon)))
}

/// Row count for one gas in a window; used by ingestion reporting.
pub async fn count_in_window(
    pool: &SqlitePool,
    gas: GasType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pollution_grid \
         WHERE gas_type = ?1 AND timestamp >= ?2 AND timestamp <= ?3",
    )
    .bind(gas.as_str())
    .bind(encode_ts(start))
    .bind(encode_ts(end))
    .fetch_one(pool)
    .await?;
    Ok(row.0 as u64)
}
