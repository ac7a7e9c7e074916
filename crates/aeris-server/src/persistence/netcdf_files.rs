//! Raster blob metadata: the blob lives in object storage, the row is
//! the index.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use aeris_core::{GasType, NetcdfFile};

use super::{decode_ts, encode_ts};

#[derive(sqlx::FromRow)]
struct NetcdfRow {
    id: i64,
    file_name: String,
    bucket_path: String,
    timestamp: String,
    gas_type: String,
    created_at: String,
}

impl NetcdfRow {
    fn into_record(self) -> Option<NetcdfFile> {
        Some(NetcdfFile {
            id: self.id,
            file_name: self.file_name,
            bucket_path: self.bucket_path,
            timestamp: decode_ts(&self.timestamp),
            gas_type: GasType::parse(&self.gas_type)?,
            created_at: decode_ts(&self.created_at),
        })
    }
}

pub async fn insert(
    pool: &SqlitePool,
    file_name: &str,
    bucket_path: &str,
    timestamp: DateTime<Utc>,
    gas: GasType,
) -> Result<i64> {
    let done = sqlx::query(
        "INSERT INTO netcdf_files (file_name, bucket_path, timestamp, gas_type, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(file_name)
    .bind(bucket_path)
    .bind(encode_ts(timestamp))
    .bind(gas.as_str())
    .bind(encode_ts(Utc::now()))
    .execute(pool)
    .await?;
    Ok(done.last_insert_rowid())
}

/// Most recent artifact for a gas, if any was recorded.
pub async fn latest_for_gas(pool: &SqlitePool, gas: GasType) -> Result<Option<NetcdfFile>> {
    let row = sqlx::query_as::<_, NetcdfRow>(
        "SELECT id, file_name, bucket_path, timestamp, gas_type, created_at \
         FROM netcdf_files WHERE gas_type = ?1 \
         ORDER BY timestamp DESC, id DESC LIMIT 1",
    )
    .bind(gas.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(NetcdfRow::into_record))
}
