//! Hourly TEMPO ingestion: per-gas coverage fetch, normalization and
//! bulk insert, with optional audit upload to object storage.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, DurationRound, Utc};
use tracing::{error, info, warn};

use aeris_core::{GasType, ALL_GASES};

use crate::cache::{KEY_TEMPO_LAST_UPDATE, TTL_LAST_UPDATE};
use crate::persistence::{netcdf_files, pollution_grid};
use crate::raster::{decode_geotiff, raster_to_grid_rows, NormalizerOptions};
use crate::state::AppState;
use crate::storage::audit_key;

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub window_start: DateTime<Utc>,
    pub inserted_total: u64,
    pub per_gas: Vec<(GasType, u64)>,
}

/// Last completed UTC hour as a half-open window.
pub fn ingest_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    (end - Duration::hours(1), end)
}

/// Fetch every gas for the last completed hour. A failing gas is logged
/// and skipped; the others proceed. When anything was inserted, the
/// last-update stamp is cached and the UPES and exposure tasks run.
pub async fn fetch_tempo_hourly(state: Arc<AppState>) -> Result<IngestReport> {
    let (start, end) = ingest_window(Utc::now());
    let timestamp = start;
    let bbox = state.config.tempo_bbox;
    let mut report = IngestReport {
        window_start: timestamp,
        inserted_total: 0,
        per_gas: Vec::new(),
    };

    for gas in ALL_GASES {
        match ingest_gas(&state, gas, timestamp, start, end, &bbox).await {
            Ok(inserted) => {
                info!("Inserted {} cells for {}", inserted, gas.as_str());
                report.inserted_total += inserted;
                report.per_gas.push((gas, inserted));
            }
            Err(e) => {
                error!("Ingestion failed for {}: {e:#}", gas.as_str());
                report.per_gas.push((gas, 0));
            }
        }
    }

    if report.inserted_total > 0 {
        state
            .cache
            .set(KEY_TEMPO_LAST_UPDATE, &timestamp.to_rfc3339(), TTL_LAST_UPDATE)
            .await;

        // Kick the downstream tasks without waiting on the schedule.
        let upes_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::upes::compute_upes_hourly(&upes_state).await {
                error!("On-demand UPES compute failed: {e:#}");
            }
            if let Err(e) =
                crate::alerts::compute_saved_route_upes_scores(&upes_state).await
            {
                error!("On-demand route exposure recompute failed: {e:#}");
            }
        });
    }

    Ok(report)
}

async fn ingest_gas(
    state: &AppState,
    gas: GasType,
    timestamp: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bbox: &aeris_core::spatial::BoundingBox,
) -> Result<u64> {
    let Some(bytes) = state.harmony.fetch_coverage(gas, bbox, start, end).await? else {
        info!("No granules for {} in window", gas.as_str());
        return Ok(0);
    };

    // Audit copy is best-effort; ingestion continues without it.
    if let Some(storage) = &state.storage {
        let key = audit_key(gas.as_str(), timestamp);
        match storage.upload(&key, bytes.clone()).await {
            Ok(bucket_path) => {
                let file_name = key.rsplit('/').next().unwrap_or(&key).to_string();
                if let Err(e) = netcdf_files::insert(
                    state.db.pool(),
                    &file_name,
                    &bucket_path,
                    timestamp,
                    gas,
                )
                .await
                {
                    warn!("netcdf_files row insert failed: {e:#}");
                }
                info!("Uploaded GeoTIFF audit copy to {}", key);
            }
            Err(e) => warn!("Audit upload skipped: {e:#}"),
        }
    }

    let raster = decode_geotiff(&bytes)?;
    let mut inserted = 0u64;
    for chunk in raster_to_grid_rows(&raster, gas, timestamp, &NormalizerOptions::default()) {
        // A failing chunk aborts only itself.
        match pollution_grid::insert_chunk(state.db.pool(), &chunk).await {
            Ok(count) => inserted += count,
            Err(e) => warn!("Chunk insert failed for {}: {e:#}", gas.as_str()),
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ingest_window_is_last_completed_hour() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 14, 37, 12).unwrap();
        let (start, end) = ingest_window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap());
    }
}
