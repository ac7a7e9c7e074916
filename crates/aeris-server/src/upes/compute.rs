//! Hourly UPES computation: aggregate, normalize, score, apply weather
//! modifiers, smooth and write the hour's artifacts.

use anyhow::Result;
use chrono::Duration;
use tracing::{info, warn};

use aeris_core::scoring::{
    final_scores, humidity_dispersion_factor, nan_mean, normalization_bounds, normalize_grid,
    satellite_score, traffic_factor, wind_factor,
};

use crate::cache::{KEY_UPES_LAST_UPDATE, TTL_LAST_UPDATE};
use crate::persistence::pollution_grid;
use crate::raster::{read_raster, write_raster_atomic, Raster};
use crate::state::AppState;
use crate::upes::aggregate::aggregate_window;
use crate::upes::outputs::{
    ensure_dirs, final_path, hour_slot, satellite_path, write_log, UpesLog,
};

/// Until a traffic provider exists, density is zero and TF stays 1.0.
fn traffic_density_stub() -> f64 {
    0.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpesOutcome {
    Skipped(&'static str),
    Completed(UpesRunSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpesRunSummary {
    pub slot: String,
    pub cells: usize,
    pub satellite_mean: f64,
    pub final_mean: f64,
    pub hdf: f64,
    pub wtf: f64,
    pub tf: f64,
}

/// Compute UPES for the latest ingested hour and write the raster pair
/// plus the JSON log. Runs at :15 and on demand after ingestion.
pub async fn compute_upes_hourly(state: &AppState) -> Result<UpesOutcome> {
    if !state.config.upes_enabled {
        info!("UPES disabled; skipping compute");
        return Ok(UpesOutcome::Skipped("disabled"));
    }

    let pool = state.db.pool();
    let Some(max_ts) = pollution_grid::max_timestamp(pool).await? else {
        info!("No pollution_grid data; skipping UPES");
        return Ok(UpesOutcome::Skipped("no_data"));
    };
    // Consistent snapshot: the latest ingested hour.
    let ts_end = max_ts;
    let ts_start = ts_end - Duration::hours(1);
    let timestamp = ts_start;

    let bbox = state.config.upes_bbox_effective();
    let resolution = state.config.upes_grid_resolution_deg;
    let (spec, gas_grids) = aggregate_window(pool, ts_start, ts_end, &bbox, resolution).await?;
    if gas_grids.is_empty() {
        info!("No gas data in bbox; skipping UPES");
        return Ok(UpesOutcome::Skipped("no_gas_data"));
    }

    let normalized: Vec<_> = gas_grids
        .iter()
        .map(|(gas, grid)| {
            let (low, high) = normalization_bounds(grid, *gas);
            (*gas, normalize_grid(grid, low, high))
        })
        .collect();
    let satellite = satellite_score(&normalized, spec.len());

    // Weather modifiers from grid-center conditions; defaults are neutral.
    let (center_lon, center_lat) = bbox.center();
    let mut humidity_pct = 50.0;
    let mut wind_kph = 0.0;
    if let Some(weather) = &state.weather {
        match weather.current(center_lat, center_lon).await {
            Ok(current) => {
                humidity_pct = current.humidity;
                wind_kph = current.wind_kph;
            }
            Err(error) => warn!("Weather unavailable for UPES: {error:#}"),
        }
    }
    let hdf = humidity_dispersion_factor(humidity_pct);
    let wtf = wind_factor(wind_kph);
    let tf = traffic_factor(traffic_density_stub(), state.config.upes_traffic_alpha);

    // Previous hour's final raster feeds the EMA when shapes line up.
    let base = state.config.upes_output_base.clone();
    let previous_final = state.config.upes_ema_lambda.and_then(|_| {
        let prev_slot = hour_slot(timestamp - Duration::hours(1));
        let path = final_path(&base, &prev_slot);
        if !path.exists() {
            return None;
        }
        match read_raster(&path) {
            Ok(raster) if raster.width == spec.nx && raster.height == spec.ny => {
                Some(raster.values_f64())
            }
            Ok(_) => None,
            Err(error) => {
                warn!("Previous UPES raster unreadable: {error:#}");
                None
            }
        }
    });

    let final_grid = final_scores(
        &satellite,
        hdf,
        wtf,
        tf,
        previous_final.as_deref(),
        state.config.upes_ema_lambda,
    );

    let slot = hour_slot(timestamp);
    ensure_dirs(&base)?;
    write_raster_atomic(&satellite_path(&base, &slot), &Raster::from_grid(&spec, &satellite))?;
    write_raster_atomic(&final_path(&base, &slot), &Raster::from_grid(&spec, &final_grid))?;

    let satellite_mean = nan_mean(&satellite);
    let final_mean = nan_mean(&final_grid);
    let cells = satellite.iter().filter(|v| v.is_finite()).count();
    let log = UpesLog {
        timestamp: timestamp.to_rfc3339(),
        granule_ids: Vec::new(),
        gases: gas_grids.iter().map(|(gas, _)| gas.as_str().to_string()).collect(),
        cells,
        satellite_score: round4(satellite_mean),
        humidity_factor: round4(hdf),
        wind_factor: round4(wtf),
        traffic_factor: round4(tf),
        final_score: round4(final_mean),
    };
    let log_path = write_log(&base, &slot, &log)?;
    info!("UPES written for slot {} ({} cells), log {}", slot, cells, log_path.display());

    state
        .cache
        .set(KEY_UPES_LAST_UPDATE, &timestamp.to_rfc3339(), TTL_LAST_UPDATE)
        .await;

    Ok(UpesOutcome::Completed(UpesRunSummary {
        slot,
        cells,
        satellite_mean,
        final_mean,
        hdf,
        wtf,
        tf,
    }))
}

fn round4(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10_000.0).round() / 10_000.0
    } else {
        0.0
    }
}
