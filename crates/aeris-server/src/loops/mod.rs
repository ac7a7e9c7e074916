//! Scheduled background loops, one per pipeline stage.
//!
//! The hourly cadence is fixed in UTC: ingestion at :00, UPES at :15,
//! route exposure at :20, alerts at :25. Each loop absorbs its task's
//! errors and keeps running; tasks are idempotent over an (hour, gas)
//! bucket, so an occasional double fire only appends data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use tracing::{error, info};

use crate::state::AppState;

pub const INGEST_MINUTE: u32 = 0;
pub const UPES_MINUTE: u32 = 15;
pub const EXPOSURE_MINUTE: u32 = 20;
pub const ALERTS_MINUTE: u32 = 25;

/// Seconds until the next wall-clock occurrence of `minute` past the hour.
pub fn seconds_until_minute(minute: u32, now_minute: u32, now_second: u32) -> u64 {
    let now_in_hour = now_minute * 60 + now_second;
    let target = minute * 60;
    if target > now_in_hour {
        (target - now_in_hour) as u64
    } else {
        (3600 - now_in_hour + target) as u64
    }
}

async fn sleep_until_minute(minute: u32) {
    let now = Utc::now();
    let wait = seconds_until_minute(minute, now.minute(), now.second());
    tokio::time::sleep(Duration::from_secs(wait.max(1))).await;
}

/// Spawn all four pipeline loops.
pub fn spawn_all(state: Arc<AppState>) {
    tokio::spawn(run_ingest_loop(state.clone()));
    tokio::spawn(run_upes_loop(state.clone()));
    tokio::spawn(run_exposure_loop(state.clone()));
    tokio::spawn(run_alerts_loop(state));
}

pub async fn run_ingest_loop(state: Arc<AppState>) {
    loop {
        sleep_until_minute(INGEST_MINUTE).await;
        info!("Running scheduled TEMPO ingestion");
        match crate::ingest::fetch_tempo_hourly(state.clone()).await {
            Ok(report) => info!(
                "Ingestion for {} inserted {} cells",
                report.window_start, report.inserted_total
            ),
            Err(e) => error!("Scheduled ingestion failed: {e:#}"),
        }
    }
}

pub async fn run_upes_loop(state: Arc<AppState>) {
    loop {
        sleep_until_minute(UPES_MINUTE).await;
        if let Err(e) = crate::upes::compute_upes_hourly(&state).await {
            error!("Scheduled UPES compute failed: {e:#}");
        }
    }
}

pub async fn run_exposure_loop(state: Arc<AppState>) {
    loop {
        sleep_until_minute(EXPOSURE_MINUTE).await;
        if let Err(e) = crate::alerts::compute_saved_route_upes_scores(&state).await {
            error!("Scheduled route exposure scoring failed: {e:#}");
        }
    }
}

pub async fn run_alerts_loop(state: Arc<AppState>) {
    loop {
        sleep_until_minute(ALERTS_MINUTE).await;
        if let Err(e) = crate::alerts::run_alert_pipeline(&state).await {
            error!("Scheduled alert pipeline failed: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_until_minute() {
        // At :10:00, minute 15 is five minutes away.
        assert_eq!(seconds_until_minute(15, 10, 0), 300);
        // At :15:00 exactly, the next firing is an hour out.
        assert_eq!(seconds_until_minute(15, 15, 0), 3600);
        // At :20:30, minute 15 wraps to the next hour.
        assert_eq!(seconds_until_minute(15, 20, 30), 3600 - 330);
        // At :59:30, minute 0 is 30 seconds away.
        assert_eq!(seconds_until_minute(0, 59, 30), 30);
    }
}
