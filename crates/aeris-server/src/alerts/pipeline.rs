//! Scheduled alert tasks: saved-route exposure scoring and the alert
//! detection pipeline with webhook dispatch.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use aeris_core::alerts::{detect_route_alerts, DetectionContext, DetectionThresholds};
use aeris_core::spatial::BoundingBox;
use aeris_core::AlertType;

use crate::persistence::{alert_log, exposure_history, pollution_grid, saved_routes, users};
use crate::raster::{mean_max_or_fallback, read_raster, SAMPLE_STEP_M};
use crate::state::AppState;
use crate::upes::latest_final_raster;

use super::webhook::{alert_message, dispatch, WebhookAlert};

/// How far around a route to look for a wind-shift source cell.
const SOURCE_BBOX_EXPAND_KM: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Skipped(&'static str),
    Completed { count: usize },
}

/// Score every saved route against the current final raster; write a
/// history row and denormalize onto the route. Skips when no raster
/// exists.
pub async fn compute_saved_route_upes_scores(state: &AppState) -> Result<TaskOutcome> {
    let Some(raster_path) = latest_final_raster(&state.config.upes_output_base) else {
        info!("No UPES raster; skipping saved-route scoring");
        return Ok(TaskOutcome::Skipped("no_raster"));
    };
    // One raster snapshot for the whole run.
    let raster = match read_raster(&raster_path) {
        Ok(raster) => raster,
        Err(e) => {
            warn!("UPES raster unreadable ({e:#}); skipping saved-route scoring");
            return Ok(TaskOutcome::Skipped("no_raster"));
        }
    };

    let pool = state.db.pool();
    let routes = saved_routes::list_all(pool).await?;
    let now = Utc::now();
    let mut count = 0usize;
    for route in &routes {
        let (mean, max) =
            mean_max_or_fallback(Some(&raster), &route.line_coords(), SAMPLE_STEP_M);
        let mean = round6(mean);
        let result = async {
            exposure_history::insert(pool, route.id, now, mean, Some(round6(max)), "upes").await?;
            saved_routes::update_exposure(pool, route.id, mean, now).await
        }
        .await;
        match result {
            Ok(()) => count += 1,
            Err(e) => warn!("UPES route score failed for route {}: {e:#}", route.id),
        }
    }
    info!("Computed UPES scores for {} saved routes", count);
    Ok(TaskOutcome::Completed { count })
}

/// Evaluate the four alert checks for every saved route, persist the
/// triggered alerts, and POST the batch to the webhook when configured.
pub async fn run_alert_pipeline(state: &AppState) -> Result<TaskOutcome> {
    if !state.config.alerts_enabled {
        info!("Alerts disabled; skipping pipeline");
        return Ok(TaskOutcome::Skipped("disabled"));
    }

    let pool = state.db.pool();
    let thresholds = DetectionThresholds {
        deterioration_base_pct: state.config.alerts_deterioration_base_pct,
        hazard_threshold: state.config.alerts_hazard_threshold,
        wind_speed_min_kph: state.config.alerts_wind_speed_min_kph,
        wind_angle_deg: state.config.alerts_wind_angle_deg,
    };
    let now = Utc::now();
    let since_24h = now - Duration::hours(24);
    let dedup_cutoff = now - Duration::hours(1);

    let routes = saved_routes::list_all(pool).await?;
    let mut batch: Vec<WebhookAlert> = Vec::new();
    let mut alert_count = 0usize;

    for route in &routes {
        let Some(user) = users::find_by_id(pool, route.user_id).await? else {
            continue;
        };
        let Some(current_upes) = route.last_upes_score else {
            continue;
        };

        let history = exposure_history::latest(pool, route.id, 2).await?;
        let max_upes = history
            .first()
            .and_then(|h| h.max_upes_along_route)
            .unwrap_or(current_upes);
        let prev_upes = history.get(1).map(|h| h.upes_score);
        let recent_min = exposure_history::min_since(pool, route.id, since_24h).await?;

        let (mid_lat, mid_lon) = route.midpoint();
        let mut wind_kph = None;
        let mut wind_degree = None;
        if let Some(weather) = &state.weather {
            match weather.current(mid_lat, mid_lon).await {
                Ok(current) => {
                    wind_kph = Some(current.wind_kph);
                    wind_degree = Some(current.wind_degree);
                }
                Err(e) => warn!("Weather unavailable for route {}: {e:#}", route.id),
            }
        }

        // Wind-shift source: the most recent hazard-severity cell near
        // the route; without one the check is skipped.
        let source_point = match pollution_grid::max_timestamp(pool).await? {
            Some(max_ts) => {
                let route_bbox = BoundingBox::from_points(&route.line_coords())
                    .map(|b| b.expanded_km(SOURCE_BBOX_EXPAND_KM));
                match route_bbox {
                    Some(bbox) => {
                        pollution_grid::hazard_cell_in_window(
                            pool,
                            max_ts - Duration::hours(1),
                            max_ts,
                            &bbox,
                        )
                        .await?
                    }
                    None => None,
                }
            }
            None => None,
        };

        let ctx = DetectionContext {
            current_upes,
            max_upes_along_route: max_upes,
            prev_upes,
            recent_min_upes: recent_min,
            sensitivity_level: user.exposure_sensitivity_level,
            wind_kph,
            wind_degree,
            route_mid: Some((mid_lat, mid_lon)),
            source_point,
        };
        let channels = aeris_core::alerts::enabled_channels(user.notification_preferences.as_ref());

        for alert in detect_route_alerts(&ctx, &thresholds) {
            // At most one deterioration alert per route per hour.
            if alert.alert_type == AlertType::RouteDeterioration
                && alert_log::exists_since(pool, route.id, alert.alert_type, dedup_cutoff).await?
            {
                continue;
            }
            let alert_id =
                alert_log::insert(pool, user.id, Some(route.id), &alert, &channels).await?;
            alert_count += 1;
            batch.push(WebhookAlert {
                alert_id,
                user_id: user.id,
                route_id: route.id,
                alert_type: alert.alert_type,
                message: alert_message(alert.alert_type, alert.score_before, alert.score_after),
                score_before: alert.score_before,
                score_after: alert.score_after,
                channels: channels.clone(),
            });
        }
    }

    if let Some(url) = &state.config.alerts_n8n_webhook_url {
        dispatch(&state.http, url, &batch).await;
    }

    info!("Alert pipeline: {} alerts logged", alert_count);
    Ok(TaskOutcome::Completed { count: alert_count })
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
