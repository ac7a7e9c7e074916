//! Pipeline integration tests: ingestion data -> UPES artifacts ->
//! saved-route scoring -> alert detection and webhook delivery.

mod common;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use aeris_core::GasType;
use aeris_server::alerts::{compute_saved_route_upes_scores, run_alert_pipeline, TaskOutcome};
use aeris_server::persistence::{
    alert_log, exposure_history, pollution_grid, saved_routes, users,
};
use aeris_server::raster::read_raster;
use aeris_server::upes::outputs::{final_path, satellite_path};
use aeris_server::upes::{compute_upes_hourly, hour_slot, UpesOutcome};

use common::{grid_row, test_config, test_state};

#[tokio::test]
async fn test_upes_run_writes_hourly_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(dir.path())).await;
    let pool = state.db.pool();

    // Two NO2 cells: hazardous at 34.0, clean at 34.1.
    let ts = Utc::now();
    let rows = vec![
        grid_row(ts, GasType::No2, -118.2, 34.0, 3.0e16, 0.025),
        grid_row(ts, GasType::No2, -118.2, 34.1, 1.0e15, 0.025),
    ];
    pollution_grid::insert_chunk(pool, &rows).await.unwrap();

    let outcome = compute_upes_hourly(&state).await.unwrap();
    let summary = match outcome {
        UpesOutcome::Completed(summary) => summary,
        other => panic!("expected completed UPES run, got {other:?}"),
    };
    assert_eq!(summary.hdf, 1.0);
    assert_eq!(summary.wtf, 1.0);
    assert_eq!(summary.tf, 1.0);
    assert_eq!(summary.cells, 2);

    // Invariant: satellite + final rasters and the log share the slot.
    let slot = hour_slot(ts - Duration::hours(1));
    assert_eq!(summary.slot, slot);
    let base = &state.config.upes_output_base;
    assert!(satellite_path(base, &slot).exists());
    assert!(final_path(base, &slot).exists());
    assert!(base.join("logs").join(format!("upes_{slot}.json")).exists());

    // The hazardous cell normalizes near 1, the clean one to 0.
    let raster = read_raster(&final_path(base, &slot)).unwrap();
    let high = raster.sample(-118.2, 34.0).unwrap();
    let low = raster.sample(-118.2, 34.1).unwrap();
    assert!(high > 0.95, "hazardous cell should be ~1.0, got {high}");
    assert!(low < 0.05, "clean cell should be ~0.0, got {low}");
}

#[tokio::test]
async fn test_no_raster_skips_route_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(dir.path())).await;
    let pool = state.db.pool();

    let user = users::create_user(pool, "nr@example.com", "h").await.unwrap().unwrap();
    let route = saved_routes::create(pool, user.id, 34.0, -118.2, 34.1, -118.2, None)
        .await
        .unwrap();

    let outcome = compute_saved_route_upes_scores(&state).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Skipped("no_raster"));
    assert_eq!(exposure_history::count_for_route(pool, route.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_route_scoring_records_history_and_denormalizes() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(dir.path())).await;
    let pool = state.db.pool();

    let ts = Utc::now();
    let rows = vec![
        grid_row(ts, GasType::No2, -118.2, 34.0, 3.0e16, 0.025),
        grid_row(ts, GasType::No2, -118.2, 34.1, 1.0e15, 0.025),
    ];
    pollution_grid::insert_chunk(pool, &rows).await.unwrap();
    compute_upes_hourly(&state).await.unwrap();

    let user = users::create_user(pool, "rs@example.com", "h").await.unwrap().unwrap();
    let route = saved_routes::create(pool, user.id, 34.0, -118.2, 34.1, -118.2, None)
        .await
        .unwrap();

    let outcome = compute_saved_route_upes_scores(&state).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Completed { count: 1 });

    let history = exposure_history::latest(pool, route.id, 2).await.unwrap();
    assert_eq!(history.len(), 1);
    let reloaded = saved_routes::get_for_user(pool, route.id, user.id)
        .await
        .unwrap()
        .unwrap();
    // Denormalized score matches the newest history row.
    assert_eq!(reloaded.last_upes_score, Some(history[0].upes_score));
    assert!(reloaded.last_upes_updated_at.unwrap() >= history[0].timestamp);
    // The route crosses the hazardous cell, so the max is high.
    assert!(history[0].max_upes_along_route.unwrap() > 0.9);
}

#[tokio::test]
async fn test_deterioration_sensitivity_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(dir.path())).await;
    let pool = state.db.pool();

    // (email, level, prev, curr, expect_alert). A +33% jump trips every
    // level; +10% sits between the level-5 threshold (7.5%) and the
    // level-1 threshold (15%).
    let cases = [
        ("l1@example.com", 1, 0.30, 0.40, true),
        ("l5@example.com", 5, 0.30, 0.40, true),
        ("l1b@example.com", 1, 0.40, 0.44, false),
        ("l5b@example.com", 5, 0.40, 0.44, true),
    ];
    let now = Utc::now();
    for (email, level, prev, curr, _) in cases {
        let user = users::create_user(pool, email, "h").await.unwrap().unwrap();
        users::update_profile(pool, user.id, None, Some(level)).await.unwrap();
        let route = saved_routes::create(pool, user.id, 34.0, -118.2, 34.01, -118.2, None)
            .await
            .unwrap();
        exposure_history::insert(pool, route.id, now - Duration::hours(1), prev, Some(prev), "upes")
            .await
            .unwrap();
        exposure_history::insert(pool, route.id, now, curr, Some(curr), "upes")
            .await
            .unwrap();
        saved_routes::update_exposure(pool, route.id, curr, now).await.unwrap();
    }

    run_alert_pipeline(&state).await.unwrap();

    let since = now - Duration::hours(2);
    for (email, _, prev, curr, expect_alert) in cases {
        let user = users::find_by_email(pool, email).await.unwrap().unwrap();
        let alerts = alert_log::list_for_user(
            pool,
            user.id,
            None,
            Some(aeris_core::AlertType::RouteDeterioration),
            since,
        )
        .await
        .unwrap();
        if expect_alert {
            assert_eq!(alerts.len(), 1, "expected deterioration alert for {email}");
            assert_eq!(alerts[0].score_before, Some(prev));
            assert_eq!(alerts[0].score_after, Some(curr));
        } else {
            assert!(alerts.is_empty(), "unexpected alert for {email}");
        }
    }

    // Level 1 at +33%: threshold is the unscaled base percentage.
    let user = users::find_by_email(pool, "l1@example.com").await.unwrap().unwrap();
    let alerts = alert_log::list_for_user(pool, user.id, None, None, since).await.unwrap();
    assert!((alerts[0].threshold.unwrap() - 0.15).abs() < 1e-9);

    // Rerunning within the hour does not duplicate deterioration alerts.
    run_alert_pipeline(&state).await.unwrap();
    let again = alert_log::list_for_user(pool, user.id, None, None, since).await.unwrap();
    assert_eq!(again.len(), alerts.len());
}

/// In-process webhook receiver capturing the posted JSON body.
async fn spawn_webhook_receiver() -> (String, Arc<Mutex<Option<Value>>>) {
    let received: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let sink = received.clone();
    let app = Router::new()
        .route(
            "/hook",
            post(|State(sink): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                *sink.lock().await = Some(body);
                "ok"
            }),
        )
        .with_state(sink);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

#[tokio::test]
async fn test_hazard_alert_posts_webhook_with_channels() {
    let dir = tempfile::tempdir().unwrap();
    let (webhook_url, received) = spawn_webhook_receiver().await;
    let mut config = test_config(dir.path());
    config.alerts_n8n_webhook_url = Some(webhook_url);
    let state = test_state(config).await;
    let pool = state.db.pool();

    let user = users::create_user(pool, "hz@example.com", "h").await.unwrap().unwrap();
    let prefs = serde_json::json!({"email": true, "in_app": true, "push": false});
    users::update_profile(pool, user.id, Some(&prefs), Some(1)).await.unwrap();
    let route = saved_routes::create(pool, user.id, 34.0, -118.2, 34.01, -118.2, None)
        .await
        .unwrap();

    let now = Utc::now();
    exposure_history::insert(pool, route.id, now, 0.5, Some(0.9), "upes")
        .await
        .unwrap();
    saved_routes::update_exposure(pool, route.id, 0.5, now).await.unwrap();

    let outcome = run_alert_pipeline(&state).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Completed { count: 1 });

    // Give the receiver a beat to process the request.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let body = received.lock().await.clone().expect("webhook not called");
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_type"], "hazard");
    let mut channels: Vec<String> = alerts[0]["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_string())
        .collect();
    channels.sort();
    assert_eq!(channels, vec!["email", "in_app"]);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_webhook_failure_does_not_fail_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    // Nothing listens here; the POST fails and is swallowed.
    config.alerts_n8n_webhook_url = Some("http://127.0.0.1:9/hook".to_string());
    let state = test_state(config).await;
    let pool = state.db.pool();

    let user = users::create_user(pool, "wf@example.com", "h").await.unwrap().unwrap();
    let route = saved_routes::create(pool, user.id, 34.0, -118.2, 34.01, -118.2, None)
        .await
        .unwrap();
    let now = Utc::now();
    exposure_history::insert(pool, route.id, now, 0.5, Some(0.95), "upes")
        .await
        .unwrap();
    saved_routes::update_exposure(pool, route.id, 0.5, now).await.unwrap();

    let outcome = run_alert_pipeline(&state).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Completed { count: 1 });
    // The alert row is still persisted.
    let alerts = alert_log::list_for_user(pool, user.id, None, None, now - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
}
