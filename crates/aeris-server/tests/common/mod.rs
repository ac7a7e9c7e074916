//! Shared fixtures for integration tests.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use aeris_core::spatial::BoundingBox;
use aeris_core::{classify_pollution_level, CellBounds, GasType, GridRow};
use aeris_server::cache::Cache;
use aeris_server::config::Config;
use aeris_server::persistence::init_database;
use aeris_server::state::AppState;

/// Config pointed at in-memory infrastructure and a temp output dir.
pub fn test_config(output_base: &Path) -> Config {
    Config {
        server_port: 0,
        database_url: "sqlite::memory:".to_string(),
        redis_url: None,
        secret_key: "test-secret".to_string(),
        access_token_expire_minutes: 60,
        object_storage_provider: None,
        object_storage_endpoint_url: None,
        object_storage_bucket: "aeris-netcdf".to_string(),
        aws_region: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        bearer_token: None,
        earthdata_username: None,
        earthdata_password: None,
        tempo_bbox: BoundingBox::new(-125.0, 24.0, -66.0, 50.0),
        upes_output_base: output_base.to_path_buf(),
        upes_grid_resolution_deg: 0.05,
        upes_bbox: Some(BoundingBox::new(-118.3, 33.9, -118.1, 34.2)),
        upes_traffic_alpha: 0.1,
        upes_ema_lambda: None,
        upes_alert_threshold: 0.5,
        upes_enabled: true,
        route_optimization_enabled: true,
        route_osm_buffer_km: 3.0,
        route_result_cache_ttl: 300,
        alerts_enabled: true,
        alerts_deterioration_base_pct: 0.15,
        alerts_hazard_threshold: 0.85,
        alerts_wind_speed_min_kph: 5.0,
        alerts_wind_angle_deg: 45.0,
        alerts_n8n_webhook_url: None,
        weather_api_key: None,
        weather_base_url: "http://127.0.0.1:9/v1".to_string(),
        overpass_url: "http://127.0.0.1:9/interpreter".to_string(),
        geocode_url: "http://127.0.0.1:9/search".to_string(),
    }
}

pub async fn test_state(config: Config) -> Arc<AppState> {
    let db = init_database(&config.database_url, 1).await.expect("db init");
    AppState::from_parts(config, db, Cache::memory(), None, None)
}

/// One pollution grid cell centered at (lat, lon).
#[allow(dead_code)]
pub fn grid_row(
    ts: DateTime<Utc>,
    gas: GasType,
    lon: f64,
    lat: f64,
    value: f64,
    half_size_deg: f64,
) -> GridRow {
    GridRow {
        timestamp: ts,
        gas_type: gas,
        bounds: CellBounds {
            min_lon: lon - half_size_deg,
            min_lat: lat - half_size_deg,
            max_lon: lon + half_size_deg,
            max_lat: lat + half_size_deg,
        },
        pollution_value: value,
        severity_level: classify_pollution_level(value, gas).1,
    }
}
