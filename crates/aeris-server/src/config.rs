//! Server configuration from environment.

use std::path::PathBuf;

use aeris_core::spatial::BoundingBox;

// Default CONUS-style bbox (TEMPO coverage); override via TEMPO_BBOX_*.
const DEFAULT_WEST: f64 = -125.0;
const DEFAULT_SOUTH: f64 = 24.0;
const DEFAULT_EAST: f64 = -66.0;
const DEFAULT_NORTH: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,

    pub secret_key: String,
    pub access_token_expire_minutes: i64,

    pub object_storage_provider: Option<String>,
    pub object_storage_endpoint_url: Option<String>,
    pub object_storage_bucket: String,
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,

    pub bearer_token: Option<String>,
    pub earthdata_username: Option<String>,
    pub earthdata_password: Option<String>,
    pub tempo_bbox: BoundingBox,

    pub upes_output_base: PathBuf,
    pub upes_grid_resolution_deg: f64,
    pub upes_bbox: Option<BoundingBox>,
    pub upes_traffic_alpha: f64,
    pub upes_ema_lambda: Option<f64>,
    pub upes_alert_threshold: f64,
    pub upes_enabled: bool,

    pub route_optimization_enabled: bool,
    pub route_osm_buffer_km: f64,
    pub route_result_cache_ttl: u64,

    pub alerts_enabled: bool,
    pub alerts_deterioration_base_pct: f64,
    pub alerts_hazard_threshold: f64,
    pub alerts_wind_speed_min_kph: f64,
    pub alerts_wind_angle_deg: f64,
    pub alerts_n8n_webhook_url: Option<String>,

    pub weather_api_key: Option<String>,
    pub weather_base_url: String,
    pub overpass_url: String,
    pub geocode_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_parse("AERIS_PORT", 8000),
            database_url: env_string("DATABASE_URL", "data/aeris.db"),
            redis_url: env_opt("REDIS_URL"),

            secret_key: env_string("SECRET_KEY", "change-me-in-production"),
            access_token_expire_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 60 * 24),

            object_storage_provider: env_opt("OBJECT_STORAGE_PROVIDER"),
            object_storage_endpoint_url: env_opt("OBJECT_STORAGE_ENDPOINT_URL"),
            object_storage_bucket: env_string("OBJECT_STORAGE_BUCKET", "aeris-netcdf"),
            aws_region: env_opt("AWS_REGION"),
            aws_access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),

            bearer_token: env_opt("BEARER_TOKEN"),
            earthdata_username: env_opt("EARTHDATA_USERNAME"),
            earthdata_password: env_opt("EARTHDATA_PASSWORD"),
            tempo_bbox: BoundingBox::new(
                env_parse("TEMPO_BBOX_WEST", DEFAULT_WEST),
                env_parse("TEMPO_BBOX_SOUTH", DEFAULT_SOUTH),
                env_parse("TEMPO_BBOX_EAST", DEFAULT_EAST),
                env_parse("TEMPO_BBOX_NORTH", DEFAULT_NORTH),
            ),

            upes_output_base: PathBuf::from(env_string("UPES_OUTPUT_BASE", "outputs")),
            upes_grid_resolution_deg: env_parse("UPES_GRID_RESOLUTION_DEG", 0.05),
            upes_bbox: upes_bbox_from_env(),
            upes_traffic_alpha: env_parse("UPES_TRAFFIC_ALPHA", 0.1),
            upes_ema_lambda: env_lambda("UPES_EMA_LAMBDA", Some(0.6)),
            upes_alert_threshold: env_parse("UPES_ALERT_THRESHOLD", 0.5),
            upes_enabled: env_parse("UPES_ENABLED", true),

            route_optimization_enabled: env_parse("ROUTE_OPTIMIZATION_ENABLED", true),
            route_osm_buffer_km: env_parse("ROUTE_OSM_BUFFER_KM", 3.0),
            route_result_cache_ttl: env_parse("ROUTE_RESULT_CACHE_TTL", 300),

            alerts_enabled: env_parse("ALERTS_ENABLED", true),
            alerts_deterioration_base_pct: env_parse("ALERTS_DETERIORATION_BASE_PCT", 0.15),
            alerts_hazard_threshold: env_parse("ALERTS_HAZARD_THRESHOLD", 0.85),
            alerts_wind_speed_min_kph: env_parse("ALERTS_WIND_SPEED_MIN_KPH", 5.0),
            alerts_wind_angle_deg: env_parse("ALERTS_WIND_ANGLE_DEG", 45.0),
            alerts_n8n_webhook_url: env_opt("ALERTS_N8N_WEBHOOK_URL"),

            weather_api_key: env_opt("WEATHER_API_KEY"),
            weather_base_url: env_string("WEATHER_API_BASE_URL", "http://api.weatherapi.com/v1"),
            overpass_url: env_string("OVERPASS_URL", "https://overpass-api.de/api/interpreter"),
            geocode_url: env_string("GEOCODE_URL", "https://nominatim.openstreetmap.org/search"),
        }
    }

    /// UPES grid bbox: explicit override or the ingestion bbox.
    pub fn upes_bbox_effective(&self) -> BoundingBox {
        self.upes_bbox.unwrap_or(self.tempo_bbox)
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// EMA lambda: unset keeps the default, an empty/"none"/"off" value or
/// anything outside (0, 1] disables smoothing.
fn env_lambda(name: &str, default: Option<f64>) -> Option<f64> {
    match std::env::var(name) {
        Err(_) => default,
        Ok(raw) => {
            let text = raw.trim().to_lowercase();
            if text.is_empty() || text == "none" || text == "off" {
                return None;
            }
            text.parse::<f64>().ok().filter(|l| *l > 0.0 && *l <= 1.0)
        }
    }
}

fn upes_bbox_from_env() -> Option<BoundingBox> {
    let west = env_opt("UPES_BBOX_WEST")?.parse().ok()?;
    let south = env_opt("UPES_BBOX_SOUTH")?.parse().ok()?;
    let east = env_opt("UPES_BBOX_EAST")?.parse().ok()?;
    let north = env_opt("UPES_BBOX_NORTH")?.parse().ok()?;
    Some(BoundingBox::new(west, south, east, north))
}
