//! Shared application state injected into handlers and scheduled tasks.

use std::sync::Arc;

use anyhow::Result;

use aeris_harmony::{HarmonyClient, HarmonyCredentials};

use crate::cache::Cache;
use crate::config::Config;
use crate::geocode::GeocodeClient;
use crate::persistence::{init_database, Database};
use crate::storage::ObjectStorage;
use crate::weather::WeatherClient;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub cache: Cache,
    pub http: reqwest::Client,
    pub harmony: HarmonyClient,
    pub storage: Option<ObjectStorage>,
    pub weather: Option<WeatherClient>,
    pub geocoder: GeocodeClient,
}

impl AppState {
    /// Wire up every dependency from configuration.
    pub async fn initialize(config: Config) -> Result<Arc<AppState>> {
        let db = init_database(&config.database_url, 5).await?;
        let cache = Cache::from_config(config.redis_url.as_deref());
        let storage = ObjectStorage::from_config(&config).await;
        let weather =
            WeatherClient::from_config(&config.weather_base_url, config.weather_api_key.as_deref());
        let geocoder = GeocodeClient::new(&config.geocode_url);
        let harmony = HarmonyClient::new(HarmonyCredentials {
            bearer_token: config.bearer_token.clone(),
            username: config.earthdata_username.clone(),
            password: config.earthdata_password.clone(),
        });

        Ok(Arc::new(AppState {
            config,
            db,
            cache,
            http: reqwest::Client::new(),
            harmony,
            storage,
            weather,
            geocoder,
        }))
    }

    /// Assemble a state from parts; used by integration tests to swap in
    /// in-memory databases and caches.
    pub fn from_parts(
        config: Config,
        db: Database,
        cache: Cache,
        storage: Option<ObjectStorage>,
        weather: Option<WeatherClient>,
    ) -> Arc<AppState> {
        let geocoder = GeocodeClient::new(&config.geocode_url);
        let harmony = HarmonyClient::new(HarmonyCredentials {
            bearer_token: config.bearer_token.clone(),
            username: config.earthdata_username.clone(),
            password: config.earthdata_password.clone(),
        });
        Arc::new(AppState {
            config,
            db,
            cache,
            http: reqwest::Client::new(),
            harmony,
            storage,
            weather,
            geocoder,
        })
    }
}
