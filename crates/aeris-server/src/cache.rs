//! Key/value cache: Redis when configured, an in-process TTL map for
//! tests, or disabled. Consumers never fail on cache trouble; reads
//! degrade to misses and writes to no-ops.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use aeris_core::TravelMode;

pub const TTL_WEATHER: u64 = 600;
pub const TTL_POLLUTANT_MOVEMENT: u64 = 600;
pub const TTL_LAST_UPDATE: u64 = 3600;

pub const KEY_TEMPO_LAST_UPDATE: &str = "tempo:last_update";
pub const KEY_UPES_LAST_UPDATE: &str = "upes:last_update";

const REDIS_OP_TIMEOUT: Duration = Duration::from_secs(2);

pub fn key_weather(lat: f64, lon: f64, days: u32) -> String {
    format!("weather:{}:{}:{}", lat, lon, days)
}

pub fn key_pollutant_movement(lat: f64, lon: f64) -> String {
    format!("pollutant_movement:{}:{}", lat, lon)
}

/// Cache key for an optimized route result. The mode is canonicalized so
/// aliases and stray whitespace map to the same key.
pub fn key_route_optimized(
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
    mode: &str,
) -> String {
    let mode = TravelMode::parse(mode).as_str();
    format!(
        "route_opt:{}:{}:{}:{}:{}",
        start_lat, start_lon, end_lat, end_lon, mode
    )
}

pub enum Cache {
    Redis(redis::Client),
    Memory(MemoryCache),
    Disabled,
}

pub struct MemoryCache {
    entries: DashMap<String, (Instant, String)>,
}

impl MemoryCache {
    fn new() -> Self {
        Self { entries: DashMap::new() }
    }
}

impl Cache {
    /// Redis when a URL is configured and parseable, disabled otherwise.
    pub fn from_config(redis_url: Option<&str>) -> Cache {
        match redis_url {
            Some(url) => match redis::Client::open(url) {
                Ok(client) => Cache::Redis(client),
                Err(error) => {
                    warn!("Invalid REDIS_URL ({error}); cache disabled");
                    Cache::Disabled
                }
            },
            None => Cache::Disabled,
        }
    }

    /// In-process TTL cache, used by tests and single-node setups.
    pub fn memory() -> Cache {
        Cache::Memory(MemoryCache::new())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self {
            Cache::Disabled => None,
            Cache::Memory(memory) => {
                let entry = memory.entries.get(key)?;
                let (expires_at, value) = entry.value();
                if *expires_at <= Instant::now() {
                    drop(entry);
                    memory.entries.remove(key);
                    return None;
                }
                Some(value.clone())
            }
            Cache::Redis(client) => {
                let op = async {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    conn.get::<_, Option<String>>(key).await
                };
                match tokio::time::timeout(REDIS_OP_TIMEOUT, op).await {
                    Ok(Ok(value)) => value,
                    Ok(Err(error)) => {
                        debug!("cache get failed for {key}: {error}");
                        None
                    }
                    Err(_) => None,
                }
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        match self {
            Cache::Disabled => {}
            Cache::Memory(memory) => {
                memory.entries.insert(
                    key.to_string(),
                    (Instant::now() + Duration::from_secs(ttl_secs), value.to_string()),
                );
            }
            Cache::Redis(client) => {
                let op = async {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    conn.set_ex::<_, _, ()>(key, value, ttl_secs).await
                };
                match tokio::time::timeout(REDIS_OP_TIMEOUT, op).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => debug!("cache set failed for {key}: {error}"),
                    Err(_) => debug!("cache set timed out for {key}"),
                }
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.set(key, &raw, ttl_secs).await;
        }
    }
}
