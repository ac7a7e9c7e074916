//! Forward geocoding via a Nominatim-style search endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeocodeClient {
    http: Client,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Resolve a place name to (lat, lon); `None` when nothing matches.
    pub async fn search(&self, query: &str) -> Result<Option<(f64, f64)>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .header("User-Agent", "aeris/0.1")
            .timeout(GEOCODE_TIMEOUT)
            .send()
            .await
            .context("geocode request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("geocoder error: {}", response.status());
        }
        let body: Value = response.json().await.context("geocode response unreadable")?;
        Ok(parse_first_hit(&body))
    }
}

fn parse_first_hit(body: &Value) -> Option<(f64, f64)> {
    let hit = body.as_array()?.first()?;
    let lat = hit.get("lat")?.as_str()?.parse().ok()?;
    let lon = hit.get("lon")?.as_str()?.parse().ok()?;
    Some((lat, lon))
}
