//! WeatherAPI client: current conditions, forecast and the next-3-hour
//! pollutant movement prediction.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub text: String,
}

/// Fields consumed from `current.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub humidity: f64,
    pub wind_kph: f64,
    pub wind_degree: f64,
    #[serde(default)]
    pub wind_dir: Option<String>,
    pub condition: Condition,
    #[serde(default)]
    pub vis_km: Option<f64>,
    #[serde(default)]
    pub air_quality: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    location: Value,
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    forecast: Value,
}

pub struct WeatherClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    /// `None` without an API key; weather features degrade to defaults.
    pub fn from_config(base_url: &str, api_key: Option<&str>) -> Option<WeatherClient> {
        let api_key = api_key?.to_string();
        Some(WeatherClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .query(query)
            .timeout(WEATHER_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("weather request failed for {endpoint}"))?;
        if !response.status().is_success() {
            bail!("weather API error: {}", response.status());
        }
        response
            .json()
            .await
            .with_context(|| format!("weather response unreadable for {endpoint}"))
    }

    pub async fn current(&self, lat: f64, lon: f64) -> Result<CurrentConditions> {
        let response: CurrentResponse = self
            .get_json(
                "current.json",
                &[
                    ("key", self.api_key.clone()),
                    ("q", format!("{},{}", lat, lon)),
                    ("aqi", "yes".to_string()),
                ],
            )
            .await?;
        Ok(response.current)
    }

    /// Combined current + forecast bundle served by `/api/weather`.
    pub async fn bundle(&self, lat: f64, lon: f64, days: u32) -> Result<Value> {
        let current: CurrentResponse = self
            .get_json(
                "current.json",
                &[
                    ("key", self.api_key.clone()),
                    ("q", format!("{},{}", lat, lon)),
                    ("aqi", "yes".to_string()),
                ],
            )
            .await?;
        let forecast: ForecastResponse = self
            .get_json(
                "forecast.json",
                &[
                    ("key", self.api_key.clone()),
                    ("q", format!("{},{}", lat, lon)),
                    ("aqi", "yes".to_string()),
                    ("days", days.to_string()),
                ],
            )
            .await?;

        Ok(json!({
            "location": current.location,
            "current": {
                "temp_c": current.current.temp_c,
                "humidity": current.current.humidity,
                "wind_kph": current.current.wind_kph,
                "wind_degree": current.current.wind_degree,
                "wind_dir": current.current.wind_dir,
                "condition": current.current.condition.text,
                "vis_km": current.current.vis_km,
            },
            "air_quality": current.current.air_quality,
            "forecast": { "forecastday": forecast.forecast.get("forecastday") },
        }))
    }

    /// Predict pollutant displacement and concentrations for the next
    /// three forecast hours.
    pub async fn pollutant_movement(&self, lat: f64, lon: f64) -> Result<Value> {
        let bundle = self.bundle(lat, lon, 1).await?;
        let hours = bundle
            .pointer("/forecast/forecastday/0/hour")
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();
        if hours.is_empty() {
            bail!("no forecast data available");
        }
        Ok(json!({
            "location": bundle.get("location"),
            "predictions_next_3h": predict_movement(&hours),
        }))
    }
}

/// Simplified advection model: pollutants ride the wind vector, and
/// humidity speeds up dispersion.
pub fn predict_movement(hourly: &[Value]) -> Vec<Value> {
    let mut predictions = Vec::new();
    for hour in hourly.iter().skip(1).take(3) {
        let wind_kph = hour.get("wind_kph").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let wind_degree = hour.get("wind_degree").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let humidity = hour.get("humidity").and_then(|v| v.as_f64()).unwrap_or(50.0);

        let dx = wind_kph * wind_degree.to_radians().sin();
        let dy = wind_kph * wind_degree.to_radians().cos();
        let dispersion_factor = 1.0 + (humidity / 100.0) * 0.2;

        let mut predicted_air_quality = serde_json::Map::new();
        if let Some(Value::Object(airq)) = hour.get("air_quality") {
            for (pollutant, value) in airq {
                if let Some(value) = value.as_f64() {
                    predicted_air_quality
                        .insert(pollutant.clone(), json!(value / dispersion_factor));
                }
            }
        }

        predictions.push(json!({
            "time": hour.get("time"),
            "wind_kph": wind_kph,
            "wind_dir_deg": wind_degree,
            "displacement_km": {
                "dx": (dx * 100.0).round() / 100.0,
                "dy": (dy * 100.0).round() / 100.0,
            },
            "predicted_air_quality": predicted_air_quality,
        }));
    }
    predictions
}
