//! Harmony (OGC API - Coverages) HTTP client.
//!
//! Handles the three response shapes of the rangeset endpoint: a
//! synchronous binary body, a redirect or jobID pointing at an async job
//! to poll, and the "no matching granules" 400 that means an empty hour.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use aeris_core::spatial::BoundingBox;
use aeris_core::GasType;

use crate::collections::{collection_id, variable_path};

pub const HARMONY_BASE_URL: &str = "https://harmony.earthdata.nasa.gov";
pub const URS_TOKEN_URL: &str = "https://urs.earthdata.nasa.gov/api/users/token";
pub const URS_TOKENS_URL: &str = "https://urs.earthdata.nasa.gov/api/users/tokens";

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_DEADLINE: Duration = Duration::from_secs(600);
const MAX_ATTEMPTS: u32 = 5;

/// Backoff delay for a retryable failure: exponential from 1s, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let secs = (1u64 << attempt.min(10)).min(30);
    Duration::from_secs(secs)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// A 400 whose body indicates the subset matched no granules is an empty
/// result, not an error.
fn is_no_granules_body(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("no matching granules")
        || (lower.contains("granule") && lower.contains("no") && lower.contains("found"))
}

#[derive(Debug, Clone, Default)]
pub struct HarmonyCredentials {
    pub bearer_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// HTTP client for the Harmony coverages API.
pub struct HarmonyClient {
    http: Client,
    base_url: String,
    token_url: String,
    tokens_url: String,
    credentials: HarmonyCredentials,
    /// Token obtained from the identity service, cached for the process
    /// lifetime.
    cached_token: Mutex<Option<String>>,
}

impl HarmonyClient {
    pub fn new(credentials: HarmonyCredentials) -> Self {
        Self::with_urls(
            credentials,
            HARMONY_BASE_URL.to_string(),
            URS_TOKEN_URL.to_string(),
            URS_TOKENS_URL.to_string(),
        )
    }

    pub fn with_urls(
        credentials: HarmonyCredentials,
        base_url: String,
        token_url: String,
        tokens_url: String,
    ) -> Self {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            base_url,
            token_url,
            tokens_url,
            credentials,
            cached_token: Mutex::new(None),
        }
    }

    /// Rangeset URL for one gas over a bbox and half-open time window.
    pub fn rangeset_url(
        &self,
        gas: GasType,
        bbox: &BoundingBox,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        let st = start.format("%Y-%m-%dT%H:%M:%S.000Z");
        let et = end.format("%Y-%m-%dT%H:%M:%S.000Z");
        format!(
            "{}/{}/ogc-api-coverages/1.0.0/collections/{}/coverage/rangeset\
             ?subset=lon({}:{})&subset=lat({}:{})&subset=time(\"{}\":\"{}\")&format=image/tiff",
            self.base_url,
            collection_id(gas),
            variable_path(gas),
            bbox.west,
            bbox.east,
            bbox.south,
            bbox.north,
            st,
            et,
        )
    }

    /// Resolve a bearer token: configured token first, then the cached
    /// identity-service token, then a basic-auth token request.
    pub async fn bearer_token(&self) -> Result<String> {
        if let Some(token) = &self.credentials.bearer_token {
            return Ok(token.clone());
        }
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let (Some(username), Some(password)) =
            (&self.credentials.username, &self.credentials.password)
        else {
            bail!("no bearer token and no Earthdata credentials configured");
        };
        let basic = STANDARD.encode(format!("{}:{}", username, password));
        let auth = format!("Basic {}", basic);

        // Existing tokens first, then mint a new one.
        let listed = self
            .http
            .get(&self.tokens_url)
            .header("Authorization", &auth)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await;
        if let Ok(response) = listed {
            if response.status().is_success() {
                if let Ok(Value::Array(tokens)) = response.json::<Value>().await {
                    if let Some(token) = tokens
                        .first()
                        .and_then(|t| t.get("access_token"))
                        .and_then(|t| t.as_str())
                    {
                        *cached = Some(token.to_string());
                        return Ok(token.to_string());
                    }
                }
            }
        }

        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", &auth)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .context("Earthdata token request failed")?;
        if !response.status().is_success() {
            bail!("Earthdata token request failed: {}", response.status());
        }
        let body: Value = response
            .json()
            .await
            .context("Earthdata token response was not JSON")?;
        let token = body
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("Earthdata token response missing access_token"))?
            .to_string();
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn get_with_retry(
        &self,
        url: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            let result = self
                .http
                .get(url)
                .header("Authorization", format!("Bearer {}", token))
                .timeout(timeout)
                .send()
                .await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if is_retryable(status) && attempt + 1 < MAX_ATTEMPTS {
                        let delay = backoff_delay(attempt);
                        warn!("Harmony HTTP {}, retry in {:?}", status, delay);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if attempt + 1 >= MAX_ATTEMPTS {
                        return Err(error).context(format!("request failed for {url}"));
                    }
                    let delay = backoff_delay(attempt);
                    warn!("Harmony request error ({error}), retry in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Fetch the coverage for one gas/bbox/hour. `Ok(None)` means the
    /// provider had no granules for the window.
    pub async fn fetch_coverage(
        &self,
        gas: GasType,
        bbox: &BoundingBox,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Vec<u8>>> {
        let token = self.bearer_token().await?;
        let url = self.rangeset_url(gas, bbox, start, end);
        info!("Submitting Harmony request for {}", gas.as_str());

        let response = self.get_with_retry(&url, &token, SUBMIT_TIMEOUT).await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get("Location")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| anyhow!("Harmony redirect without Location header"))?;
            let job_url = if location.starts_with("http") {
                location.to_string()
            } else {
                format!("{}/{}", self.base_url, location.trim_start_matches('/'))
            };
            return self.wait_and_download(&job_url, &token).await.map(Some);
        }

        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if is_no_granules_body(&body) {
                info!("Harmony: no granules for {} in window", gas.as_str());
                return Ok(None);
            }
            let snippet: String = body.chars().take(500).collect();
            bail!("Harmony rejected request: {}", snippet);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!("Harmony auth failure: {}", status);
        }

        if !status.is_success() {
            bail!("Harmony request failed: {}", status);
        }

        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("application/json") {
            let body: Value = response
                .json()
                .await
                .context("Harmony JSON response unreadable")?;
            if let Some(job_id) = body.get("jobID").and_then(|v| v.as_str()) {
                let job_url = format!("{}/jobs/{}", self.base_url, job_id);
                return self.wait_and_download(&job_url, &token).await.map(Some);
            }
            if let Some(href) = first_data_link(&body) {
                return self.download(&href, &token).await.map(Some);
            }
            bail!("Harmony JSON response had neither jobID nor data links");
        }

        // Synchronous binary body.
        let bytes = response
            .bytes()
            .await
            .context("failed to read Harmony coverage body")?;
        Ok(Some(bytes.to_vec()))
    }

    /// Poll a job URL until it reaches a terminal status, then download
    /// the first data link.
    async fn wait_and_download(&self, job_url: &str, token: &str) -> Result<Vec<u8>> {
        let started = tokio::time::Instant::now();
        loop {
            if started.elapsed() > POLL_DEADLINE {
                bail!("Harmony job did not complete within {:?}", POLL_DEADLINE);
            }
            let response = self.get_with_retry(job_url, token, SUBMIT_TIMEOUT).await?;
            if !response.status().is_success() {
                bail!("Harmony job poll failed: {}", response.status());
            }
            let body: Value = response
                .json()
                .await
                .context("Harmony job status was not JSON")?;
            let status = body
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_lowercase();
            let progress = body.get("progress").and_then(|v| v.as_i64()).unwrap_or(0);
            info!("Harmony job status={} progress={}", status, progress);

            match status.as_str() {
                "successful" | "complete" => {
                    let href = first_data_link(&body)
                        .ok_or_else(|| anyhow!("Harmony job response missing data links"))?;
                    return self.download(&href, token).await;
                }
                "failed" | "canceled" | "error" => {
                    let message = body
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown");
                    bail!("Harmony job {}: {}", status, message);
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn download(&self, url: &str, token: &str) -> Result<Vec<u8>> {
        let response = self.get_with_retry(url, token, DOWNLOAD_TIMEOUT).await?;
        if !response.status().is_success() {
            bail!("Harmony download failed: {}", response.status());
        }
        let bytes = response
            .bytes()
            .await
            .context("failed to read Harmony download body")?;
        Ok(bytes.to_vec())
    }
}

fn first_data_link(body: &Value) -> Option<String> {
    body.get("links")?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(|r| r.as_str()) == Some("data"))
        .and_then(|link| link.get("href"))
        .and_then(|href| href.as_str())
        .map(|s| s.to_string())
}
