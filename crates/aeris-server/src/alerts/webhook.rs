//! Outbound webhook delivery for triggered alerts (best-effort).

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use aeris_core::AlertType;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// One alert as shipped to the notification workflow executor.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAlert {
    pub alert_id: i64,
    pub user_id: i64,
    pub route_id: i64,
    pub alert_type: AlertType,
    pub message: String,
    pub score_before: Option<f64>,
    pub score_after: Option<f64>,
    pub channels: Vec<String>,
}

/// Short human-readable message for the notification workflow.
pub fn alert_message(
    alert_type: AlertType,
    score_before: Option<f64>,
    score_after: Option<f64>,
) -> String {
    match alert_type {
        AlertType::RouteDeterioration => format!(
            "Route exposure increased from {:.2} to {:.2}.",
            score_before.unwrap_or(0.0),
            score_after.unwrap_or(0.0),
        ),
        AlertType::Hazard => format!(
            "High pollution (UPES {:.2}) detected along your route.",
            score_after.unwrap_or(0.0),
        ),
        AlertType::WindShift => "Wind may be moving pollution toward your route.".to_string(),
        AlertType::TimeBased => {
            "Recent exposure is higher than your recent best; consider traveling at a different time."
                .to_string()
        }
    }
}

/// POST the batch to the configured webhook. Failure is logged and never
/// affects the pipeline's database writes.
pub async fn dispatch(http: &Client, url: &str, alerts: &[WebhookAlert]) {
    if alerts.is_empty() {
        return;
    }
    let body = json!({
        "alerts": alerts,
        "timestamp": Utc::now().to_rfc3339(),
    });
    match http
        .post(url)
        .json(&body)
        .timeout(WEBHOOK_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_client_error() || response.status().is_server_error() => {
            warn!("Alert webhook POST failed: {}", response.status());
        }
        Ok(_) => {}
        Err(error) => warn!("Alert webhook POST error: {error}"),
    }
}
