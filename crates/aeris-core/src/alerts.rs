//! Alert detection rules for saved routes: deterioration, hazard,
//! wind shift and time-based checks.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::sensitivity::sensitivity_scale;
use crate::spatial::{angle_diff_deg, bearing_deg};

const DETERIORATION_EPSILON: f64 = 1e-6;
/// Margin over the 24h minimum for the time-based check.
pub const TIME_BASED_MARGIN: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    RouteDeterioration,
    Hazard,
    WindShift,
    TimeBased,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::RouteDeterioration => "route_deterioration",
            AlertType::Hazard => "hazard",
            AlertType::WindShift => "wind_shift",
            AlertType::TimeBased => "time_based",
        }
    }

    pub fn parse(s: &str) -> Option<AlertType> {
        match s {
            "route_deterioration" => Some(AlertType::RouteDeterioration),
            "hazard" => Some(AlertType::Hazard),
            "wind_shift" => Some(AlertType::WindShift),
            "time_based" => Some(AlertType::TimeBased),
            _ => None,
        }
    }
}

/// One triggered check, ready to be persisted and dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct TriggeredAlert {
    pub alert_type: AlertType,
    pub score_before: Option<f64>,
    pub score_after: Option<f64>,
    pub threshold: Option<f64>,
    pub metadata: serde_json::Value,
}

/// Route deterioration: relative increase against the previous score,
/// thresholded by the user's sensitivity-scaled base percentage.
pub fn check_route_deterioration(
    prev_score: f64,
    curr_score: f64,
    sensitivity_level: Option<i64>,
    base_pct: f64,
) -> Option<TriggeredAlert> {
    if !prev_score.is_finite() || !curr_score.is_finite() {
        return None;
    }
    let effective_pct = base_pct * sensitivity_scale(sensitivity_level);
    let delta_pct = (curr_score - prev_score) / prev_score.max(DETERIORATION_EPSILON);
    if delta_pct >= effective_pct {
        Some(TriggeredAlert {
            alert_type: AlertType::RouteDeterioration,
            score_before: Some(prev_score),
            score_after: Some(curr_score),
            threshold: Some(effective_pct),
            metadata: json!({ "delta_pct": (delta_pct * 10_000.0).round() / 10_000.0 }),
        })
    } else {
        None
    }
}

/// Hazard: the worst cell along the route crosses the critical threshold.
pub fn check_hazard(max_upes_along_route: f64, critical_threshold: f64) -> Option<TriggeredAlert> {
    if max_upes_along_route >= critical_threshold {
        Some(TriggeredAlert {
            alert_type: AlertType::Hazard,
            score_before: None,
            score_after: Some(max_upes_along_route),
            threshold: Some(critical_threshold),
            metadata: json!({}),
        })
    } else {
        None
    }
}

/// Wind shift: wind fast enough and pointing from a pollution source
/// toward the route midpoint within the configured angular window.
#[allow(clippy::too_many_arguments)]
pub fn check_wind_shift(
    wind_kph: f64,
    wind_degree: f64,
    route_mid_lat: f64,
    route_mid_lon: f64,
    source_lat: f64,
    source_lon: f64,
    min_speed_kph: f64,
    max_angle_deg: f64,
) -> Option<TriggeredAlert> {
    if wind_kph < min_speed_kph {
        return None;
    }
    let bearing_to_route = bearing_deg(source_lat, source_lon, route_mid_lat, route_mid_lon);
    let diff = angle_diff_deg(bearing_to_route, wind_degree);
    if diff <= max_angle_deg {
        Some(TriggeredAlert {
            alert_type: AlertType::WindShift,
            score_before: None,
            score_after: None,
            threshold: Some(max_angle_deg),
            metadata: json!({
                "wind_kph": wind_kph,
                "wind_degree": wind_degree,
                "bearing_source_to_route": (bearing_to_route * 100.0).round() / 100.0,
            }),
        })
    } else {
        None
    }
}

/// Time-based: current exposure exceeds the best recent score by a margin.
pub fn check_time_based(
    current_upes: f64,
    recent_min_upes: Option<f64>,
    margin: f64,
) -> Option<TriggeredAlert> {
    let recent_min = recent_min_upes?;
    if current_upes >= recent_min + margin {
        Some(TriggeredAlert {
            alert_type: AlertType::TimeBased,
            score_before: Some(recent_min),
            score_after: Some(current_upes),
            threshold: Some(margin),
            metadata: json!({ "best_recent_score": recent_min }),
        })
    } else {
        None
    }
}

/// Inputs for one route's detection round; wind and source are optional
/// and gate the wind-shift check.
#[derive(Debug, Clone, Default)]
pub struct DetectionContext {
    pub current_upes: f64,
    pub max_upes_along_route: f64,
    pub prev_upes: Option<f64>,
    pub recent_min_upes: Option<f64>,
    pub sensitivity_level: Option<i64>,
    pub wind_kph: Option<f64>,
    pub wind_degree: Option<f64>,
    pub route_mid: Option<(f64, f64)>,
    pub source_point: Option<(f64, f64)>,
}

/// Thresholds shared by every route in one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct DetectionThresholds {
    pub deterioration_base_pct: f64,
    pub hazard_threshold: f64,
    pub wind_speed_min_kph: f64,
    pub wind_angle_deg: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            deterioration_base_pct: 0.15,
            hazard_threshold: 0.85,
            wind_speed_min_kph: 5.0,
            wind_angle_deg: 45.0,
        }
    }
}

/// Run all four checks for one route.
pub fn detect_route_alerts(
    ctx: &DetectionContext,
    thresholds: &DetectionThresholds,
) -> Vec<TriggeredAlert> {
    let mut alerts = Vec::new();

    if let Some(prev) = ctx.prev_upes {
        if let Some(alert) = check_route_deterioration(
            prev,
            ctx.current_upes,
            ctx.sensitivity_level,
            thresholds.deterioration_base_pct,
        ) {
            alerts.push(alert);
        }
    }

    if let Some(alert) = check_hazard(ctx.max_upes_along_route, thresholds.hazard_threshold) {
        alerts.push(alert);
    }

    if let (Some(wind_kph), Some(wind_degree), Some((mid_lat, mid_lon)), Some((src_lat, src_lon))) =
        (ctx.wind_kph, ctx.wind_degree, ctx.route_mid, ctx.source_point)
    {
        if let Some(alert) = check_wind_shift(
            wind_kph,
            wind_degree,
            mid_lat,
            mid_lon,
            src_lat,
            src_lon,
            thresholds.wind_speed_min_kph,
            thresholds.wind_angle_deg,
        ) {
            alerts.push(alert);
        }
    }

    if let Some(alert) = check_time_based(ctx.current_upes, ctx.recent_min_upes, TIME_BASED_MARGIN) {
        alerts.push(alert);
    }

    alerts
}

/// Channels actually targeted for a user, from the notification
/// preferences map filtered to enabled entries. Missing or empty
/// preferences default to in-app only.
pub fn enabled_channels(preferences: Option<&serde_json::Value>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(serde_json::Value::Object(map)) = preferences {
        for channel in ["email", "push", "in_app"] {
            if map.get(channel).and_then(|v| v.as_bool()).unwrap_or(false) {
                out.push(channel.to_string());
            }
        }
    }
    if out.is_empty() {
        out.push("in_app".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deterioration_triggers_at_scaled_threshold() {
        // +33% against a 15% base threshold, level 1 (scale 1.0).
        let alert = check_route_deterioration(0.30, 0.40, Some(1), 0.15).unwrap();
        assert_eq!(alert.alert_type, AlertType::RouteDeterioration);
        assert_eq!(alert.score_before, Some(0.30));
        assert_eq!(alert.score_after, Some(0.40));
        assert!((alert.threshold.unwrap() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_deterioration_sensitivity_matrix() {
        // Level 5 tightens the threshold to 0.075: still triggers at +33%.
        assert!(check_route_deterioration(0.30, 0.40, Some(5), 0.15).is_some());
        // +5%: level 1 stays quiet, level 5 triggers.
        assert!(check_route_deterioration(0.40, 0.42, Some(1), 0.15).is_none());
        assert!(check_route_deterioration(0.40, 0.42, Some(5), 0.15).is_some());
    }

    #[test]
    fn test_hazard_threshold_boundary() {
        assert!(check_hazard(0.85, 0.85).is_some());
        assert!(check_hazard(0.84, 0.85).is_none());
    }

    #[test]
    fn test_wind_shift_requires_speed() {
        // Wind below minimum never triggers regardless of alignment.
        let alert = check_wind_shift(3.0, 0.0, 1.0, 0.0, 0.0, 0.0, 5.0, 45.0);
        assert!(alert.is_none());
    }

    #[test]
    fn test_wind_shift_alignment() {
        // Source due south of the route midpoint: bearing is ~0 (north).
        let aligned = check_wind_shift(10.0, 10.0, 1.0, 0.0, 0.0, 0.0, 5.0, 45.0);
        assert!(aligned.is_some());
        let crosswind = check_wind_shift(10.0, 120.0, 1.0, 0.0, 0.0, 0.0, 5.0, 45.0);
        assert!(crosswind.is_none());
    }

    #[test]
    fn test_time_based_margin() {
        assert!(check_time_based(0.50, Some(0.30), 0.15).is_some());
        assert!(check_time_based(0.40, Some(0.30), 0.15).is_none());
        assert!(check_time_based(0.90, None, 0.15).is_none());
    }

    #[test]
    fn test_detect_route_alerts_composition() {
        let ctx = DetectionContext {
            current_upes: 0.40,
            max_upes_along_route: 0.90,
            prev_upes: Some(0.30),
            recent_min_upes: Some(0.10),
            sensitivity_level: Some(1),
            ..Default::default()
        };
        let alerts = detect_route_alerts(&ctx, &DetectionThresholds::default());
        let types: Vec<&str> = alerts.iter().map(|a| a.alert_type.as_str()).collect();
        assert_eq!(types, vec!["route_deterioration", "hazard", "time_based"]);
    }

    #[test]
    fn test_enabled_channels_filtering() {
        let prefs = json!({"email": true, "in_app": true, "push": false});
        assert_eq!(enabled_channels(Some(&prefs)), vec!["email", "in_app"]);
        assert_eq!(enabled_channels(None), vec!["in_app"]);
        let all_off = json!({"email": false, "push": false, "in_app": false});
        assert_eq!(enabled_channels(Some(&all_off)), vec!["in_app"]);
    }
}
