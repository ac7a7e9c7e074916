//! Travel modes, multi-objective weights and mode-specific edge modifiers.

use serde::{Deserialize, Serialize};

/// Travel mode of a routed or saved trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Commute,
    Jogger,
    Cyclist,
}

impl TravelMode {
    /// Parse a mode string, accepting aliases. Unknown modes fall back to
    /// commute.
    pub fn parse(s: &str) -> TravelMode {
        match s.trim().to_lowercase().as_str() {
            "commute" | "commuter" => TravelMode::Commute,
            "jogger" | "jog" => TravelMode::Jogger,
            "cyclist" | "cycle" => TravelMode::Cyclist,
            _ => TravelMode::Commute,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Commute => "commute",
            TravelMode::Jogger => "jogger",
            TravelMode::Cyclist => "cyclist",
        }
    }

    /// (alpha, beta, gamma) = (exposure, distance, time) weights; sum = 1.0.
    pub fn weights(&self) -> (f64, f64, f64) {
        match self {
            TravelMode::Commute => (0.2, 0.4, 0.4),
            TravelMode::Jogger => (0.7, 0.15, 0.15),
            TravelMode::Cyclist => (0.4, 0.3, 0.3),
        }
    }
}

/// OSM tags consulted when weighting an edge. `highway` carries the first
/// element when the source tag is a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeTags {
    pub highway: Option<String>,
    pub leisure: Option<String>,
    pub access: Option<String>,
    pub maxspeed: Option<String>,
    pub has_cycleway: bool,
}

/// Multiplier for an edge's cost by mode: > 1 penalty, < 1 bonus.
/// Output always lies in [0.1, 5.0].
pub fn mode_modifier(tags: &EdgeTags, mode: TravelMode) -> f64 {
    let highway = tags.highway.as_deref().unwrap_or("").to_lowercase();
    let leisure = tags.leisure.as_deref().unwrap_or("").to_lowercase();
    let mut score: f64 = 1.0;

    match mode {
        TravelMode::Jogger => {
            if matches!(highway.as_str(), "motorway" | "trunk" | "motorway_link" | "trunk_link") {
                score *= 2.0;
            }
            if leisure == "park" || matches!(highway.as_str(), "path" | "footway" | "pedestrian") {
                score *= 0.5;
            }
        }
        TravelMode::Cyclist => {
            if tags.has_cycleway {
                score *= 0.7;
            }
            if matches!(highway.as_str(), "motorway" | "trunk" | "motorway_link" | "trunk_link") {
                score *= 1.5;
            }
        }
        TravelMode::Commute => {
            // Foot-only ways penalize driving unless explicitly accessible.
            if matches!(highway.as_str(), "footway" | "path" | "pedestrian")
                && tags.access.as_deref() != Some("yes")
            {
                score *= 1.2;
            }
        }
    }
    score.clamp(0.1, 5.0)
}

/// Speed in km/h for an edge: the maxspeed tag when parseable, otherwise
/// a default by highway class.
pub fn edge_speed_kph(tags: &EdgeTags) -> f64 {
    if let Some(raw) = tags.maxspeed.as_deref() {
        if let Some(speed) = parse_maxspeed_kph(raw) {
            return speed;
        }
    }
    let highway = tags.highway.as_deref().unwrap_or("").to_lowercase();
    default_speed_kph(&highway)
}

fn parse_maxspeed_kph(raw: &str) -> Option<f64> {
    let text = raw.trim().to_lowercase();
    let is_mph = text.contains("mph");
    let digits: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.parse().ok()?;
    if value <= 0.0 {
        return None;
    }
    Some(if is_mph { value * 1.60934 } else { value })
}

fn default_speed_kph(highway: &str) -> f64 {
    match highway {
        "motorway" | "motorway_link" => 100.0,
        "trunk" | "trunk_link" => 80.0,
        "primary" | "primary_link" => 60.0,
        "secondary" | "secondary_link" => 50.0,
        "tertiary" | "tertiary_link" => 40.0,
        "residential" | "unclassified" => 30.0,
        "service" => 20.0,
        "path" | "footway" | "pedestrian" | "foot" | "steps" => 5.0,
        _ => 30.0,
    }
}
