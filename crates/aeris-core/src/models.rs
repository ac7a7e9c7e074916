//! Shared data models for the AERIS backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertType;
use crate::gases::GasType;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Channel name -> enabled, over {email, push, in_app}.
    pub notification_preferences: Option<serde_json::Value>,
    /// 1..=5; higher means more sensitive to exposure.
    pub exposure_sensitivity_level: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-saved origin/destination pair scored by the alert pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRoute {
    pub id: i64,
    pub user_id: i64,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub activity_type: Option<String>,
    pub last_upes_score: Option<f64>,
    pub last_upes_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SavedRoute {
    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.origin_lat + self.dest_lat) / 2.0,
            (self.origin_lon + self.dest_lon) / 2.0,
        )
    }

    /// Straight origin -> destination polyline as (lon, lat) pairs.
    pub fn line_coords(&self) -> Vec<(f64, f64)> {
        vec![
            (self.origin_lon, self.origin_lat),
            (self.dest_lon, self.dest_lat),
        ]
    }
}

/// Envelope of one pollution grid cell, axis-aligned in WGS84.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl CellBounds {
    /// Closed 5-point WKT polygon ring for this box.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({} {}, {} {}, {} {}, {} {}, {} {}))",
            self.min_lon, self.min_lat,
            self.max_lon, self.min_lat,
            self.max_lon, self.max_lat,
            self.min_lon, self.max_lat,
            self.min_lon, self.min_lat,
        )
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

/// One pollution grid row produced by the raster normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRow {
    pub timestamp: DateTime<Utc>,
    pub gas_type: GasType,
    pub bounds: CellBounds,
    pub pollution_value: f64,
    pub severity_level: i64,
}

/// Metadata row indexing a raster blob held in object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetcdfFile {
    pub id: i64,
    pub file_name: String,
    pub bucket_path: String,
    pub timestamp: DateTime<Utc>,
    pub gas_type: GasType,
    pub created_at: DateTime<Utc>,
}

/// Immutable exposure log entry for one saved route at one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureSample {
    pub id: i64,
    pub route_id: i64,
    pub timestamp: DateTime<Utc>,
    pub upes_score: f64,
    pub max_upes_along_route: Option<f64>,
    pub score_source: String,
}

/// Persisted alert, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub alert_type: AlertType,
    pub score_before: Option<f64>,
    pub score_after: Option<f64>,
    pub threshold: Option<f64>,
    pub alert_metadata: serde_json::Value,
    pub notified_channels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wkt_ring_is_closed() {
        let bounds = CellBounds {
            min_lon: -118.25,
            min_lat: 34.0,
            max_lon: -118.2,
            max_lat: 34.05,
        };
        let wkt = bounds.to_wkt();
        assert!(wkt.starts_with("POLYGON(("));
        assert_eq!(wkt.matches(',').count(), 4);
        let interior = wkt.trim_start_matches("POLYGON((").trim_end_matches("))");
        let points: Vec<&str> = interior.split(", ").collect();
        assert_eq!(points.len(), 5);
        assert_eq!(points.first(), points.last());
    }

    #[test]
    fn test_route_midpoint() {
        let route = SavedRoute {
            id: 1,
            user_id: 1,
            origin_lat: 34.0,
            origin_lon: -118.2,
            dest_lat: 34.1,
            dest_lon: -118.1,
            activity_type: None,
            last_upes_score: None,
            last_upes_updated_at: None,
            created_at: Utc::now(),
        };
        let (lat, lon) = route.midpoint();
        assert!((lat - 34.05).abs() < 1e-12);
        assert!((lon + 118.15).abs() < 1e-12);
    }
}
