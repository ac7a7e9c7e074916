//! Pollution-optimized route computation: cached, graph-built off the
//! request context, Dijkstra or k-shortest under mode-dependent cost.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use aeris_core::spatial::BoundingBox;
use aeris_core::{RouteSummary, TravelMode};

use crate::cache::key_route_optimized;
use crate::raster::read_raster;
use crate::routing::builder::build_weighted_graph;
use crate::routing::osm::fetch_road_network;
use crate::state::AppState;
use crate::upes::latest_final_raster;

pub const MAX_ALTERNATIVES: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteQuery {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub alternatives: u32,
}

fn default_mode() -> String {
    "commute".to_string()
}

impl RouteQuery {
    /// Reject malformed coordinates or an out-of-range alternative count.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("start_lat", self.start_lat), ("end_lat", self.end_lat)] {
            if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
                return Err(format!("{name} out of range"));
            }
        }
        for (name, value) in [("start_lon", self.start_lon), ("end_lon", self.end_lon)] {
            if !value.is_finite() || !(-180.0..=180.0).contains(&value) {
                return Err(format!("{name} out of range"));
            }
        }
        if self.alternatives > MAX_ALTERNATIVES {
            return Err(format!("alternatives must be 0..={MAX_ALTERNATIVES}"));
        }
        Ok(())
    }
}

fn summary_to_json(summary: &RouteSummary) -> Value {
    let coordinates: Vec<Value> = summary
        .geometry
        .iter()
        .map(|(lon, lat)| json!([lon, lat]))
        .collect();
    json!({
        "nodes": summary.nodes,
        "geometry": { "type": "LineString", "coordinates": coordinates },
        "exposure": round(summary.exposure, 6),
        "distance_km": round(summary.distance_km, 4),
        "time_min": round(summary.time_min, 2),
        "cost": round(summary.cost, 6),
    })
}

fn round(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Compute up to `alternatives + 1` routes, consulting the result cache
/// first. Graph construction and pathfinding run on a blocking thread.
pub async fn optimized_routes(state: &AppState, query: &RouteQuery) -> Result<Value> {
    let mode = TravelMode::parse(&query.mode);
    let cache_key = key_route_optimized(
        query.start_lat,
        query.start_lon,
        query.end_lat,
        query.end_lon,
        &query.mode,
    );
    if let Some(cached) = state.cache.get_json::<Value>(&cache_key).await {
        return Ok(cached);
    }

    let bbox = BoundingBox::new(
        query.start_lon.min(query.end_lon),
        query.start_lat.min(query.end_lat),
        query.start_lon.max(query.end_lon),
        query.start_lat.max(query.end_lat),
    )
    .expanded_km(state.config.route_osm_buffer_km);

    let network = fetch_road_network(&state.http, &state.config.overpass_url, &bbox)
        .await
        .context("road network fetch failed")?;
    if network.is_empty() {
        return Ok(json!({ "routes": [] }));
    }

    let raster = latest_final_raster(&state.config.upes_output_base)
        .and_then(|path| read_raster(&path).ok());

    let (start_lat, start_lon) = (query.start_lat, query.start_lon);
    let (end_lat, end_lon) = (query.end_lat, query.end_lon);
    let alternatives = query.alternatives;

    let summaries: Vec<RouteSummary> = tokio::task::spawn_blocking(move || {
        let graph = build_weighted_graph(&network, mode, raster.as_ref());
        let (Some(src), Some(dst)) = (
            graph.nearest_node(start_lon, start_lat),
            graph.nearest_node(end_lon, end_lat),
        ) else {
            return Vec::new();
        };
        let paths = if alternatives == 0 {
            graph.shortest_path(src, dst).map(|p| vec![p]).unwrap_or_default()
        } else {
            graph.k_shortest_paths(src, dst, (alternatives + 1) as usize)
        };
        paths.iter().map(|path| graph.route_summary(path)).collect()
    })
    .await
    .context("route computation task failed")?;

    info!(
        "Route {} -> {} mode={} alternatives={}: {} route(s)",
        format_args!("({:.4},{:.4})", query.start_lat, query.start_lon),
        format_args!("({:.4},{:.4})", query.end_lat, query.end_lon),
        mode.as_str(),
        alternatives,
        summaries.len(),
    );

    let body = json!({ "routes": summaries.iter().map(summary_to_json).collect::<Vec<_>>() });
    state
        .cache
        .set_json(&cache_key, &body, state.config.route_result_cache_ttl)
        .await;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> RouteQuery {
        RouteQuery {
            start_lat: 34.0,
            start_lon: -118.2,
            end_lat: 34.1,
            end_lon: -118.1,
            mode: "commute".to_string(),
            alternatives: 0,
        }
    }

    #[test]
    fn test_validate_bounds() {
        assert!(query().validate().is_ok());

        let mut bad = query();
        bad.start_lat = 95.0;
        assert!(bad.validate().is_err());

        let mut bad = query();
        bad.end_lon = f64::NAN;
        assert!(bad.validate().is_err());

        let mut bad = query();
        bad.alternatives = 11;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_summary_rounding() {
        let summary = RouteSummary {
            nodes: vec![1, 2],
            geometry: vec![(-118.2, 34.0), (-118.1, 34.1)],
            exposure: 0.123456789,
            distance_km: 1.23456789,
            time_min: 12.3456,
            cost: 0.98765432,
        };
        let value = summary_to_json(&summary);
        assert_eq!(value["exposure"], 0.123457);
        assert_eq!(value["distance_km"], 1.2346);
        assert_eq!(value["time_min"], 12.35);
        assert_eq!(value["cost"], 0.987654);
        assert_eq!(value["geometry"]["type"], "LineString");
    }
}
