//! Build a pollution-weighted road graph from an OSM network and the
//! current UPES raster.

use aeris_core::modes::{edge_speed_kph, mode_modifier, EdgeTags};
use aeris_core::spatial::haversine_distance;
use aeris_core::{RoadEdge, RoadGraph, TravelMode};

use crate::raster::{mean_upes_or_fallback, Raster, SAMPLE_STEP_M};

use super::osm::{OsmWay, RoadNetwork};

/// Minimum speed floor for travel-time estimates.
const MIN_SPEED_KPH: f64 = 5.0;

fn edge_tags(way: &OsmWay) -> EdgeTags {
    // A semicolon-joined highway tag keeps its first element.
    let highway = way
        .tags
        .get("highway")
        .map(|h| h.split(';').next().unwrap_or(h).trim().to_string());
    EdgeTags {
        highway,
        leisure: way.tags.get("leisure").cloned(),
        access: way.tags.get("access").cloned(),
        maxspeed: way.tags.get("maxspeed").cloned(),
        has_cycleway: way.tags.contains_key("cycleway")
            || way.tags.contains_key("cycleway:left")
            || way.tags.contains_key("cycleway:right"),
    }
}

enum Direction {
    Both,
    Forward,
    Backward,
}

fn way_direction(way: &OsmWay) -> Direction {
    match way.tags.get("oneway").map(|v| v.as_str()) {
        Some("yes") | Some("true") | Some("1") => Direction::Forward,
        Some("-1") | Some("reverse") => Direction::Backward,
        _ => Direction::Both,
    }
}

/// Per-way-segment directed edges with UPES-aware weights:
/// `weight = modifier * (alpha*mean_upes + beta*distance_km + gamma*time_h)`.
pub fn build_weighted_graph(
    network: &RoadNetwork,
    mode: TravelMode,
    raster: Option<&Raster>,
) -> RoadGraph {
    let (alpha, beta, gamma) = mode.weights();
    let mut graph = RoadGraph::new();

    for way in &network.ways {
        let tags = edge_tags(way);
        let speed_kph = edge_speed_kph(&tags).max(MIN_SPEED_KPH);
        let modifier = mode_modifier(&tags, mode);
        let direction = way_direction(way);

        for pair in way.node_ids.windows(2) {
            let (Some(a), Some(b)) = (network.nodes.get(&pair[0]), network.nodes.get(&pair[1]))
            else {
                continue;
            };
            let length_m = haversine_distance(a.lat, a.lon, b.lat, b.lon);
            if length_m <= 0.0 {
                continue;
            }
            let geometry = vec![(a.lon, a.lat), (b.lon, b.lat)];
            let mean_upes = mean_upes_or_fallback(raster, &geometry, SAMPLE_STEP_M);
            let distance_km = length_m / 1000.0;
            let time_h = distance_km / speed_kph;
            let weight = modifier * (alpha * mean_upes + beta * distance_km + gamma * time_h);

            let from = graph.add_node(a.id, a.lon, a.lat);
            let to = graph.add_node(b.id, b.lon, b.lat);

            let forward = RoadEdge {
                from,
                to,
                length_m,
                speed_kph,
                time_h,
                mean_upes,
                modifier,
                weight,
                geometry: geometry.clone(),
            };
            match direction {
                Direction::Forward => {
                    graph.add_edge(forward);
                }
                Direction::Backward => {
                    graph.add_edge(RoadEdge {
                        from: to,
                        to: from,
                        geometry: vec![geometry[1], geometry[0]],
                        ..forward
                    });
                }
                Direction::Both => {
                    let reverse = RoadEdge {
                        from: to,
                        to: from,
                        geometry: vec![geometry[1], geometry[0]],
                        ..forward.clone()
                    };
                    graph.add_edge(forward);
                    graph.add_edge(reverse);
                }
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::osm::parse_overpass;
    use aeris_core::GridSpec;
    use serde_json::json;

    fn two_path_network() -> RoadNetwork {
        // Two parallel north-south paths between shared endpoints at
        // lat 34.00 and 34.02: one via lon -118.20, one via -118.21.
        parse_overpass(&json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 34.00, "lon": -118.205},
                {"type": "node", "id": 2, "lat": 34.01, "lon": -118.20},
                {"type": "node", "id": 3, "lat": 34.01, "lon": -118.21},
                {"type": "node", "id": 4, "lat": 34.02, "lon": -118.205},
                {"type": "way", "id": 100, "nodes": [1, 2, 4],
                 "tags": {"highway": "residential"}},
                {"type": "way", "id": 101, "nodes": [1, 3, 4],
                 "tags": {"highway": "residential"}}
            ]
        }))
    }

    #[test]
    fn test_bidirectional_edges_by_default() {
        let network = two_path_network();
        let graph = build_weighted_graph(&network, TravelMode::Commute, None);
        assert_eq!(graph.node_count(), 4);
        // 4 segments, each in both directions.
        assert_eq!(graph.edge_count(), 8);
    }

    #[test]
    fn test_oneway_single_direction() {
        let network = parse_overpass(&json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 34.00, "lon": -118.20},
                {"type": "node", "id": 2, "lat": 34.01, "lon": -118.20},
                {"type": "way", "id": 100, "nodes": [1, 2],
                 "tags": {"highway": "primary", "oneway": "yes"}}
            ]
        }));
        let graph = build_weighted_graph(&network, TravelMode::Commute, None);
        assert_eq!(graph.edge_count(), 1);
        let a = graph.nearest_node(-118.20, 34.00).unwrap();
        let b = graph.nearest_node(-118.20, 34.01).unwrap();
        assert!(graph.edge_between(a, b).is_some());
        assert!(graph.edge_between(b, a).is_none());
    }

    #[test]
    fn test_fallback_exposure_without_raster() {
        let network = two_path_network();
        let graph = build_weighted_graph(&network, TravelMode::Commute, None);
        for i in 0..graph.edge_count() {
            assert_eq!(graph.edge(i).mean_upes, 0.5);
        }
    }

    #[test]
    fn test_raster_drives_path_choice() {
        // Polluted column over lon -118.20, clean over -118.21.
        let spec = GridSpec::from_bbox(-118.2175, 33.9875, -118.1925, 34.0325, 0.005);
        let mut values = vec![0.0; spec.len()];
        for row in 0..spec.ny {
            for col in 0..spec.nx {
                let (lon, _) = spec.cell_center(row, col);
                if lon > -118.2025 {
                    values[spec.flat_index(row, col)] = 0.95;
                }
            }
        }
        let raster = Raster::from_grid(&spec, &values);

        let network = two_path_network();
        // Jogger weights exposure heavily: the clean western detour wins.
        let graph = build_weighted_graph(&network, TravelMode::Jogger, Some(&raster));
        let src = graph.nearest_node(-118.205, 34.00).unwrap();
        let dst = graph.nearest_node(-118.205, 34.02).unwrap();
        let path = graph.shortest_path(src, dst).unwrap();
        let summary = graph.route_summary(&path);
        let via_clean = summary.nodes.contains(&3);
        assert!(via_clean, "expected clean path through node 3, got {:?}", summary.nodes);
    }

    #[test]
    fn test_highway_list_uses_first_element() {
        let network = parse_overpass(&json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 34.00, "lon": -118.20},
                {"type": "node", "id": 2, "lat": 34.01, "lon": -118.20},
                {"type": "way", "id": 100, "nodes": [1, 2],
                 "tags": {"highway": "motorway;residential"}}
            ]
        }));
        let graph = build_weighted_graph(&network, TravelMode::Commute, None);
        assert_eq!(graph.edge(0).speed_kph, 100.0);
    }
}
