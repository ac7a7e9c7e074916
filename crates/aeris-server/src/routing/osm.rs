//! Road network fetch from an Overpass-style endpoint.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::Value;

use aeris_core::spatial::BoundingBox;

const OVERPASS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct OsmNode {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone)]
pub struct OsmWay {
    pub id: i64,
    pub node_ids: Vec<i64>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    pub nodes: HashMap<i64, OsmNode>,
    pub ways: Vec<OsmWay>,
}

impl RoadNetwork {
    pub fn is_empty(&self) -> bool {
        self.ways.is_empty()
    }
}

/// Every highway-tagged way in the bbox, with its member nodes.
pub async fn fetch_road_network(
    http: &Client,
    overpass_url: &str,
    bbox: &BoundingBox,
) -> Result<RoadNetwork> {
    let query = format!(
        "[out:json][timeout:60];way[\"highway\"]({},{},{},{});(._;>;);out body;",
        bbox.south, bbox.west, bbox.north, bbox.east
    );
    let response = http
        .post(overpass_url)
        .form(&[("data", query)])
        .timeout(OVERPASS_TIMEOUT)
        .send()
        .await
        .context("Overpass request failed")?;
    if !response.status().is_success() {
        bail!("Overpass error: {}", response.status());
    }
    let body: Value = response.json().await.context("Overpass response unreadable")?;
    Ok(parse_overpass(&body))
}

/// Parse an Overpass `out:json` payload into nodes and ways.
pub fn parse_overpass(body: &Value) -> RoadNetwork {
    let mut network = RoadNetwork::default();
    let Some(elements) = body.get("elements").and_then(|e| e.as_array()) else {
        return network;
    };
    for element in elements {
        match element.get("type").and_then(|t| t.as_str()) {
            Some("node") => {
                let (Some(id), Some(lon), Some(lat)) = (
                    element.get("id").and_then(|v| v.as_i64()),
                    element.get("lon").and_then(|v| v.as_f64()),
                    element.get("lat").and_then(|v| v.as_f64()),
                ) else {
                    continue;
                };
                network.nodes.insert(id, OsmNode { id, lon, lat });
            }
            Some("way") => {
                let Some(id) = element.get("id").and_then(|v| v.as_i64()) else {
                    continue;
                };
                let node_ids: Vec<i64> = element
                    .get("nodes")
                    .and_then(|n| n.as_array())
                    .map(|nodes| nodes.iter().filter_map(|n| n.as_i64()).collect())
                    .unwrap_or_default();
                if node_ids.len() < 2 {
                    continue;
                }
                let tags: HashMap<String, String> = element
                    .get("tags")
                    .and_then(|t| t.as_object())
                    .map(|tags| {
                        tags.iter()
                            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();
                if !tags.contains_key("highway") {
                    continue;
                }
                network.ways.push(OsmWay { id, node_ids, tags });
            }
            _ => {}
        }
    }
    network
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_payload() -> Value {
        json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 34.0, "lon": -118.2},
                {"type": "node", "id": 2, "lat": 34.01, "lon": -118.2},
                {"type": "node", "id": 3, "lat": 34.02, "lon": -118.2},
                {"type": "way", "id": 10, "nodes": [1, 2, 3],
                 "tags": {"highway": "residential", "name": "A St"}},
                {"type": "way", "id": 11, "nodes": [1, 3],
                 "tags": {"highway": "footway"}},
                {"type": "way", "id": 12, "nodes": [2],
                 "tags": {"highway": "residential"}},
                {"type": "way", "id": 13, "nodes": [1, 2],
                 "tags": {"building": "yes"}}
            ]
        })
    }

    #[test]
    fn test_parse_overpass_elements() {
        let network = parse_overpass(&sample_payload());
        assert_eq!(network.nodes.len(), 3);
        // Degenerate and non-highway ways are dropped.
        assert_eq!(network.ways.len(), 2);
        assert_eq!(network.ways[0].node_ids, vec![1, 2, 3]);
        assert_eq!(network.ways[0].tags.get("highway").unwrap(), "residential");
    }

    #[test]
    fn test_parse_empty_payload() {
        assert!(parse_overpass(&json!({})).is_empty());
        assert!(parse_overpass(&json!({"elements": []})).is_empty());
    }
}
