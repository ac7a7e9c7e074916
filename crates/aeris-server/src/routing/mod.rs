//! Pollution-aware routing over an OSM road network.

pub mod builder;
pub mod engine;
pub mod osm;

pub use builder::build_weighted_graph;
pub use engine::{optimized_routes, RouteQuery, MAX_ALTERNATIVES};
pub use osm::{fetch_road_network, parse_overpass, RoadNetwork};
