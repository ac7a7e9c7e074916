//! AERIS Core - Pure domain logic for pollution exposure scoring,
//! routing and alerting.
//!
//! This crate contains the shared models and business rules with
//! NO networking or storage dependencies.

pub mod alerts;
pub mod gases;
pub mod graph;
pub mod grid;
pub mod models;
pub mod modes;
pub mod scoring;
pub mod sensitivity;
pub mod spatial;

pub use alerts::{AlertType, DetectionContext, DetectionThresholds, TriggeredAlert};
pub use gases::{classify_pollution_level, GasType, ALL_GASES};
pub use graph::{RoadEdge, RoadGraph, RoadNode, RouteSummary};
pub use grid::GridSpec;
pub use models::{AlertLogEntry, CellBounds, ExposureSample, GridRow, NetcdfFile, SavedRoute, User};
pub use modes::{EdgeTags, TravelMode};
