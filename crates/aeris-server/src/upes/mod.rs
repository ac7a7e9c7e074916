//! UPES engine: aggregation, hourly computation and output artifacts.

pub mod aggregate;
pub mod compute;
pub mod heatmap;
pub mod outputs;

pub use compute::{compute_upes_hourly, UpesOutcome, UpesRunSummary};
pub use outputs::{hour_slot, latest_final_raster, latest_log, UpesLog};
