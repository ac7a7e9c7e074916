//! Persistence layer: one module per table plus connection management.

pub mod alert_log;
pub mod db;
pub mod exposure_history;
pub mod netcdf_files;
pub mod pollution_grid;
pub mod saved_routes;
pub mod users;

pub use db::{init_database, Database};

use chrono::{DateTime, Utc};

/// Timestamps are stored as RFC3339 text in UTC; the fixed format keeps
/// lexicographic and chronological order aligned.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn decode_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn decode_ts_opt(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(decode_ts)
}
