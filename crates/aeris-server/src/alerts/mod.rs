//! Alert engine: scheduled exposure scoring, detection pipeline and
//! webhook dispatch.

pub mod pipeline;
pub mod webhook;

pub use pipeline::{compute_saved_route_upes_scores, run_alert_pipeline, TaskOutcome};
pub use webhook::{alert_message, WebhookAlert};
