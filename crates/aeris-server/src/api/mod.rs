//! HTTP surface for the AERIS backend.

pub mod alert_handlers;
pub mod analyze;
pub mod auth;
pub mod auth_handlers;
pub mod error;
pub mod route_handlers;
mod routes;
pub mod saved_routes;
pub mod upes_handlers;
pub mod weather_handlers;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
