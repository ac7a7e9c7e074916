//! REST API routes.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

use super::{alert_handlers, analyze, auth_handlers, route_handlers, saved_routes, upes_handlers, weather_handlers};

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/me", get(auth_handlers::me).patch(auth_handlers::patch_me))
        .route("/api/analyze", post(analyze::analyze))
        .route("/api/hotspots", get(analyze::hotspots))
        .route("/api/combined_analysis", get(analyze::combined_analysis))
        .route("/api/weather", get(weather_handlers::weather))
        .route("/api/pollutant_movement", get(weather_handlers::pollutant_movement))
        .route("/api/route/analyze", post(route_handlers::analyze))
        .route(
            "/api/route/optimized",
            get(route_handlers::optimized_get).post(route_handlers::optimized_post),
        )
        .route("/api/saved-routes", post(saved_routes::create).get(saved_routes::list))
        .route(
            "/api/saved-routes/:route_id",
            get(saved_routes::get).delete(saved_routes::delete),
        )
        .route("/api/alerts", get(alert_handlers::list))
        .route("/api/upes/latest", get(upes_handlers::latest))
        .route("/api/upes/grid", get(upes_handlers::grid))
        .route("/api/upes/heatmap", get(upes_handlers::heatmap))
}
