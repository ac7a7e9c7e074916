//! AERIS Server - pollution-aware navigation and alerting backend.

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aeris_server::api;
use aeris_server::config::Config;
use aeris_server::loops;
use aeris_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("aeris_server=debug".parse()?))
        .init();

    tracing::info!("Starting AERIS server...");

    let config = Config::from_env();
    let port = config.server_port;
    let state = AppState::initialize(config).await?;

    // Start scheduled pipeline loops
    loops::spawn_all(state.clone());

    // Build the app
    let app = api::create_router()
        .with_state(state)
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
