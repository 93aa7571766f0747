//! HTTP surface: `GET /metrics` runs a scrape cycle and returns the
//! rendered registry.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::{error, info};

use crate::error::{MetricError, Result};
use crate::scrape::Scraper;

/// Path of the scrape endpoint
pub const METRICS_PATH: &str = "/metrics";

/// Create the router serving the scrape endpoint
pub fn create_router(scraper: Arc<Scraper>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(handle_metrics))
        .with_state(scraper)
}

async fn handle_metrics(State(scraper): State<Arc<Scraper>>) -> Response {
    info!("Updating metrics");
    match scraper.scrape_and_render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Cannot render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Bind `addr` and serve until the server fails
pub async fn serve(addr: SocketAddr, scraper: Arc<Scraper>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MetricError::Other(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Listening on {}", addr);
    axum::serve(listener, create_router(scraper))
        .await
        .map_err(|e| MetricError::Other(format!("HTTP server error: {}", e)))
}
