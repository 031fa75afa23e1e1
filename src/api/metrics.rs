//! `GET /metrics` for Prometheus scrapes
//!
//! Serves the login, session and provider-latency instruments from
//! [`crate::metrics`]. Mounted outside the session layer: scrapers carry no
//! cookie.

use axum::{
    Router,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, Registry, TextEncoder};

use crate::error::AppError;
use crate::metrics::REGISTRY;

fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

async fn scrape() -> Result<Response, AppError> {
    let body = render(&REGISTRY)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode metrics: {e}")))?;

    Ok((
        [(header::CONTENT_TYPE, TextEncoder::new().format_type())],
        body,
    )
        .into_response())
}

/// Router exposing `/metrics`; state-agnostic so it merges after `with_state`
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(scrape))
}
