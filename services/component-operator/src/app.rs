use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    health_handler, metrics_handler, not_found_handler, ready_handler, root_handler,
};
use crate::metrics::Metrics;

/// Probe and scrape endpoints served next to the controller.
pub fn app(
    cargo_pkg_name: &'static str,
    cargo_pkg_version: &'static str,
    metrics: Arc<Metrics>,
) -> Router {
    let name = cargo_pkg_name;
    let version = cargo_pkg_version;

    Router::new()
        .route(
            "/",
            get(move |connect_info| root_handler(name, version, connect_info)),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}
