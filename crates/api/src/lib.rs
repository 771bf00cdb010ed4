//! HTTP API server with observability for the checkout engine.
//!
//! Exposes the checkout and order lifecycle endpoints with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{CheckoutService, OrderLifecycleService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CheckoutStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::checkout::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CheckoutStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/checkout/create-checkout",
            post(routes::checkout::create::<S>),
        )
        .route("/checkout/get-orders", get(routes::checkout::get_orders::<S>))
        .route(
            "/checkout/cancel-order/{order_id}/{item_id}",
            patch(routes::checkout::cancel_order::<S>),
        )
        .route(
            "/checkout/return-product/{order_id}/{item_id}",
            patch(routes::checkout::return_product::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store.
pub fn create_default_state<S: CheckoutStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        checkout: CheckoutService::new(store.clone()),
        lifecycle: OrderLifecycleService::new(store),
    })
}
