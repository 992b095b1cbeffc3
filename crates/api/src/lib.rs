//! HTTP API server for the bookstore cart and checkout.
//!
//! Provides REST endpoints for cart management, checkout and transaction
//! lookup, with bearer-token authentication, structured logging (tracing)
//! and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, patch, post};
use checkout::{CartService, CheckoutOrchestrator, PaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtKeys;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub cart: CartService<S>,
    pub checkout: CheckoutOrchestrator<S>,
    pub jwt: JwtKeys,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::list::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{id}",
            patch(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/checkout", post(routes::checkout::create::<S>))
        .route("/transactions/{id}", get(routes::transactions::get::<S>))
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

/// Creates the application state over a store and payment gateway.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    jwt_secret: &str,
    gateway_timeout: Duration,
) -> Arc<AppState<S>> {
    let cart = CartService::new(store.clone());
    let checkout = CheckoutOrchestrator::new(store, gateway).with_gateway_timeout(gateway_timeout);

    Arc::new(AppState {
        cart,
        checkout,
        jwt: JwtKeys::new(jwt_secret),
    })
}
