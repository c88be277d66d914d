//! HTTP API server for the stock movement ledger.
//!
//! Exposes product, stock movement and report endpoints over the inventory
//! coordinator, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use inventory::{CoordinatorConfig, InventoryCoordinator, ProductCatalog, ReportBuilder};
use ledger::InventoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: InventoryStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", axum::routing::post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/stock-movements",
            get(routes::movements::list::<S>).post(routes::movements::create::<S>),
        )
        .route(
            "/stock-movements/{id}",
            get(routes::movements::get::<S>).delete(routes::movements::delete::<S>),
        )
        .route(
            "/reports/stock-movements",
            get(routes::reports::stock_movements::<S>),
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

/// Wires the coordinator, catalog and report builder over one store.
pub fn create_state<S: InventoryStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let coordinator = InventoryCoordinator::with_config(
        store.clone(),
        CoordinatorConfig {
            transaction_timeout: config.transaction_timeout,
        },
    );

    Arc::new(AppState {
        coordinator,
        catalog: ProductCatalog::new(store.clone()),
        reports: ReportBuilder::new(store),
    })
}
