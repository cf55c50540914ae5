//! API Route Configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::logging_middleware;
use crate::utils::constants::*;
use crate::utils::metrics::MetricsCollector;

/// Create the API router with all routes and middleware
///
/// Every known path answers a wrong method with a JSON 405; unknown paths
/// fall through to axum's plain 404.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_concurrent = state.config.max_concurrent_requests;

    Router::new()
        // Discovery (free)
        .route("/", get(handlers::root).fallback(handlers::method_not_allowed))
        .route("/health", get(handlers::health_check).fallback(handlers::method_not_allowed))
        .route(
            "/.well-known/x402",
            get(handlers::well_known_x402).fallback(handlers::method_not_allowed),
        )
        .route("/stats", get(handlers::get_stats).fallback(handlers::method_not_allowed))
        // Market data (paid)
        .route(ROUTE_GAS, get(handlers::gas).fallback(handlers::method_not_allowed))
        .route(
            ROUTE_VALIDATORS,
            get(handlers::validators).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_ETH_PRICE,
            get(handlers::eth_price).fallback(handlers::method_not_allowed),
        )
        // Analysis (paid)
        .route(
            ROUTE_SCAN_CONTRACT,
            post(handlers::scan_contract).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_SCAN_TOKEN,
            post(handlers::scan_token).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_SCAN_WALLET,
            post(handlers::scan_wallet).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_ADDRESS_LABELS,
            post(handlers::address_labels).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_MEV_CHECK,
            post(handlers::mev_check).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_TX_PREFLIGHT,
            post(handlers::tx_preflight).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_PROMPT_TEST,
            post(handlers::prompt_test).fallback(handlers::method_not_allowed),
        )
        .route(
            ROUTE_AGENT_SCORE,
            post(handlers::agent_score).fallback(handlers::method_not_allowed),
        )
        .with_state(state)
        // Middleware (order matters - bottom runs first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
}

/// Prometheus scrape endpoint, bound on its own port
pub fn create_metrics_router(metrics: Arc<MetricsCollector>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(metrics)
}
