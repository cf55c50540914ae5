//! API Request Handlers

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::pipeline::{error_response, run_paid};
use super::types::*;
use crate::core::payment::{PaymentGate, PaymentRequirement, TokenValidator, UnverifiedJwtValidator};
use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::ResponseCode;
use crate::providers::Providers;
use crate::scanners::{ScanCaches, Scanners};
use crate::utils::cache::CacheStats;
use crate::utils::constants::*;
use crate::utils::metrics::{MetricsCollector, MetricsSnapshot};

/// Shared application state
pub struct AppState {
    pub config: ServiceConfig,
    pub gate: PaymentGate,
    /// Immutable requirement per paid route, built once
    pub requirements: HashMap<&'static str, PaymentRequirement>,
    pub caches: ScanCaches,
    pub scanners: Scanners,
    pub metrics: Arc<MetricsCollector>,
    pub start_time: Instant,
}

impl AppState {
    /// State with the decode-only token validator
    pub fn new(config: ServiceConfig, providers: &Providers) -> Self {
        Self::with_validator(config, providers, Arc::new(UnverifiedJwtValidator))
    }

    pub fn with_validator(
        config: ServiceConfig,
        providers: &Providers,
        validator: Arc<dyn TokenValidator>,
    ) -> Self {
        let caches = ScanCaches::new(&config);
        let scanners = Scanners::new(providers, &caches, config.upstream.timeout);
        let requirements = config.payment.all_requirements().into_iter().collect();

        if !config.payment.enforce_expiry {
            warn!("⚠️ Payment tokens are decoded, not verified, and expiry is not enforced");
        }

        Self {
            gate: PaymentGate::new(validator, config.payment.enforce_expiry),
            metrics: Arc::new(MetricsCollector::new(config.latency_window)),
            requirements,
            caches,
            scanners,
            config,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Map a body decode failure to `BAD_INPUT`
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(req)| req)
        .map_err(|rejection| AppError::invalid_json(format!("Invalid JSON: {}", rejection.body_text())))
}

// ============================================
// Free routes
// ============================================

pub async fn root() -> Json<ServiceInfo> {
    let free = [
        ("/", "Service info"),
        ("/health", "Liveness check"),
        ("/.well-known/x402", "Payment requirements for every paid route"),
        ("/stats", "Traffic, revenue and cache statistics"),
    ];

    let mut endpoints: Vec<EndpointInfo> = free
        .iter()
        .map(|&(path, description)| EndpointInfo {
            path,
            method: "GET",
            price: None,
            description,
        })
        .collect();
    endpoints.extend(ROUTE_PRICES.iter().map(|r| EndpointInfo {
        path: r.path,
        method: route_method(r.path),
        price: Some(r.price),
        description: r.description,
    }));

    Json(ServiceInfo {
        service: APP_NAME,
        version: APP_VERSION,
        description: "Pay-per-call security analysis API for autonomous agents",
        protocol: X402_VERSION,
        endpoints,
    })
}

/// Market data routes are GET, analysis routes are POST
pub fn route_method(path: &str) -> &'static str {
    match path {
        ROUTE_GAS | ROUTE_VALIDATORS | ROUTE_ETH_PRICE => "GET",
        _ => "POST",
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthData> {
    Json(HealthData {
        status: "healthy",
        version: APP_VERSION,
        uptime_seconds: state.uptime_seconds(),
    })
}

pub async fn well_known_x402(State(state): State<Arc<AppState>>) -> Json<X402Discovery> {
    let payment_requirements = ROUTE_PRICES
        .iter()
        .filter_map(|r| {
            state.requirements.get(r.path).map(|req| AdvertisedRequirement {
                resource: r.path,
                method: route_method(r.path),
                requirement: req.clone(),
            })
        })
        .collect();

    Json(X402Discovery {
        version: X402_CONFIG_VERSION,
        payment_requirements,
    })
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub metrics: MetricsSnapshot,
    pub caches: Vec<CacheStats>,
    pub expiry_enforced: bool,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsData> {
    Json(StatsData {
        metrics: state.metrics.snapshot(),
        caches: vec![state.caches.contract.stats(), state.caches.token.stats()],
        expiry_enforced: state.gate.enforces_expiry(),
    })
}

/// Known route, wrong method
pub async fn method_not_allowed(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let start = Instant::now();
    let err = AppError::method_not_allowed(method.as_str());
    let response = error_response(&err);
    state
        .metrics
        .record_request(uri.path(), &ResponseCode::MethodNotAllowed.status_class());
    state.metrics.record_duration(uri.path(), start.elapsed());
    response
}

/// Prometheus text exposition (served on the metrics listener)
pub async fn metrics(State(metrics): State<Arc<MetricsCollector>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

// ============================================
// Paid routes: market data
// ============================================

pub async fn gas(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let oracle = state.scanners.gas.clone();
    run_paid(&state, ROUTE_GAS, &headers, Ok(()), oracle).await
}

pub async fn validators(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let monitor = state.scanners.validators.clone();
    run_paid(&state, ROUTE_VALIDATORS, &headers, Ok(()), monitor).await
}

pub async fn eth_price(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let feed = state.scanners.eth_price.clone();
    run_paid(&state, ROUTE_ETH_PRICE, &headers, Ok(()), feed).await
}

// ============================================
// Paid routes: analysis
// ============================================

pub async fn scan_contract(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.contract_input());
    let scanner = state.scanners.contract.clone();
    run_paid(&state, ROUTE_SCAN_CONTRACT, &headers, input, scanner).await
}

pub async fn scan_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.token_input());
    let scanner = state.scanners.token.clone();
    run_paid(&state, ROUTE_SCAN_TOKEN, &headers, input, scanner).await
}

pub async fn scan_wallet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.wallet_input());
    let scanner = state.scanners.wallet.clone();
    run_paid(&state, ROUTE_SCAN_WALLET, &headers, input, scanner).await
}

pub async fn address_labels(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.label_input());
    let labeler = state.scanners.labels.clone();
    run_paid(&state, ROUTE_ADDRESS_LABELS, &headers, input, labeler).await
}

pub async fn mev_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<TxRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.mev_input());
    let checker = state.scanners.mev.clone();
    run_paid(&state, ROUTE_MEV_CHECK, &headers, input, checker).await
}

pub async fn tx_preflight(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<TxRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.preflight_input());
    let preflight = state.scanners.preflight.clone();
    run_paid(&state, ROUTE_TX_PREFLIGHT, &headers, input, preflight).await
}

pub async fn prompt_test(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.input());
    let guard = state.scanners.prompt.clone();
    run_paid(&state, ROUTE_PROMPT_TEST, &headers, input, guard).await
}

pub async fn agent_score(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> Response {
    let input = parse_body(body).and_then(|req| req.input());
    let scorer = state.scanners.agent.clone();
    run_paid(&state, ROUTE_AGENT_SCORE, &headers, input, scorer).await
}
