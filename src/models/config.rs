//! Configuration module for Ruster x402
//!
//! Everything is read from the environment once at startup; defaults live in
//! utils/constants.rs.

use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::payment::PaymentRequirement;
use crate::utils::constants::{
    DEFAULT_ASSET, DEFAULT_BASE_RPC_URL, DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
    DEFAULT_CONTRACT_CACHE_TTL_SECS, DEFAULT_ETH_RPC_URL, DEFAULT_LATENCY_WINDOW,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_NETWORK, DEFAULT_ORCHESTRATOR_DEADLINE_SECS,
    DEFAULT_RECEIVER, DEFAULT_TOKEN_CACHE_TTL_SECS, DEFAULT_UPSTREAM_TIMEOUT_SECS, ROUTE_PRICES,
    X402_SCHEME,
};

/// Payment settlement settings shared by every priced route
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub network: String,
    pub asset: String,
    pub receiver: String,
    /// Reject claims whose `exp` is in the past (off by default)
    pub enforce_expiry: bool,
}

impl PaymentConfig {
    /// Build the immutable requirement for one route
    pub fn requirement(&self, price: &str, description: &str) -> PaymentRequirement {
        PaymentRequirement {
            scheme: X402_SCHEME.to_string(),
            network: self.network.clone(),
            max_amount: price.to_string(),
            min_amount: price.to_string(),
            asset: self.asset.clone(),
            receiver: self.receiver.clone(),
            description: description.to_string(),
        }
    }

    /// Requirements for every paid route, in advertised order
    pub fn all_requirements(&self) -> Vec<(&'static str, PaymentRequirement)> {
        ROUTE_PRICES
            .iter()
            .map(|r| (r.path, self.requirement(r.price, r.description)))
            .collect()
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            asset: DEFAULT_ASSET.to_string(),
            receiver: DEFAULT_RECEIVER.to_string(),
            enforce_expiry: false,
        }
    }
}

/// Upstream endpoints and credentials
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub eth_rpc_url: String,
    pub base_rpc_url: String,
    pub etherscan_api_key: Option<String>,
    pub basescan_api_key: Option<String>,
    /// Bound applied to every single upstream call
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            eth_rpc_url: DEFAULT_ETH_RPC_URL.to_string(),
            base_rpc_url: DEFAULT_BASE_RPC_URL.to_string(),
            etherscan_api_key: None,
            basescan_api_key: None,
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub payment: PaymentConfig,
    pub upstream: UpstreamConfig,
    /// Overall budget for one orchestrator run before the fallback kicks in
    pub orchestrator_deadline: Duration,
    pub contract_cache_ttl: Duration,
    pub token_cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub latency_window: usize,
    pub max_concurrent_requests: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            metrics_port: 9090,
            payment: PaymentConfig::default(),
            upstream: UpstreamConfig::default(),
            orchestrator_deadline: Duration::from_secs(DEFAULT_ORCHESTRATOR_DEADLINE_SECS),
            contract_cache_ttl: Duration::from_secs(DEFAULT_CONTRACT_CACHE_TTL_SECS),
            token_cache_ttl: Duration::from_secs(DEFAULT_TOKEN_CACHE_TTL_SECS),
            cache_sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
            latency_window: DEFAULT_LATENCY_WINDOW,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let payment = PaymentConfig {
            network: env_string("X402_NETWORK").unwrap_or(defaults.payment.network),
            asset: env_string("X402_ASSET").unwrap_or(defaults.payment.asset),
            receiver: env_string("RECEIVER_ADDRESS").unwrap_or(defaults.payment.receiver),
            enforce_expiry: env_parse("X402_ENFORCE_EXPIRY", defaults.payment.enforce_expiry),
        };

        let upstream = UpstreamConfig {
            eth_rpc_url: env_string("ETH_RPC_URL").unwrap_or(defaults.upstream.eth_rpc_url),
            base_rpc_url: env_string("BASE_RPC_URL").unwrap_or(defaults.upstream.base_rpc_url),
            etherscan_api_key: env_string("ETHERSCAN_API_KEY"),
            basescan_api_key: env_string("BASESCAN_API_KEY"),
            timeout: Duration::from_secs(env_parse(
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )),
        };

        if upstream.etherscan_api_key.is_some() {
            info!("🔑 ETHERSCAN_API_KEY configured (key hidden)");
        }
        if upstream.basescan_api_key.is_some() {
            info!("🔑 BASESCAN_API_KEY configured (key hidden)");
        }

        Self {
            host: env_string("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            metrics_port: env_parse("METRICS_PORT", defaults.metrics_port),
            payment,
            upstream,
            orchestrator_deadline: Duration::from_secs(env_parse(
                "ORCHESTRATOR_DEADLINE_SECS",
                DEFAULT_ORCHESTRATOR_DEADLINE_SECS,
            )),
            contract_cache_ttl: Duration::from_secs(env_parse(
                "CONTRACT_CACHE_TTL_SECS",
                DEFAULT_CONTRACT_CACHE_TTL_SECS,
            )),
            token_cache_ttl: Duration::from_secs(env_parse(
                "TOKEN_CACHE_TTL_SECS",
                DEFAULT_TOKEN_CACHE_TTL_SECS,
            )),
            cache_sweep_interval: Duration::from_secs(env_parse(
                "CACHE_SWEEP_INTERVAL_SECS",
                DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
            )),
            latency_window: env_parse("LATENCY_WINDOW", DEFAULT_LATENCY_WINDOW).max(1),
            max_concurrent_requests: env_parse(
                "MAX_CONCURRENT_REQUESTS",
                DEFAULT_MAX_CONCURRENT_REQUESTS,
            )
            .max(1),
        }
    }
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to the default on absence or garbage
fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env_string(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = %default, "Invalid config value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_from_price_table() {
        let payment = PaymentConfig::default();
        let all = payment.all_requirements();
        assert_eq!(all.len(), ROUTE_PRICES.len());

        let (path, req) = &all[0];
        assert_eq!(*path, "/api/gas");
        assert_eq!(req.min_amount, "0.001");
        assert_eq!(req.max_amount, req.min_amount);
        assert_eq!(req.scheme, "x402");
        assert_eq!(req.asset, "USDC");
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("RUSTER_TEST_BAD_PORT", "not-a-port");
        assert_eq!(env_parse::<u16>("RUSTER_TEST_BAD_PORT", 8080), 8080);
        std::env::set_var("RUSTER_TEST_GOOD_PORT", "3000");
        assert_eq!(env_parse::<u16>("RUSTER_TEST_GOOD_PORT", 8080), 3000);
        assert!(!env_parse::<bool>("RUSTER_TEST_UNSET_FLAG", false));
    }
}
