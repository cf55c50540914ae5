//! Scanners Module - One orchestrator per paid route
//!
//! Setiap scanner: kumpulkan sinyal dari providers, skor dengan RuleSet
//! miliknya, lalu bentuk payload. Capping, klasifikasi dan flag `safe`
//! semuanya berasal dari core::risk_score.

pub mod agent;
pub mod contract;
pub mod labels;
pub mod market;
pub mod mev;
pub mod preflight;
pub mod prompt;
pub mod token;
pub mod wallet;

use alloy_primitives::Address;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::risk_score::{RuleHit, ScoreResult};
use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, RiskLevel};
use crate::providers::Providers;
use crate::utils::cache::ExpiringCache;

pub use agent::AgentScorer;
pub use contract::ContractScanner;
pub use labels::AddressLabeler;
pub use market::{EthPriceFeed, GasOracle, ValidatorQueueMonitor};
pub use mev::MevChecker;
pub use preflight::TxPreflight;
pub use prompt::PromptGuard;
pub use token::TokenScanner;
pub use wallet::WalletScanner;

/// Scored part shared by every risk payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub safe: bool,
    /// Triggered rule names in rule-table order
    pub flags: Vec<String>,
    pub reasons: Vec<String>,
    pub rules: Vec<RuleHit>,
}

impl From<&ScoreResult> for RiskReport {
    fn from(score: &ScoreResult) -> Self {
        Self {
            risk_score: score.score,
            risk_level: score.level,
            safe: score.safe,
            flags: score.triggered(),
            reasons: score.reasons(),
            rules: score.hits.clone(),
        }
    }
}

impl RiskReport {
    /// Conservative report used by fallback payloads: nothing was checked
    pub fn unknown() -> Self {
        Self {
            risk_score: 0,
            risk_level: RiskLevel::None,
            safe: false,
            flags: Vec::new(),
            reasons: vec!["Analysis unavailable - upstream data could not be fetched".to_string()],
            rules: Vec::new(),
        }
    }
}

// ============================================
// Input validation helpers
// ============================================

/// Required, non-empty string field
pub fn require_field(field: &str, raw: Option<&str>) -> AppResult<String> {
    match raw.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::missing_field(field)),
    }
}

/// Required 0x-prefixed 20-byte address, returned lowercased
pub fn require_address(field: &str, raw: Option<&str>) -> AppResult<String> {
    let value = require_field(field, raw)?;
    if !is_valid_address(&value) {
        return Err(AppError::invalid_address(format!("Invalid {} address format", field)));
    }
    Ok(value.to_lowercase())
}

pub fn is_valid_address(raw: &str) -> bool {
    raw.len() == 42 && raw.starts_with("0x") && Address::from_str(raw).is_ok()
}

pub fn parse_chain(raw: Option<&str>) -> AppResult<Chain> {
    Chain::parse_or_default(raw).map_err(AppError::invalid_value)
}

/// Reasons for every probe that could not be observed
pub(crate) fn collect_unavailable<'a>(reasons: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    reasons.into_iter().flatten().map(str::to_string).collect()
}

// ============================================
// Wiring
// ============================================

/// All orchestrators, built once at startup
#[derive(Clone)]
pub struct Scanners {
    pub gas: Arc<GasOracle>,
    pub validators: Arc<ValidatorQueueMonitor>,
    pub eth_price: Arc<EthPriceFeed>,
    pub contract: Arc<ContractScanner>,
    pub token: Arc<TokenScanner>,
    pub wallet: Arc<WalletScanner>,
    pub labels: Arc<AddressLabeler>,
    pub mev: Arc<MevChecker>,
    pub preflight: Arc<TxPreflight>,
    pub prompt: Arc<PromptGuard>,
    pub agent: Arc<AgentScorer>,
}

/// Caches shared between scanners (the wallet scanner reads token scores)
#[derive(Clone)]
pub struct ScanCaches {
    pub contract: Arc<ExpiringCache<contract::ContractScanResult>>,
    pub token: Arc<ExpiringCache<token::TokenScanResult>>,
}

impl ScanCaches {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            contract: Arc::new(ExpiringCache::new("contract", config.contract_cache_ttl)),
            token: Arc::new(ExpiringCache::new("token", config.token_cache_ttl)),
        }
    }
}

impl Scanners {
    pub fn new(providers: &Providers, caches: &ScanCaches, timeout: Duration) -> Self {
        Self {
            gas: Arc::new(GasOracle::new(providers.rpc.clone(), timeout)),
            validators: Arc::new(ValidatorQueueMonitor::new(providers.validators.clone(), timeout)),
            eth_price: Arc::new(EthPriceFeed::new(providers.prices.clone(), timeout)),
            contract: Arc::new(ContractScanner::new(
                providers.explorer.clone(),
                providers.honeypot.clone(),
                caches.contract.clone(),
                timeout,
            )),
            token: Arc::new(TokenScanner::new(
                providers.explorer.clone(),
                providers.honeypot.clone(),
                caches.token.clone(),
                timeout,
            )),
            wallet: Arc::new(WalletScanner::new(
                providers.rpc.clone(),
                caches.token.clone(),
                timeout,
            )),
            labels: Arc::new(AddressLabeler),
            mev: Arc::new(MevChecker::new(providers.rpc.clone(), timeout)),
            preflight: Arc::new(TxPreflight::new(providers.rpc.clone(), timeout)),
            prompt: Arc::new(PromptGuard::new()),
            agent: Arc::new(AgentScorer::new(providers.explorer.clone(), timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_address() {
        let addr = require_address("address", Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")).unwrap();
        assert_eq!(addr, "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913");

        assert_eq!(
            require_address("address", None).unwrap_err().message,
            "Missing address"
        );
        assert!(require_address("address", Some("0x1234")).is_err());
        assert!(require_address("address", Some("833589fcd6edb6e08f4c7c32d4f71b54bda0291300")).is_err());
        assert!(require_address("address", Some("0xZZ3589fcd6edb6e08f4c7c32d4f71b54bda02913")).is_err());
    }

    #[test]
    fn test_parse_chain_error_is_bad_input() {
        let err = parse_chain(Some("solana")).unwrap_err();
        assert_eq!(err.code.response_code(), crate::models::types::ResponseCode::BadInput);
        assert_eq!(parse_chain(None).unwrap(), Chain::Base);
    }
}
