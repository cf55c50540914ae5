//! Token scanner
//!
//! Reads the verified ABI from the explorer and looks for risky capabilities
//! (mint, blacklist, upgradeability), plus the honeypot oracle verdict.
//! Results are cached per `token:<chain>:<address>` and reused by the wallet
//! scanner to score holdings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{collect_unavailable, RiskReport};
use crate::core::orchestrator::Orchestrator;
use crate::core::risk_score::{RiskRule, RuleSet, ScoreResult, Severity};
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource};
use crate::providers::{ContractExplorer, HoneypotOracle};
use crate::utils::cache::ExpiringCache;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenScanInput {
    pub address: String,
    pub chain: Chain,
}

#[derive(Debug, Clone)]
pub struct TokenSignals {
    /// `Observed(None)` means the explorer answered: source not verified
    pub abi: Probe<Option<String>>,
    pub honeypot: Probe<bool>,
}

impl TokenSignals {
    /// ABI substring match, case-sensitive like the explorer's JSON
    fn abi_mentions(&self, needles: &[&str]) -> bool {
        self.abi
            .is(|abi| abi.as_deref().map_or(false, |a| needles.iter().any(|n| a.contains(n))))
    }

    fn has_mint(&self) -> bool {
        self.abi_mentions(&["mint"])
    }

    fn has_blacklist(&self) -> bool {
        self.abi_mentions(&["blacklist", "blocked"])
    }

    fn is_proxy(&self) -> bool {
        self.abi_mentions(&["delegatecall", "implementation"])
    }
}

lazy_static! {
    static ref TOKEN_RULES: RuleSet<TokenSignals> = RuleSet::new(vec![
        RiskRule::new(
            "has_mint_function",
            20,
            Severity::Medium,
            "Contract has mint function - supply can be inflated",
            |s: &TokenSignals| s.has_mint(),
        ),
        RiskRule::new(
            "has_blacklist",
            15,
            Severity::Medium,
            "Contract can blacklist addresses",
            |s: &TokenSignals| s.has_blacklist(),
        ),
        RiskRule::new(
            "proxy_contract",
            0,
            Severity::Info,
            "Contract is upgradeable - logic can change after purchase",
            |s: &TokenSignals| s.is_proxy(),
        ),
        RiskRule::new(
            "unverified_contract",
            30,
            Severity::High,
            "Contract source code is not verified",
            |s: &TokenSignals| matches!(s.abi, Probe::Observed(None)),
        ),
        RiskRule::new(
            "honeypot_indicators",
            50,
            Severity::Critical,
            "Honeypot patterns detected - token may not be sellable",
            |s: &TokenSignals| s.honeypot.is_true(),
        ),
    ]);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenScanResult {
    pub address: String,
    pub chain: Chain,
    #[serde(flatten)]
    pub risk: RiskReport,
    pub is_verified: Option<bool>,
    pub is_honeypot: Option<bool>,
    pub has_mint_function: bool,
    pub has_blacklist: bool,
    pub is_proxy: bool,
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub scanned_at: i64,
}

pub fn cache_key(chain: Chain, address: &str) -> String {
    format!("token:{}:{}", chain, address.to_lowercase())
}

pub struct TokenScanner {
    explorer: Arc<dyn ContractExplorer>,
    honeypot: Arc<dyn HoneypotOracle>,
    cache: Arc<ExpiringCache<TokenScanResult>>,
    timeout: Duration,
}

impl TokenScanner {
    pub fn new(
        explorer: Arc<dyn ContractExplorer>,
        honeypot: Arc<dyn HoneypotOracle>,
        cache: Arc<ExpiringCache<TokenScanResult>>,
        timeout: Duration,
    ) -> Self {
        Self {
            explorer,
            honeypot,
            cache,
            timeout,
        }
    }

    pub fn score(signals: &TokenSignals) -> ScoreResult {
        TOKEN_RULES.evaluate(signals)
    }

    pub async fn scan(&self, input: &TokenScanInput) -> AppResult<TokenScanResult> {
        let key = cache_key(input.chain, &input.address);
        if let Some(hit) = self.cache.lookup(&key) {
            return Ok(TokenScanResult {
                data_source: DataSource::Cached,
                cached: true,
                cached_at: Some(hit.stored_at),
                ..hit.value
            });
        }

        let addr = input.address.as_str();
        let (abi, honeypot) = tokio::join!(
            probe(
                "explorer.getabi",
                self.timeout,
                self.explorer.contract_abi(input.chain, addr)
            ),
            probe(
                "honeypot.is",
                self.timeout,
                self.honeypot.is_honeypot(input.chain, addr)
            ),
        );
        let signals = TokenSignals { abi, honeypot };

        let unavailable = collect_unavailable([
            signals.abi.unavailable_reason(),
            signals.honeypot.unavailable_reason(),
        ]);
        if unavailable.len() == 2 {
            return Err(AppError::upstream(unavailable.join("; ")));
        }

        let score = Self::score(&signals);
        info!(
            "{} Token {} on {}: score {} ({})",
            score.level.emoji(),
            addr,
            input.chain,
            score.score,
            score.level
        );

        let result = TokenScanResult {
            address: input.address.clone(),
            chain: input.chain,
            risk: RiskReport::from(&score),
            is_verified: signals.abi.observed().map(Option::is_some),
            is_honeypot: signals.honeypot.observed().copied(),
            has_mint_function: signals.has_mint(),
            has_blacklist: signals.has_blacklist(),
            is_proxy: signals.is_proxy(),
            unavailable,
            data_source: DataSource::Live,
            cached: false,
            cached_at: None,
            scanned_at: Utc::now().timestamp(),
        };

        if result.unavailable.is_empty() {
            self.cache.set(key, result.clone());
        }
        Ok(result)
    }
}

#[async_trait]
impl Orchestrator for TokenScanner {
    type Input = TokenScanInput;
    type Output = TokenScanResult;

    fn name(&self) -> &'static str {
        "scan-token"
    }

    async fn run(&self, input: TokenScanInput) -> AppResult<TokenScanResult> {
        self.scan(&input).await
    }

    fn fallback(&self, input: &TokenScanInput, reason: &AppError) -> TokenScanResult {
        TokenScanResult {
            address: input.address.clone(),
            chain: input.chain,
            risk: RiskReport::unknown(),
            is_verified: None,
            is_honeypot: None,
            has_mint_function: false,
            has_blacklist: false,
            is_proxy: false,
            unavailable: vec![reason.message.clone()],
            data_source: DataSource::Fallback,
            cached: false,
            cached_at: None,
            scanned_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::RiskLevel;

    fn signals(abi: Probe<Option<String>>, honeypot: Probe<bool>) -> TokenSignals {
        TokenSignals { abi, honeypot }
    }

    #[test]
    fn test_mint_and_blacklist_accumulate() {
        let abi = r#"[{"name":"mint"},{"name":"blacklist"},{"name":"implementation"}]"#;
        let score = TokenScanner::score(&signals(
            Probe::Observed(Some(abi.into())),
            Probe::Observed(false),
        ));
        assert_eq!(score.triggered(), vec!["has_mint_function", "has_blacklist", "proxy_contract"]);
        assert_eq!(score.score, 35);
        assert_eq!(score.level, RiskLevel::Low);
    }

    #[test]
    fn test_abi_match_is_case_sensitive() {
        let score = TokenScanner::score(&signals(
            Probe::Observed(Some(r#"[{"name":"MINT"}]"#.into())),
            Probe::Observed(false),
        ));
        assert!(!score.has("has_mint_function"));
    }

    #[test]
    fn test_unverified_and_honeypot() {
        let score = TokenScanner::score(&signals(Probe::Observed(None), Probe::Observed(true)));
        assert_eq!(score.score, 80);
        assert_eq!(score.level, RiskLevel::Critical);
    }

    #[test]
    fn test_explorer_failure_is_not_unverified() {
        let score = TokenScanner::score(&signals(
            Probe::Unavailable("explorer.getabi timed out".into()),
            Probe::Observed(false),
        ));
        assert!(score.hits.is_empty());
    }
}
