//! Wallet scanner
//!
//! Portfolio risk from the wallet's ETH balance and ERC-20 holdings. Each
//! holding is scored from the token-scan cache only; holdings nobody has
//! scanned yet are reported as unscored rather than fetched inline.

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::token::{self, TokenScanResult};
use super::{collect_unavailable, RiskReport};
use crate::core::orchestrator::Orchestrator;
use crate::core::risk_score::{RiskRule, RuleSet, ScoreResult, Severity};
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource};
use crate::providers::ChainRpc;
use crate::utils::cache::ExpiringCache;
use crate::utils::constants::{round_to, wei_to_eth};

/// A holding at or above this token score counts as suspicious
pub const SUSPICIOUS_TOKEN_SCORE: u8 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct WalletScanInput {
    pub address: String,
    pub chain: Chain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub contract: String,
    pub balance: String,
    /// From the token cache; `None` when the token was never scanned
    pub risk_score: Option<u8>,
    pub is_suspicious: bool,
}

#[derive(Debug, Clone)]
pub struct WalletSignals {
    pub eth_balance: Probe<U256>,
    pub holdings: Probe<Vec<Holding>>,
}

impl WalletSignals {
    fn scored(&self) -> Vec<u8> {
        self.holdings
            .observed()
            .map(|h| h.iter().filter_map(|x| x.risk_score).collect())
            .unwrap_or_default()
    }

    fn average_holding_risk(&self) -> i32 {
        let scored = self.scored();
        if scored.is_empty() {
            return 0;
        }
        scored.iter().map(|s| *s as i32).sum::<i32>() / scored.len() as i32
    }

    fn suspicious_count(&self) -> usize {
        self.holdings
            .observed()
            .map(|h| h.iter().filter(|x| x.is_suspicious).count())
            .unwrap_or(0)
    }
}

lazy_static! {
    static ref WALLET_RULES: RuleSet<WalletSignals> = RuleSet::new(vec![
        RiskRule::derived(
            "holding_risk",
            |s: &WalletSignals| s.average_holding_risk(),
            Severity::Medium,
            "Average risk of scanned token holdings",
            |s: &WalletSignals| s.average_holding_risk() > 0,
        ),
        RiskRule::derived(
            "suspicious_tokens",
            |s: &WalletSignals| 10 * s.suspicious_count() as i32,
            Severity::High,
            "Wallet holds tokens flagged as high risk",
            |s: &WalletSignals| s.suspicious_count() > 0,
        ),
    ]);
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletScanResult {
    pub address: String,
    pub chain: Chain,
    #[serde(flatten)]
    pub risk: RiskReport,
    pub eth_balance: Option<f64>,
    pub token_count: Option<usize>,
    pub holdings: Vec<Holding>,
    pub suspicious_tokens: usize,
    pub unscored_tokens: usize,
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub scanned_at: i64,
}

pub struct WalletScanner {
    rpc: Arc<dyn ChainRpc>,
    token_cache: Arc<ExpiringCache<TokenScanResult>>,
    timeout: Duration,
}

impl WalletScanner {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        token_cache: Arc<ExpiringCache<TokenScanResult>>,
        timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            token_cache,
            timeout,
        }
    }

    pub fn score(signals: &WalletSignals) -> ScoreResult {
        WALLET_RULES.evaluate(signals)
    }

    pub async fn scan(&self, input: &WalletScanInput) -> AppResult<WalletScanResult> {
        let addr = input.address.as_str();
        let (eth_balance, balances) = tokio::join!(
            probe("eth_getBalance", self.timeout, self.rpc.balance_wei(input.chain, addr)),
            probe(
                "alchemy_getTokenBalances",
                self.timeout,
                self.rpc.token_balances(input.chain, addr)
            ),
        );

        let holdings = balances.map(|list| {
            list.into_iter()
                .map(|b| {
                    let risk_score = self
                        .token_cache
                        .get(&token::cache_key(input.chain, &b.contract))
                        .map(|t| t.risk.risk_score);
                    Holding {
                        is_suspicious: risk_score.map_or(false, |s| s >= SUSPICIOUS_TOKEN_SCORE),
                        contract: b.contract,
                        balance: b.balance,
                        risk_score,
                    }
                })
                .collect::<Vec<_>>()
        });
        let signals = WalletSignals {
            eth_balance,
            holdings,
        };

        let unavailable = collect_unavailable([
            signals.eth_balance.unavailable_reason(),
            signals.holdings.unavailable_reason(),
        ]);
        if unavailable.len() == 2 {
            return Err(AppError::upstream(unavailable.join("; ")));
        }

        let score = Self::score(&signals);
        let holdings = signals.holdings.observed().cloned().unwrap_or_default();
        let unscored_tokens = holdings.iter().filter(|h| h.risk_score.is_none()).count();

        info!(
            "{} Wallet {} on {}: {} holdings, score {}",
            score.level.emoji(),
            addr,
            input.chain,
            holdings.len(),
            score.score
        );

        Ok(WalletScanResult {
            address: input.address.clone(),
            chain: input.chain,
            risk: RiskReport::from(&score),
            eth_balance: signals.eth_balance.observed().map(|w| round_to(wei_to_eth(*w), 6)),
            token_count: signals.holdings.observed().map(Vec::len),
            suspicious_tokens: signals.suspicious_count(),
            unscored_tokens,
            holdings,
            unavailable,
            data_source: DataSource::Live,
            scanned_at: Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl Orchestrator for WalletScanner {
    type Input = WalletScanInput;
    type Output = WalletScanResult;

    fn name(&self) -> &'static str {
        "scan-wallet"
    }

    async fn run(&self, input: WalletScanInput) -> AppResult<WalletScanResult> {
        self.scan(&input).await
    }

    fn fallback(&self, input: &WalletScanInput, reason: &AppError) -> WalletScanResult {
        WalletScanResult {
            address: input.address.clone(),
            chain: input.chain,
            risk: RiskReport::unknown(),
            eth_balance: None,
            token_count: None,
            holdings: Vec::new(),
            suspicious_tokens: 0,
            unscored_tokens: 0,
            unavailable: vec![reason.message.clone()],
            data_source: DataSource::Fallback,
            scanned_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(score: Option<u8>) -> Holding {
        Holding {
            contract: "0xabc".into(),
            balance: "0x1".into(),
            risk_score: score,
            is_suspicious: score.map_or(false, |s| s >= SUSPICIOUS_TOKEN_SCORE),
        }
    }

    #[test]
    fn test_average_and_suspicious_combine() {
        let signals = WalletSignals {
            eth_balance: Probe::Observed(U256::ZERO),
            holdings: Probe::Observed(vec![holding(Some(80)), holding(Some(20)), holding(None)]),
        };
        let score = WalletScanner::score(&signals);
        // avg(80, 20) = 50, plus one suspicious holding
        assert_eq!(score.raw_points, 60);
        assert_eq!(score.triggered(), vec!["holding_risk", "suspicious_tokens"]);
    }

    #[test]
    fn test_unscored_wallet_is_clean() {
        let signals = WalletSignals {
            eth_balance: Probe::Observed(U256::from(10u64)),
            holdings: Probe::Observed(vec![holding(None)]),
        };
        assert_eq!(WalletScanner::score(&signals).score, 0);
    }

    #[test]
    fn test_holdings_unavailable() {
        let signals = WalletSignals {
            eth_balance: Probe::Observed(U256::ZERO),
            holdings: Probe::Unavailable("method not supported".into()),
        };
        let score = WalletScanner::score(&signals);
        assert!(score.hits.is_empty());
        assert_eq!(signals.suspicious_count(), 0);
    }
}
