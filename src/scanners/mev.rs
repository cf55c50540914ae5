//! MEV exposure check
//!
//! Value, DEX swap calldata and the current gas price decide how attractive a
//! pending transaction is to sandwich and frontrun bots.

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::RiskReport;
use crate::core::orchestrator::Orchestrator;
use crate::core::risk_score::{RiskRule, RuleSet, ScoreResult, Severity};
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource};
use crate::providers::ChainRpc;
use crate::utils::constants::{
    round_to, wei_to_gwei, GAS_PRICE_ELEVATED_GWEI, GAS_PRICE_HIGH_GWEI, ONE_ETH_WEI, PROTECTED_RPCS,
    SWAP_SELECTORS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MevCheckInput {
    pub chain: Chain,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: U256,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MevSignals {
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_price_gwei: Probe<f64>,
}

impl MevSignals {
    /// Selector plus at least one byte of arguments
    fn is_swap(&self) -> bool {
        self.data.len() > 4 && SWAP_SELECTORS.iter().any(|sel| self.data.starts_with(sel))
    }
}

lazy_static! {
    static ref MEV_RULES: RuleSet<MevSignals> = RuleSet::new(vec![
        RiskRule::new(
            "high_value_transfer",
            20,
            Severity::Medium,
            "Transfers more than 1 ETH",
            |s: &MevSignals| s.value > U256::from(ONE_ETH_WEI),
        ),
        RiskRule::new(
            "dex_swap_detected",
            30,
            Severity::High,
            "DEX swap calldata - exposed to sandwich attacks",
            |s: &MevSignals| s.is_swap(),
        ),
        RiskRule::new(
            "gas_price_high",
            10,
            Severity::Medium,
            "Gas price above 50 gwei - heavy competition for inclusion",
            |s: &MevSignals| s.gas_price_gwei.is(|g| *g > GAS_PRICE_HIGH_GWEI),
        ),
        RiskRule::new(
            "gas_price_elevated",
            5,
            Severity::Low,
            "Gas price above 20 gwei",
            |s: &MevSignals| {
                s.gas_price_gwei
                    .is(|g| *g > GAS_PRICE_ELEVATED_GWEI && *g <= GAS_PRICE_HIGH_GWEI)
            },
        ),
    ])
    .with_unsafe_score(50);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    Low,
    Medium,
    High,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct MevCheckResult {
    pub chain: Chain,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(flatten)]
    pub risk: RiskReport,
    pub sandwich_risk: Exposure,
    pub frontrun_risk: Exposure,
    pub gas_price_risk: Exposure,
    pub gas_price_gwei: Option<f64>,
    pub recommended_slippage: String,
    pub protected_rpcs: Vec<String>,
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub checked_at: i64,
}

fn frontrun_exposure(score: u8) -> Exposure {
    match score {
        s if s >= 50 => Exposure::High,
        s if s >= 30 => Exposure::Medium,
        _ => Exposure::Low,
    }
}

fn gas_exposure(gas: &Probe<f64>) -> Exposure {
    match gas.observed() {
        Some(g) if *g > GAS_PRICE_HIGH_GWEI => Exposure::High,
        Some(g) if *g > GAS_PRICE_ELEVATED_GWEI => Exposure::Medium,
        Some(_) => Exposure::Low,
        None => Exposure::Unknown,
    }
}

fn protected_rpcs() -> Vec<String> {
    PROTECTED_RPCS.iter().map(|s| s.to_string()).collect()
}

pub struct MevChecker {
    rpc: Arc<dyn ChainRpc>,
    timeout: Duration,
}

impl MevChecker {
    pub fn new(rpc: Arc<dyn ChainRpc>, timeout: Duration) -> Self {
        Self { rpc, timeout }
    }

    pub fn score(signals: &MevSignals) -> ScoreResult {
        MEV_RULES.evaluate(signals)
    }

    pub async fn check(&self, input: &MevCheckInput) -> AppResult<MevCheckResult> {
        let gas_price_gwei = probe("eth_gasPrice", self.timeout, async {
            Ok::<_, eyre::Report>(wei_to_gwei(self.rpc.gas_price_wei(input.chain).await?))
        })
        .await;
        let signals = MevSignals {
            value: input.value,
            data: input.data.clone(),
            gas_price_gwei,
        };

        let score = Self::score(&signals);
        let swap = signals.is_swap();
        info!(
            "{} MEV check on {}: score {} swap={}",
            score.level.emoji(),
            input.chain,
            score.score,
            swap
        );

        Ok(MevCheckResult {
            chain: input.chain,
            from: input.from.clone(),
            to: input.to.clone(),
            risk: RiskReport::from(&score),
            sandwich_risk: if swap { Exposure::Medium } else { Exposure::Low },
            frontrun_risk: frontrun_exposure(score.score),
            gas_price_risk: gas_exposure(&signals.gas_price_gwei),
            gas_price_gwei: signals.gas_price_gwei.observed().map(|g| round_to(*g, 2)),
            recommended_slippage: if swap { "0.1%" } else { "0.5%" }.to_string(),
            protected_rpcs: protected_rpcs(),
            unavailable: signals
                .gas_price_gwei
                .unavailable_reason()
                .map(str::to_string)
                .into_iter()
                .collect(),
            data_source: DataSource::Live,
            checked_at: Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl Orchestrator for MevChecker {
    type Input = MevCheckInput;
    type Output = MevCheckResult;

    fn name(&self) -> &'static str {
        "mev-check"
    }

    async fn run(&self, input: MevCheckInput) -> AppResult<MevCheckResult> {
        self.check(&input).await
    }

    fn fallback(&self, input: &MevCheckInput, reason: &AppError) -> MevCheckResult {
        MevCheckResult {
            chain: input.chain,
            from: input.from.clone(),
            to: input.to.clone(),
            risk: RiskReport::unknown(),
            sandwich_risk: Exposure::Unknown,
            frontrun_risk: Exposure::Unknown,
            gas_price_risk: Exposure::Unknown,
            gas_price_gwei: None,
            recommended_slippage: "0.5%".to_string(),
            protected_rpcs: protected_rpcs(),
            unavailable: vec![reason.message.clone()],
            data_source: DataSource::Fallback,
            checked_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::RiskLevel;

    fn swap_calldata() -> Vec<u8> {
        let mut data = SWAP_SELECTORS[2].to_vec();
        data.extend_from_slice(&[0u8; 64]);
        data
    }

    #[test]
    fn test_swap_with_value_and_high_gas() {
        let signals = MevSignals {
            value: U256::from(3 * ONE_ETH_WEI),
            data: swap_calldata(),
            gas_price_gwei: Probe::Observed(72.5),
        };
        let score = MevChecker::score(&signals);
        assert_eq!(
            score.triggered(),
            vec!["high_value_transfer", "dex_swap_detected", "gas_price_high"]
        );
        assert_eq!(score.score, 60);
        assert_eq!(score.level, RiskLevel::High);
        assert!(!score.safe);
        assert_eq!(frontrun_exposure(score.score), Exposure::High);
        assert_eq!(gas_exposure(&signals.gas_price_gwei), Exposure::High);
    }

    #[test]
    fn test_gas_bands_are_exclusive() {
        let at = |g: f64| {
            MevChecker::score(&MevSignals {
                value: U256::ZERO,
                data: Vec::new(),
                gas_price_gwei: Probe::Observed(g),
            })
        };
        assert!(at(20.0).hits.is_empty());
        assert_eq!(at(50.0).triggered(), vec!["gas_price_elevated"]);
        assert_eq!(at(50.1).triggered(), vec!["gas_price_high"]);
    }

    #[test]
    fn test_swap_alone_is_medium_frontrun() {
        let signals = MevSignals {
            value: U256::ZERO,
            data: swap_calldata(),
            gas_price_gwei: Probe::Unavailable("eth_gasPrice failed".into()),
        };
        let score = MevChecker::score(&signals);
        assert_eq!(score.score, 30);
        assert!(score.safe);
        assert_eq!(frontrun_exposure(score.score), Exposure::Medium);
        assert_eq!(gas_exposure(&signals.gas_price_gwei), Exposure::Unknown);
    }

    #[test]
    fn test_bare_selector_is_not_a_swap() {
        let with = |data: Vec<u8>| MevSignals {
            value: U256::ZERO,
            data,
            gas_price_gwei: Probe::Observed(1.0),
        };
        let bare = with(SWAP_SELECTORS[0].to_vec());
        assert!(!bare.is_swap());
        assert!(MevChecker::score(&bare).hits.is_empty());

        let mut data = SWAP_SELECTORS[0].to_vec();
        data.push(0);
        assert_eq!(MevChecker::score(&with(data)).triggered(), vec!["dex_swap_detected"]);
    }
}
