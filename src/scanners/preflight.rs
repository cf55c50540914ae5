//! Transaction preflight
//!
//! Simulates a transaction with `eth_estimateGas`, checks whether the target
//! holds code and inspects the calldata for risky calls (unlimited approvals,
//! `transferFrom`). A score of 50 or more marks the transaction unsafe.

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{collect_unavailable, RiskReport};
use crate::core::orchestrator::Orchestrator;
use crate::core::risk_score::{RiskRule, RuleSet, ScoreResult, Severity};
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource};
use crate::providers::{CallRequest, ChainRpc, GasEstimate};
use crate::utils::constants::{
    GAS_ESTIMATE_BUFFER, HIGH_GAS_LIMIT, ONE_ETH_WEI, SELECTOR_APPROVE, SELECTOR_TRANSFER_FROM,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TxPreflightInput {
    pub chain: Chain,
    pub call: CallRequest,
}

/// Parse a wei amount given as 0x-hex or decimal; absent or empty means zero
pub fn parse_value(raw: Option<&str>) -> AppResult<U256> {
    match raw.map(str::trim) {
        None | Some("") => Ok(U256::ZERO),
        Some(v) => U256::from_str(v)
            .map_err(|_| AppError::invalid_value(format!("Invalid value '{}': expected wei as hex or decimal", v))),
    }
}

/// Parse 0x-prefixed calldata; absent, empty or "0x" means no calldata
pub fn parse_calldata(raw: Option<&str>) -> AppResult<Vec<u8>> {
    let digits = raw.map(str::trim).unwrap_or("");
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    if digits.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(digits).map_err(|e| AppError::invalid_value(format!("Invalid data: {}", e)))
}

/// `approve(spender, amount)` with amount == 2^256 - 1
pub fn is_unlimited_approval(data: &[u8]) -> bool {
    data.starts_with(&SELECTOR_APPROVE)
        && data.len() >= 68
        && U256::from_be_slice(&data[36..68]) == U256::MAX
}

pub fn buffered_gas(gas: u64) -> u64 {
    (gas as f64 * GAS_ESTIMATE_BUFFER) as u64
}

#[derive(Debug, Clone)]
pub struct PreflightSignals {
    pub value: U256,
    pub data: Vec<u8>,
    pub is_contract: Probe<bool>,
    pub simulation: Probe<GasEstimate>,
}

impl PreflightSignals {
    fn buffered_gas(&self) -> Option<u64> {
        match self.simulation.observed() {
            Some(GasEstimate::Gas(g)) => Some(buffered_gas(*g)),
            _ => None,
        }
    }
}

lazy_static! {
    static ref PREFLIGHT_RULES: RuleSet<PreflightSignals> = RuleSet::new(vec![
        RiskRule::new(
            "unlimited_approval",
            30,
            Severity::High,
            "Unlimited token approval detected - use specific amount instead",
            |s: &PreflightSignals| is_unlimited_approval(&s.data),
        ),
        RiskRule::new(
            "transfer_from",
            10,
            Severity::Low,
            "transferFrom() call - verify sender has approved spending",
            |s: &PreflightSignals| s.data.starts_with(&SELECTOR_TRANSFER_FROM),
        ),
        RiskRule::new(
            "large_value",
            10,
            Severity::Medium,
            "Large ETH transfer (more than 1 ETH)",
            |s: &PreflightSignals| s.value > U256::from(ONE_ETH_WEI),
        ),
        RiskRule::new(
            "simulation_failed",
            20,
            Severity::High,
            "Transaction simulation failed - it would likely revert",
            |s: &PreflightSignals| matches!(s.simulation, Probe::Observed(GasEstimate::Reverted(_))),
        ),
        RiskRule::new(
            "high_gas",
            5,
            Severity::Low,
            "High gas usage detected",
            |s: &PreflightSignals| s.buffered_gas().map_or(false, |g| g > HIGH_GAS_LIMIT),
        ),
        RiskRule::new(
            "contract_target",
            0,
            Severity::Info,
            "Target is a smart contract - verify it's trusted",
            |s: &PreflightSignals| s.is_contract.is_true(),
        ),
    ])
    .with_unsafe_score(50);
}

#[derive(Debug, Clone, Serialize)]
pub struct TxPreflightResult {
    pub to: String,
    pub from: Option<String>,
    pub chain: Chain,
    #[serde(flatten)]
    pub risk: RiskReport,
    pub simulation_success: Option<bool>,
    /// Estimate including the 20% buffer
    pub gas_estimate: Option<u64>,
    pub revert_reason: Option<String>,
    pub is_contract: Option<bool>,
    pub recommendations: Vec<String>,
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub checked_at: i64,
}

fn recommendations(score: &ScoreResult) -> Vec<String> {
    let mut out = Vec::new();
    if score.score >= 50 {
        out.push("Transaction has high risk - review carefully".to_string());
    }
    if score.score >= 30 {
        out.push("Consider using a test transaction first".to_string());
    }
    out
}

pub struct TxPreflight {
    rpc: Arc<dyn ChainRpc>,
    timeout: Duration,
}

impl TxPreflight {
    pub fn new(rpc: Arc<dyn ChainRpc>, timeout: Duration) -> Self {
        Self { rpc, timeout }
    }

    pub fn score(signals: &PreflightSignals) -> ScoreResult {
        PREFLIGHT_RULES.evaluate(signals)
    }

    pub async fn check(&self, input: &TxPreflightInput) -> AppResult<TxPreflightResult> {
        let call = &input.call;
        let (is_contract, simulation) = tokio::join!(
            probe("eth_getCode", self.timeout, async {
                let code = self.rpc.code_at(input.chain, &call.to).await?;
                Ok::<_, eyre::Report>(code.len() > 2 && code != "0x")
            }),
            probe(
                "eth_estimateGas",
                self.timeout,
                self.rpc.estimate_gas(input.chain, call)
            ),
        );
        let signals = PreflightSignals {
            value: call.value,
            data: call.data.clone(),
            is_contract,
            simulation,
        };

        let unavailable = collect_unavailable([
            signals.is_contract.unavailable_reason(),
            signals.simulation.unavailable_reason(),
        ]);
        if unavailable.len() == 2 {
            return Err(AppError::upstream(unavailable.join("; ")));
        }

        let score = Self::score(&signals);
        info!(
            "{} Preflight to {} on {}: score {} safe={}",
            score.level.emoji(),
            call.to,
            input.chain,
            score.score,
            score.safe
        );

        Ok(TxPreflightResult {
            to: call.to.clone(),
            from: call.from.clone(),
            chain: input.chain,
            risk: RiskReport::from(&score),
            simulation_success: signals
                .simulation
                .observed()
                .map(|s| matches!(s, GasEstimate::Gas(_))),
            gas_estimate: signals.buffered_gas(),
            revert_reason: match signals.simulation.observed() {
                Some(GasEstimate::Reverted(reason)) => Some(reason.clone()),
                _ => None,
            },
            is_contract: signals.is_contract.observed().copied(),
            recommendations: recommendations(&score),
            unavailable,
            data_source: DataSource::Live,
            checked_at: Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl Orchestrator for TxPreflight {
    type Input = TxPreflightInput;
    type Output = TxPreflightResult;

    fn name(&self) -> &'static str {
        "tx-preflight"
    }

    async fn run(&self, input: TxPreflightInput) -> AppResult<TxPreflightResult> {
        self.check(&input).await
    }

    fn fallback(&self, input: &TxPreflightInput, reason: &AppError) -> TxPreflightResult {
        TxPreflightResult {
            to: input.call.to.clone(),
            from: input.call.from.clone(),
            chain: input.chain,
            risk: RiskReport::unknown(),
            simulation_success: None,
            gas_estimate: None,
            revert_reason: None,
            is_contract: None,
            recommendations: vec!["Simulation unavailable - retry before signing".to_string()],
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

    fn approve_max() -> Vec<u8> {
        let mut data = SELECTOR_APPROVE.to_vec();
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&[0x11; 20]);
        data.extend_from_slice(&[0xff; 32]);
        data
    }

    fn signals(value: U256, data: Vec<u8>, simulation: Probe<GasEstimate>) -> PreflightSignals {
        PreflightSignals {
            value,
            data,
            is_contract: Probe::Observed(true),
            simulation,
        }
    }

    #[test]
    fn test_parse_value_hex_and_decimal() {
        assert_eq!(parse_value(None).unwrap(), U256::ZERO);
        assert_eq!(parse_value(Some("0x0")).unwrap(), U256::ZERO);
        assert_eq!(parse_value(Some("0xde0b6b3a7640000")).unwrap(), U256::from(ONE_ETH_WEI));
        assert_eq!(parse_value(Some("1000000000000000000")).unwrap(), U256::from(ONE_ETH_WEI));
        assert!(parse_value(Some("one ether")).is_err());
    }

    #[test]
    fn test_parse_calldata() {
        assert!(parse_calldata(Some("0x")).unwrap().is_empty());
        assert_eq!(parse_calldata(Some("0x095ea7b3")).unwrap(), SELECTOR_APPROVE.to_vec());
        assert!(parse_calldata(Some("0xzz")).is_err());
    }

    #[test]
    fn test_unlimited_approval_detection() {
        assert!(is_unlimited_approval(&approve_max()));

        let mut limited = approve_max();
        limited[67] = 0xfe;
        assert!(!is_unlimited_approval(&limited));
        assert!(!is_unlimited_approval(&SELECTOR_APPROVE));
    }

    #[test]
    fn test_risky_transaction_is_unsafe() {
        let two_eth = U256::from(2 * ONE_ETH_WEI);
        let score = TxPreflight::score(&signals(
            two_eth,
            approve_max(),
            Probe::Observed(GasEstimate::Reverted("execution reverted".into())),
        ));
        // approval 30 + large value 10 + reverted 20
        assert_eq!(score.score, 60);
        assert_eq!(score.level, RiskLevel::High);
        assert!(!score.safe);
        assert_eq!(recommendations(&score).len(), 2);
    }

    #[test]
    fn test_buffered_gas_threshold() {
        // 420k * 1.2 = 504k
        let score = TxPreflight::score(&signals(
            U256::ZERO,
            Vec::new(),
            Probe::Observed(GasEstimate::Gas(420_000)),
        ));
        assert!(score.has("high_gas"));
        assert!(score.has("contract_target"));
        assert_eq!(score.score, 5);
        assert!(score.safe);
        assert!(recommendations(&score).is_empty());
    }

    #[test]
    fn test_unreachable_node_is_not_a_revert() {
        let score = TxPreflight::score(&signals(
            U256::ZERO,
            Vec::new(),
            Probe::Unavailable("eth_estimateGas timed out after 10000ms".into()),
        ));
        assert!(!score.has("simulation_failed"));
    }
}
