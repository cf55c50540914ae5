//! Agent security score
//!
//! Inverse of the other scanners: starts from 100 and loses points for a
//! poor on-chain track record. The risk level is classified from
//! `100 - score`, so a well-behaved agent reads as NONE.

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::is_valid_address;
use crate::core::orchestrator::Orchestrator;
use crate::core::risk_score::{RiskRule, RuleHit, RuleSet, ScoreResult, Severity};
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource, RiskLevel};
use crate::providers::{ContractExplorer, ExplorerTx};

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentScoreInput {
    pub agent_id: String,
    pub chain: Chain,
}

/// Explorer history reduced to what the rules need
#[derive(Debug, Clone, PartialEq)]
pub struct TxHistory {
    pub total: usize,
    pub failed: usize,
    /// Days since the first transaction, `None` without any transaction
    pub age_days: Option<i64>,
}

impl TxHistory {
    pub fn from_transactions(txs: &[ExplorerTx], now: i64) -> Self {
        Self {
            total: txs.len(),
            failed: txs.iter().filter(|t| t.failed).count(),
            age_days: txs
                .iter()
                .map(|t| t.timestamp)
                .min()
                .map(|first| (now - first).max(0) / SECS_PER_DAY),
        }
    }

    pub fn failed_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSignals {
    /// `None` when the agent id is not an address and nothing was queried
    pub history: Option<Probe<TxHistory>>,
}

impl AgentSignals {
    fn observed(&self) -> Option<&TxHistory> {
        self.history.as_ref().and_then(Probe::observed)
    }

    fn failed_rate(&self) -> f64 {
        self.observed().map(TxHistory::failed_rate).unwrap_or(0.0)
    }
}

lazy_static! {
    static ref AGENT_RULES: RuleSet<AgentSignals> = RuleSet::new(vec![
        // No registry lookup yet, so no agent is credited with a stack
        RiskRule::new(
            "no_security_stack",
            -20,
            Severity::Medium,
            "No security stack detected",
            |_: &AgentSignals| true,
        ),
        RiskRule::derived(
            "high_failed_tx_rate",
            |s: &AgentSignals| -((s.failed_rate() * 50.0) as i32),
            Severity::Medium,
            "More than 10% of transactions failed",
            |s: &AgentSignals| s.failed_rate() > 0.1,
        ),
        RiskRule::new(
            "recent_agent",
            -10,
            Severity::Low,
            "Account is less than 30 days old",
            |s: &AgentSignals| s.observed().map_or(false, |h| h.age_days.map_or(true, |d| d < 30)),
        ),
        RiskRule::new(
            "established_agent",
            5,
            Severity::Info,
            "Account has been active for more than 180 days",
            |s: &AgentSignals| s.observed().and_then(|h| h.age_days).map_or(false, |d| d > 180),
        ),
        RiskRule::new(
            "no_onchain_identity",
            -10,
            Severity::Low,
            "Agent id is not an on-chain address - history not checked",
            |s: &AgentSignals| s.history.is_none(),
        ),
    ])
    .with_baseline(100);
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentScoreResult {
    pub agent_id: String,
    pub chain: Chain,
    /// 100 is best
    pub security_score: Option<u8>,
    pub risk_level: Option<RiskLevel>,
    pub factors: Vec<String>,
    pub rules: Vec<RuleHit>,
    pub failed_tx_rate: Option<f64>,
    pub transaction_count: Option<usize>,
    pub account_age_days: Option<i64>,
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub scored_at: i64,
}

fn factor(hit: &RuleHit) -> String {
    format!("{} ({:+})", hit.reason, hit.points)
}

pub struct AgentScorer {
    explorer: Arc<dyn ContractExplorer>,
    timeout: Duration,
}

impl AgentScorer {
    pub fn new(explorer: Arc<dyn ContractExplorer>, timeout: Duration) -> Self {
        Self { explorer, timeout }
    }

    pub fn score(signals: &AgentSignals) -> ScoreResult {
        AGENT_RULES.evaluate(signals)
    }

    pub async fn assess(&self, input: &AgentScoreInput) -> AppResult<AgentScoreResult> {
        let history = if is_valid_address(&input.agent_id) {
            let now = Utc::now().timestamp();
            let address = input.agent_id.to_lowercase();
            let probed = probe(
                "explorer.txlist",
                self.timeout,
                self.explorer.transactions(input.chain, &address),
            )
            .await
            .map(|txs| TxHistory::from_transactions(&txs, now));
            if let Some(reason) = probed.unavailable_reason() {
                return Err(AppError::upstream(reason));
            }
            Some(probed)
        } else {
            None
        };
        let signals = AgentSignals { history };

        let score = Self::score(&signals);
        let level = RiskLevel::from_score(100 - score.score);
        info!(
            "{} Agent {} scored {}/100",
            level.emoji(),
            input.agent_id,
            score.score
        );

        let observed = signals.observed();
        Ok(AgentScoreResult {
            agent_id: input.agent_id.clone(),
            chain: input.chain,
            security_score: Some(score.score),
            risk_level: Some(level),
            factors: score.hits.iter().map(factor).collect(),
            rules: score.hits.clone(),
            failed_tx_rate: observed.map(TxHistory::failed_rate),
            transaction_count: observed.map(|h| h.total),
            account_age_days: observed.and_then(|h| h.age_days),
            unavailable: Vec::new(),
            data_source: DataSource::Live,
            scored_at: Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl Orchestrator for AgentScorer {
    type Input = AgentScoreInput;
    type Output = AgentScoreResult;

    fn name(&self) -> &'static str {
        "agent-score"
    }

    async fn run(&self, input: AgentScoreInput) -> AppResult<AgentScoreResult> {
        self.assess(&input).await
    }

    fn fallback(&self, input: &AgentScoreInput, reason: &AppError) -> AgentScoreResult {
        AgentScoreResult {
            agent_id: input.agent_id.clone(),
            chain: input.chain,
            security_score: None,
            risk_level: None,
            factors: vec!["Transaction history unavailable - score not computed".to_string()],
            rules: Vec::new(),
            failed_tx_rate: None,
            transaction_count: None,
            account_age_days: None,
            unavailable: vec![reason.message.clone()],
            data_source: DataSource::Fallback,
            scored_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn tx(days_ago: i64, failed: bool) -> ExplorerTx {
        ExplorerTx {
            timestamp: NOW - days_ago * SECS_PER_DAY,
            failed,
        }
    }

    fn observed(txs: &[ExplorerTx]) -> AgentSignals {
        AgentSignals {
            history: Some(Probe::Observed(TxHistory::from_transactions(txs, NOW))),
        }
    }

    #[test]
    fn test_established_clean_agent() {
        let signals = observed(&[tx(400, false), tx(10, false)]);
        let score = AgentScorer::score(&signals);
        assert_eq!(score.triggered(), vec!["no_security_stack", "established_agent"]);
        assert_eq!(score.raw_points, 85);
        assert_eq!(score.score, 85);
        assert_eq!(RiskLevel::from_score(100 - score.score), RiskLevel::None);
        assert_eq!(factor(&score.hits[0]), "No security stack detected (-20)");
    }

    #[test]
    fn test_failed_rate_penalty() {
        // 2 of 4 failed -> -25, 60 days old -> no age rule
        let signals = observed(&[tx(60, true), tx(50, true), tx(40, false), tx(1, false)]);
        let score = AgentScorer::score(&signals);
        assert_eq!(score.triggered(), vec!["no_security_stack", "high_failed_tx_rate"]);
        assert_eq!(score.score, 55);
        assert_eq!(RiskLevel::from_score(100 - score.score), RiskLevel::Medium);
        assert_eq!(factor(&score.hits[1]), "More than 10% of transactions failed (-25)");
    }

    #[test]
    fn test_empty_history_counts_as_recent() {
        let score = AgentScorer::score(&observed(&[]));
        assert_eq!(score.triggered(), vec!["no_security_stack", "recent_agent"]);
        assert_eq!(score.score, 70);
    }

    #[test]
    fn test_non_address_agent() {
        let score = AgentScorer::score(&AgentSignals { history: None });
        assert_eq!(score.triggered(), vec!["no_security_stack", "no_onchain_identity"]);
        assert_eq!(score.score, 70);
    }
}
