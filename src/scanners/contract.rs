//! Contract scanner
//!
//! Signals: explorer verification, explorer proxy flag, honeypot oracle.
//! Complete results are cached per `contract:<chain>:<address>`; a result with
//! any unavailable signal is served but not cached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{collect_unavailable, RiskReport};
use crate::core::orchestrator::Orchestrator;
use crate::core::risk_score::{RiskRule, RuleSet, Severity};
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource};
use crate::providers::{ContractExplorer, HoneypotOracle};
use crate::utils::cache::ExpiringCache;

#[derive(Debug, Clone, PartialEq)]
pub struct ContractScanInput {
    /// Lowercased 0x address
    pub address: String,
    pub chain: Chain,
}

#[derive(Debug, Clone)]
pub struct ContractSignals {
    pub verified: Probe<bool>,
    pub proxy: Probe<bool>,
    pub honeypot: Probe<bool>,
}

lazy_static! {
    static ref CONTRACT_RULES: RuleSet<ContractSignals> = RuleSet::new(vec![
        RiskRule::new(
            "unverified_contract",
            30,
            Severity::High,
            "Contract source code is not verified",
            |s: &ContractSignals| s.verified.is_false(),
        ),
        RiskRule::new(
            "honeypot_indicators",
            50,
            Severity::Critical,
            "Honeypot patterns detected - extreme caution",
            |s: &ContractSignals| s.honeypot.is_true(),
        ),
        RiskRule::new(
            "proxy_contract",
            0,
            Severity::Info,
            "Contract is a proxy - check implementation",
            |s: &ContractSignals| s.proxy.is_true(),
        ),
    ]);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractScanResult {
    pub address: String,
    pub chain: Chain,
    #[serde(flatten)]
    pub risk: RiskReport,
    pub is_verified: Option<bool>,
    pub is_proxy: Option<bool>,
    pub is_honeypot: Option<bool>,
    /// Signals that could not be observed
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub scanned_at: i64,
}

pub struct ContractScanner {
    explorer: Arc<dyn ContractExplorer>,
    honeypot: Arc<dyn HoneypotOracle>,
    cache: Arc<ExpiringCache<ContractScanResult>>,
    timeout: Duration,
}

pub fn cache_key(chain: Chain, address: &str) -> String {
    format!("contract:{}:{}", chain, address.to_lowercase())
}

impl ContractScanner {
    pub fn new(
        explorer: Arc<dyn ContractExplorer>,
        honeypot: Arc<dyn HoneypotOracle>,
        cache: Arc<ExpiringCache<ContractScanResult>>,
        timeout: Duration,
    ) -> Self {
        Self {
            explorer,
            honeypot,
            cache,
            timeout,
        }
    }

    async fn collect(&self, input: &ContractScanInput) -> ContractSignals {
        let addr = input.address.as_str();
        let (verified, proxy, honeypot) = tokio::join!(
            probe(
                "explorer.getabi",
                self.timeout,
                async {
                    Ok::<_, eyre::Report>(self.explorer.contract_abi(input.chain, addr).await?.is_some())
                },
            ),
            probe(
                "explorer.getsourcecode",
                self.timeout,
                self.explorer.is_proxy(input.chain, addr),
            ),
            probe(
                "honeypot.is",
                self.timeout,
                self.honeypot.is_honeypot(input.chain, addr),
            ),
        );
        ContractSignals {
            verified,
            proxy,
            honeypot,
        }
    }

    pub fn score(signals: &ContractSignals) -> crate::core::risk_score::ScoreResult {
        CONTRACT_RULES.evaluate(signals)
    }

    /// Fails only when no signal at all could be observed
    pub async fn scan(&self, input: &ContractScanInput) -> AppResult<ContractScanResult> {
        let key = cache_key(input.chain, &input.address);
        if let Some(hit) = self.cache.lookup(&key) {
            info!("✅ Contract scan served from cache: {}", key);
            return Ok(ContractScanResult {
                data_source: DataSource::Cached,
                cached: true,
                cached_at: Some(hit.stored_at),
                ..hit.value
            });
        }

        let signals = self.collect(input).await;
        let score = Self::score(&signals);
        let unavailable = collect_unavailable([
            signals.verified.unavailable_reason(),
            signals.proxy.unavailable_reason(),
            signals.honeypot.unavailable_reason(),
        ]);
        if unavailable.len() == 3 {
            return Err(AppError::upstream(unavailable.join("; ")));
        }

        let result = ContractScanResult {
            address: input.address.clone(),
            chain: input.chain,
            risk: RiskReport::from(&score),
            is_verified: signals.verified.observed().copied(),
            is_proxy: signals.proxy.observed().copied(),
            is_honeypot: signals.honeypot.observed().copied(),
            unavailable,
            data_source: DataSource::Live,
            cached: false,
            cached_at: None,
            scanned_at: Utc::now().timestamp(),
        };

        info!(
            "{} Contract {} on {}: score {} ({})",
            score.level.emoji(),
            input.address,
            input.chain,
            score.score,
            score.level
        );

        if result.unavailable.is_empty() {
            self.cache.set(key, result.clone());
        }
        Ok(result)
    }
}

#[async_trait]
impl Orchestrator for ContractScanner {
    type Input = ContractScanInput;
    type Output = ContractScanResult;

    fn name(&self) -> &'static str {
        "scan-contract"
    }

    async fn run(&self, input: ContractScanInput) -> AppResult<ContractScanResult> {
        self.scan(&input).await
    }

    fn fallback(&self, input: &ContractScanInput, reason: &AppError) -> ContractScanResult {
        ContractScanResult {
            address: input.address.clone(),
            chain: input.chain,
            risk: RiskReport::unknown(),
            is_verified: None,
            is_proxy: None,
            is_honeypot: None,
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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    const ADDR: &str = "0x1111111111111111111111111111111111111111";

    /// Explorer whose n-th call answers `verified[n]` after an optional delay
    struct ScriptedExplorer {
        calls: AtomicUsize,
        verified: Vec<bool>,
        delays_ms: Vec<u64>,
        barrier: Option<Arc<Barrier>>,
    }

    #[async_trait]
    impl ContractExplorer for ScriptedExplorer {
        async fn contract_abi(&self, _: Chain, _: &str) -> eyre::Result<Option<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(b) = &self.barrier {
                b.wait().await;
            }
            tokio::time::sleep(Duration::from_millis(self.delays_ms[n])).await;
            Ok(self.verified[n].then(|| "[]".to_string()))
        }
        async fn is_proxy(&self, _: Chain, _: &str) -> eyre::Result<bool> {
            Ok(false)
        }
        async fn transactions(&self, _: Chain, _: &str) -> eyre::Result<Vec<crate::providers::ExplorerTx>> {
            Ok(Vec::new())
        }
    }

    struct StaticHoneypot(eyre::Result<bool>);

    #[async_trait]
    impl HoneypotOracle for StaticHoneypot {
        async fn is_honeypot(&self, _: Chain, _: &str) -> eyre::Result<bool> {
            match &self.0 {
                Ok(v) => Ok(*v),
                Err(e) => Err(eyre::eyre!("{}", e)),
            }
        }
    }

    fn scanner(explorer: ScriptedExplorer, honeypot: eyre::Result<bool>) -> ContractScanner {
        ContractScanner::new(
            Arc::new(explorer),
            Arc::new(StaticHoneypot(honeypot)),
            Arc::new(ExpiringCache::new("contract", Duration::from_secs(60))),
            Duration::from_secs(1),
        )
    }

    fn input() -> ContractScanInput {
        ContractScanInput {
            address: ADDR.to_string(),
            chain: Chain::Base,
        }
    }

    #[test]
    fn test_rules_accumulate() {
        let signals = ContractSignals {
            verified: Probe::Observed(false),
            proxy: Probe::Observed(true),
            honeypot: Probe::Observed(true),
        };
        let score = ContractScanner::score(&signals);
        assert_eq!(score.score, 80);
        assert_eq!(score.level, RiskLevel::Critical);
        assert_eq!(
            score.triggered(),
            vec!["unverified_contract", "honeypot_indicators", "proxy_contract"]
        );
    }

    #[test]
    fn test_unavailable_is_not_negative() {
        let signals = ContractSignals {
            verified: Probe::Unavailable("explorer down".into()),
            proxy: Probe::Unavailable("explorer down".into()),
            honeypot: Probe::Observed(false),
        };
        let score = ContractScanner::score(&signals);
        assert_eq!(score.score, 0);
        assert!(score.hits.is_empty());
    }

    #[tokio::test]
    async fn test_second_scan_is_cached() {
        let s = scanner(
            ScriptedExplorer {
                calls: AtomicUsize::new(0),
                verified: vec![true],
                delays_ms: vec![0],
                barrier: None,
            },
            Ok(false),
        );
        let first = s.scan(&input()).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.data_source, DataSource::Live);

        let second = s.scan(&input()).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.data_source, DataSource::Cached);
        assert!(second.cached_at.is_some());
        assert_eq!(second.risk, first.risk);
    }

    #[tokio::test]
    async fn test_degraded_result_not_cached() {
        let s = scanner(
            ScriptedExplorer {
                calls: AtomicUsize::new(0),
                verified: vec![true, true],
                delays_ms: vec![0, 0],
                barrier: None,
            },
            Err(eyre::eyre!("HTTP 503")),
        );
        let first = s.scan(&input()).await.unwrap();
        assert_eq!(first.unavailable.len(), 1);
        assert!(first.is_honeypot.is_none());
        assert!(!s.scan(&input()).await.unwrap().cached);
    }

    #[tokio::test]
    async fn test_concurrent_scans_last_writer_wins() {
        let s = Arc::new(scanner(
            ScriptedExplorer {
                calls: AtomicUsize::new(0),
                // first caller sees a verified contract, second an unverified one and writes later
                verified: vec![true, false],
                delays_ms: vec![0, 50],
                barrier: Some(Arc::new(Barrier::new(2))),
            },
            Ok(false),
        ));

        let (a, b) = tokio::join!(
            {
                let s = Arc::clone(&s);
                async move { s.scan(&input()).await.unwrap() }
            },
            {
                let s = Arc::clone(&s);
                async move { s.scan(&input()).await.unwrap() }
            }
        );
        assert!(!a.cached && !b.cached, "both scans computed independently");

        let third = s.scan(&input()).await.unwrap();
        assert!(third.cached);
        assert_eq!(third.is_verified, Some(false));
        assert!(third.risk.flags.contains(&"unverified_contract".to_string()));
    }
}
