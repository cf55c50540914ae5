//! Market data orchestrators: gas prices, validator queue, ETH/USD
//!
//! No scoring here. Each one wraps a single upstream (or a fan-out over
//! tickers) and has a fixed "estimated" payload for when the upstream is down.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::orchestrator::Orchestrator;
use crate::core::signals::{probe, Probe};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, DataSource};
use crate::providers::{ChainRpc, PriceSource, ValidatorQueue, ValidatorQueueSource};
use crate::utils::constants::{round_to, wei_to_gwei, EPOCHS_PER_HOUR, VALIDATOR_CHURN_PER_EPOCH};

// ============================================
// Gas
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasPrices {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    pub safe: f64,
    pub average: f64,
    pub fast: f64,
}

impl GasPrices {
    pub fn from_gwei(current: f64) -> Self {
        Self {
            current: Some(round_to(current, 2)),
            safe: round_to(current * 0.9, 2),
            average: round_to(current, 2),
            fast: round_to(current * 1.2, 2),
        }
    }

    pub fn estimated() -> Self {
        Self {
            current: None,
            safe: 0.25,
            average: 0.35,
            fast: 0.50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GasData {
    pub gas: GasPrices,
    pub unit: &'static str,
    pub source: &'static str,
    pub data_source: DataSource,
    pub timestamp: i64,
}

pub struct GasOracle {
    rpc: Arc<dyn ChainRpc>,
    timeout: Duration,
}

impl GasOracle {
    pub fn new(rpc: Arc<dyn ChainRpc>, timeout: Duration) -> Self {
        Self { rpc, timeout }
    }
}

#[async_trait]
impl Orchestrator for GasOracle {
    type Input = ();
    type Output = GasData;

    fn name(&self) -> &'static str {
        "gas"
    }

    async fn run(&self, _: ()) -> AppResult<GasData> {
        let wei = match probe("eth_gasPrice", self.timeout, self.rpc.gas_price_wei(Chain::Ethereum)).await {
            Probe::Observed(wei) => wei,
            Probe::Unavailable(reason) => return Err(AppError::upstream(reason)),
        };
        let gas = GasPrices::from_gwei(wei_to_gwei(wei));
        info!("⛽ Gas price: {:?} gwei", gas.current);

        Ok(GasData {
            gas,
            unit: "gwei",
            source: "ethereum_mainnet",
            data_source: DataSource::Live,
            timestamp: Utc::now().timestamp(),
        })
    }

    fn fallback(&self, _: &(), _: &AppError) -> GasData {
        GasData {
            gas: GasPrices::estimated(),
            unit: "gwei",
            source: "estimated",
            data_source: DataSource::Fallback,
            timestamp: Utc::now().timestamp(),
        }
    }
}

// ============================================
// Validator queue
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entering: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exiting: Option<u64>,
    pub entry_wait_hours: f64,
    pub exit_wait_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatorData {
    pub queue: QueueStatus,
    pub active_validators: u64,
    pub source: &'static str,
    pub data_source: DataSource,
    pub timestamp: i64,
}

/// Hours to drain `pending` validators at the churn limit
pub fn wait_hours(pending: u64) -> f64 {
    round_to(pending as f64 / (VALIDATOR_CHURN_PER_EPOCH * EPOCHS_PER_HOUR), 1)
}

impl QueueStatus {
    pub fn from_queue(q: &ValidatorQueue) -> Self {
        Self {
            entering: Some(q.entering),
            exiting: Some(q.exiting),
            entry_wait_hours: wait_hours(q.entering),
            exit_wait_hours: wait_hours(q.exiting),
        }
    }
}

pub struct ValidatorQueueMonitor {
    source: Arc<dyn ValidatorQueueSource>,
    timeout: Duration,
}

impl ValidatorQueueMonitor {
    pub fn new(source: Arc<dyn ValidatorQueueSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }
}

#[async_trait]
impl Orchestrator for ValidatorQueueMonitor {
    type Input = ();
    type Output = ValidatorData;

    fn name(&self) -> &'static str {
        "validators"
    }

    async fn run(&self, _: ()) -> AppResult<ValidatorData> {
        let queue = match probe("beaconchain.queue", self.timeout, self.source.queue()).await {
            Probe::Observed(q) => q,
            Probe::Unavailable(reason) => return Err(AppError::upstream(reason)),
        };
        info!(
            "🧱 Validator queue: {} entering, {} exiting",
            queue.entering, queue.exiting
        );

        Ok(ValidatorData {
            queue: QueueStatus::from_queue(&queue),
            active_validators: queue.active,
            source: "beaconcha.in",
            data_source: DataSource::Live,
            timestamp: Utc::now().timestamp(),
        })
    }

    fn fallback(&self, _: &(), _: &AppError) -> ValidatorData {
        ValidatorData {
            queue: QueueStatus {
                entering: None,
                exiting: None,
                entry_wait_hours: 4.0,
                exit_wait_hours: 2.0,
            },
            active_validators: 1_048_576,
            source: "estimated",
            data_source: DataSource::Fallback,
            timestamp: Utc::now().timestamp(),
        }
    }
}

// ============================================
// ETH/USD
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct PriceData {
    pub eth_usd: Option<f64>,
    /// Per-source quotes that answered
    pub sources: BTreeMap<String, f64>,
    pub unavailable: Vec<String>,
    pub data_source: DataSource,
    pub timestamp: i64,
}

pub struct EthPriceFeed {
    sources: Vec<Arc<dyn PriceSource>>,
    timeout: Duration,
}

impl EthPriceFeed {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }
}

#[async_trait]
impl Orchestrator for EthPriceFeed {
    type Input = ();
    type Output = PriceData;

    fn name(&self) -> &'static str {
        "eth-price"
    }

    async fn run(&self, _: ()) -> AppResult<PriceData> {
        let quotes = join_all(self.sources.iter().map(|source| async move {
            (source.name(), probe(source.name(), self.timeout, source.eth_usd()).await)
        }))
        .await;

        let mut sources = BTreeMap::new();
        let mut unavailable = Vec::new();
        for (name, quote) in quotes {
            match quote {
                Probe::Observed(price) => {
                    sources.insert(name.to_string(), price);
                }
                Probe::Unavailable(reason) => unavailable.push(reason),
            }
        }

        if sources.is_empty() {
            return Err(AppError::upstream(format!(
                "Failed to fetch price from all sources: {}",
                unavailable.join("; ")
            )));
        }

        let average = sources.values().sum::<f64>() / sources.len() as f64;
        info!("💰 ETH/USD {:.2} from {} sources", average, sources.len());

        Ok(PriceData {
            eth_usd: Some(round_to(average, 2)),
            sources,
            unavailable,
            data_source: DataSource::Live,
            timestamp: Utc::now().timestamp(),
        })
    }

    fn fallback(&self, _: &(), reason: &AppError) -> PriceData {
        PriceData {
            eth_usd: None,
            sources: BTreeMap::new(),
            unavailable: vec![reason.message.clone()],
            data_source: DataSource::Fallback,
            timestamp: Utc::now().timestamp(),
        }
    }
}
