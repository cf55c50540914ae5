//! Providers Module - External Data Sources
//!
//! Jalur data: JSON-RPC, block explorers, honeypot oracle, price tickers dan
//! validator queue. Scanners only see the traits below, so tests swap in mocks.

pub mod explorer;
pub mod honeypot;
pub mod market;
pub mod rpc;

use alloy_primitives::U256;
use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::config::UpstreamConfig;
use crate::models::types::Chain;
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

pub use explorer::EtherscanClient;
pub use honeypot::HoneypotIsClient;
pub use market::{BeaconchainQueue, CoinbasePrice, CoinGeckoPrice, KrakenPrice};
pub use rpc::JsonRpcClient;

/// Transaction shape handed to `eth_estimateGas`
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub from: Option<String>,
    pub to: String,
    pub value: U256,
    pub data: Vec<u8>,
}

/// Outcome of `eth_estimateGas` when the node answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasEstimate {
    Gas(u64),
    /// The node rejected the call (revert, insufficient funds, ...)
    Reverted(String),
}

/// One ERC-20 balance reported for a wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBalance {
    pub contract: String,
    /// Raw balance as returned by the node (hex)
    pub balance: String,
}

/// One historical transaction from the explorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorerTx {
    /// Unix seconds
    pub timestamp: i64,
    pub failed: bool,
}

/// Beacon chain activation/exit queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorQueue {
    pub entering: u64,
    pub exiting: u64,
    pub active: u64,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn gas_price_wei(&self, chain: Chain) -> Result<u128>;
    /// Deployed bytecode as hex ("0x" for an EOA)
    async fn code_at(&self, chain: Chain, address: &str) -> Result<String>;
    async fn estimate_gas(&self, chain: Chain, call: &CallRequest) -> Result<GasEstimate>;
    async fn balance_wei(&self, chain: Chain, address: &str) -> Result<U256>;
    async fn token_balances(&self, chain: Chain, address: &str) -> Result<Vec<TokenBalance>>;
}

#[async_trait]
pub trait ContractExplorer: Send + Sync {
    /// Verified ABI JSON, or `None` when the source is not verified
    async fn contract_abi(&self, chain: Chain, address: &str) -> Result<Option<String>>;
    async fn is_proxy(&self, chain: Chain, address: &str) -> Result<bool>;
    /// Oldest first
    async fn transactions(&self, chain: Chain, address: &str) -> Result<Vec<ExplorerTx>>;
}

#[async_trait]
pub trait HoneypotOracle: Send + Sync {
    async fn is_honeypot(&self, chain: Chain, address: &str) -> Result<bool>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn eth_usd(&self) -> Result<f64>;
}

#[async_trait]
pub trait ValidatorQueueSource: Send + Sync {
    async fn queue(&self) -> Result<ValidatorQueue>;
}

/// Every upstream collaborator the scanners need
#[derive(Clone)]
pub struct Providers {
    pub rpc: Arc<dyn ChainRpc>,
    pub explorer: Arc<dyn ContractExplorer>,
    pub honeypot: Arc<dyn HoneypotOracle>,
    pub prices: Vec<Arc<dyn PriceSource>>,
    pub validators: Arc<dyn ValidatorQueueSource>,
}

impl Providers {
    /// Real HTTP-backed providers
    pub fn http(config: &UpstreamConfig) -> Result<Self> {
        let client = build_client(config.timeout)?;

        Ok(Self {
            rpc: Arc::new(JsonRpcClient::new(
                client.clone(),
                config.eth_rpc_url.clone(),
                config.base_rpc_url.clone(),
            )),
            explorer: Arc::new(EtherscanClient::new(
                client.clone(),
                config.etherscan_api_key.clone(),
                config.basescan_api_key.clone(),
            )),
            honeypot: Arc::new(HoneypotIsClient::new(client.clone())),
            prices: vec![
                Arc::new(CoinGeckoPrice::new(client.clone())),
                Arc::new(CoinbasePrice::new(client.clone())),
                Arc::new(KrakenPrice::new(client.clone())),
            ],
            validators: Arc::new(BeaconchainQueue::new(client)),
        })
    }
}

/// Shared HTTP client: gzip, fixed User-Agent, per-request timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| eyre!("Failed to build HTTP client: {}", e))
}

/// GET a URL and decode the JSON body, treating non-2xx as an error
pub(crate) async fn get_json<T: for<'de> serde::Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| eyre!("Request failed: {}", e))?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(eyre!("Rate limited (HTTP 429)"));
    }
    if !status.is_success() {
        return Err(eyre!("HTTP error: {}", status));
    }

    response
        .json()
        .await
        .map_err(|e| eyre!("Failed to parse response: {}", e))
}
