//! Market data sources: ETH/USD tickers and the beacon chain validator queue
//!
//! Each ticker is independent; the price orchestrator averages whichever
//! ones answer.

use async_trait::async_trait;
use eyre::{eyre, Result};
use serde::Deserialize;
use std::collections::HashMap;

use super::{get_json, PriceSource, ValidatorQueue, ValidatorQueueSource};
use crate::utils::constants::{BEACON_QUEUE_URL, COINBASE_ETH_URL, COINGECKO_ETH_URL, KRAKEN_ETH_URL};

// ============================================
// CoinGecko
// ============================================

#[derive(Clone)]
pub struct CoinGeckoPrice {
    client: reqwest::Client,
}

impl CoinGeckoPrice {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// `{"ethereum":{"usd":1234.5}}`
fn parse_coingecko(body: HashMap<String, HashMap<String, f64>>) -> Result<f64> {
    body.get("ethereum")
        .and_then(|eth| eth.get("usd"))
        .copied()
        .ok_or_else(|| eyre!("price not found"))
}

#[async_trait]
impl PriceSource for CoinGeckoPrice {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn eth_usd(&self) -> Result<f64> {
        parse_coingecko(get_json(&self.client, COINGECKO_ETH_URL).await?)
    }
}

// ============================================
// Coinbase
// ============================================

#[derive(Debug, Deserialize)]
struct CoinbaseBody {
    data: CoinbaseRates,
}

#[derive(Debug, Deserialize)]
struct CoinbaseRates {
    rates: HashMap<String, String>,
}

#[derive(Clone)]
pub struct CoinbasePrice {
    client: reqwest::Client,
}

impl CoinbasePrice {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_coinbase(body: CoinbaseBody) -> Result<f64> {
    let rate = body.data.rates.get("USD").ok_or_else(|| eyre!("rate not found"))?;
    rate.parse().map_err(|e| eyre!("Invalid USD rate '{}': {}", rate, e))
}

#[async_trait]
impl PriceSource for CoinbasePrice {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    async fn eth_usd(&self) -> Result<f64> {
        parse_coinbase(get_json(&self.client, COINBASE_ETH_URL).await?)
    }
}

// ============================================
// Kraken
// ============================================

#[derive(Debug, Deserialize)]
struct KrakenBody {
    #[serde(default)]
    result: HashMap<String, KrakenTicker>,
}

#[derive(Debug, Deserialize)]
struct KrakenTicker {
    /// Last trade closed: [price, lot volume]
    c: Vec<String>,
}

#[derive(Clone)]
pub struct KrakenPrice {
    client: reqwest::Client,
}

impl KrakenPrice {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_kraken(body: KrakenBody) -> Result<f64> {
    let last = body
        .result
        .values()
        .find_map(|t| t.c.first())
        .ok_or_else(|| eyre!("ticker not found"))?;
    last.parse().map_err(|e| eyre!("Invalid ticker price '{}': {}", last, e))
}

#[async_trait]
impl PriceSource for KrakenPrice {
    fn name(&self) -> &'static str {
        "kraken"
    }

    async fn eth_usd(&self) -> Result<f64> {
        parse_kraken(get_json(&self.client, KRAKEN_ETH_URL).await?)
    }
}

// ============================================
// beaconcha.in validator queue
// ============================================

#[derive(Debug, Deserialize)]
struct BeaconEnvelope {
    data: BeaconQueueData,
}

#[derive(Debug, Deserialize)]
struct BeaconQueueData {
    beaconchain_entering: u64,
    beaconchain_exiting: u64,
    validatorscount: u64,
}

#[derive(Clone)]
pub struct BeaconchainQueue {
    client: reqwest::Client,
}

impl BeaconchainQueue {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ValidatorQueueSource for BeaconchainQueue {
    async fn queue(&self) -> Result<ValidatorQueue> {
        let body: BeaconEnvelope = get_json(&self.client, BEACON_QUEUE_URL).await?;
        Ok(ValidatorQueue {
            entering: body.data.beaconchain_entering,
            exiting: body.data.beaconchain_exiting,
            active: body.data.validatorscount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_shapes() {
        let gecko = serde_json::from_str(r#"{"ethereum":{"usd":3120.55}}"#).unwrap();
        assert_eq!(parse_coingecko(gecko).unwrap(), 3120.55);

        let coinbase: CoinbaseBody =
            serde_json::from_str(r#"{"data":{"currency":"ETH","rates":{"USD":"3121.10"}}}"#).unwrap();
        assert_eq!(parse_coinbase(coinbase).unwrap(), 3121.10);

        let kraken: KrakenBody =
            serde_json::from_str(r#"{"error":[],"result":{"XETHZUSD":{"c":["3119.90","0.5"]}}}"#).unwrap();
        assert_eq!(parse_kraken(kraken).unwrap(), 3119.90);
    }

    #[test]
    fn test_missing_price_is_error() {
        let gecko = serde_json::from_str(r#"{"bitcoin":{"usd":1.0}}"#).unwrap();
        assert!(parse_coingecko(gecko).is_err());
        let kraken: KrakenBody = serde_json::from_str(r#"{"error":["EQuery:Unknown asset pair"]}"#).unwrap();
        assert!(parse_kraken(kraken).is_err());
    }

    #[test]
    fn test_beacon_queue_shape() {
        let body: BeaconEnvelope = serde_json::from_str(
            r#"{"status":"OK","data":{"beaconchain_entering":1200,"beaconchain_exiting":300,"validatorscount":1050000}}"#,
        )
        .unwrap();
        assert_eq!(body.data.validatorscount, 1_050_000);
    }
}
