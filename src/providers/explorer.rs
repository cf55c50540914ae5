//! Etherscan-family explorer client (Etherscan for Ethereum, Basescan for Base)
//!
//! API: `<base>?module=...&action=...&address=...&apikey=...`
//! Responses wrap everything in `{status, message, result}`; status "0" is
//! either "no data" or a real error depending on `result`.

use async_trait::async_trait;
use eyre::{eyre, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{get_json, ContractExplorer, ExplorerTx};
use crate::models::types::Chain;
use crate::utils::constants::{BASESCAN_API_URL, ETHERSCAN_API_URL};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: String,
    result: T,
}

#[derive(Debug, Deserialize)]
struct SourceCodeEntry {
    #[serde(rename = "Proxy", default)]
    proxy: String,
}

#[derive(Debug, Deserialize)]
struct RawTx {
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    #[serde(rename = "isError", default)]
    is_error: String,
}

#[derive(Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    etherscan_key: Option<String>,
    basescan_key: Option<String>,
}

impl EtherscanClient {
    pub fn new(
        client: reqwest::Client,
        etherscan_key: Option<String>,
        basescan_key: Option<String>,
    ) -> Self {
        if etherscan_key.is_none() || basescan_key.is_none() {
            warn!("⚠️ Explorer API key missing, explorer lookups will be rate limited");
        }
        Self {
            client,
            etherscan_key,
            basescan_key,
        }
    }

    fn endpoint(&self, chain: Chain) -> (&'static str, &str) {
        match chain {
            Chain::Ethereum => (ETHERSCAN_API_URL, self.etherscan_key.as_deref().unwrap_or("")),
            Chain::Base => (BASESCAN_API_URL, self.basescan_key.as_deref().unwrap_or("")),
        }
    }

    fn url(&self, chain: Chain, query: &str) -> String {
        let (base, key) = self.endpoint(chain);
        format!("{}?{}&apikey={}", base, query, key)
    }
}

/// Interpret a `getabi` envelope: verified ABI, unverified, or an API error
fn abi_from_envelope(env: Envelope<String>) -> Result<Option<String>> {
    if env.status == "1" {
        return Ok(Some(env.result));
    }
    if env.result.contains("not verified") {
        return Ok(None);
    }
    Err(eyre!("Explorer error: {} ({})", env.message, env.result))
}

#[async_trait]
impl ContractExplorer for EtherscanClient {
    async fn contract_abi(&self, chain: Chain, address: &str) -> Result<Option<String>> {
        let url = self.url(chain, &format!("module=contract&action=getabi&address={}", address));
        let env: Envelope<String> = get_json(&self.client, &url).await?;
        let abi = abi_from_envelope(env)?;
        debug!("🔍 Explorer ABI for {} on {}: verified={}", address, chain, abi.is_some());
        Ok(abi)
    }

    async fn is_proxy(&self, chain: Chain, address: &str) -> Result<bool> {
        let url = self.url(
            chain,
            &format!("module=contract&action=getsourcecode&address={}", address),
        );
        let env: Envelope<serde_json::Value> = get_json(&self.client, &url).await?;
        if env.status != "1" {
            return Err(eyre!("Explorer error: {} ({})", env.message, env.result));
        }
        let entries: Vec<SourceCodeEntry> = serde_json::from_value(env.result)
            .map_err(|e| eyre!("Unexpected getsourcecode shape: {}", e))?;
        Ok(entries.first().map(|e| e.proxy == "1").unwrap_or(false))
    }

    async fn transactions(&self, chain: Chain, address: &str) -> Result<Vec<ExplorerTx>> {
        let url = self.url(
            chain,
            &format!(
                "module=account&action=txlist&address={}&startblock=0&endblock=99999999&page=1&offset=1000&sort=asc",
                address
            ),
        );
        let env: Envelope<serde_json::Value> = get_json(&self.client, &url).await?;
        if env.status != "1" {
            // "No transactions found" is an empty history, not an error
            if env.message.contains("No transactions") {
                return Ok(Vec::new());
            }
            return Err(eyre!("Explorer error: {} ({})", env.message, env.result));
        }
        let raw: Vec<RawTx> = serde_json::from_value(env.result)
            .map_err(|e| eyre!("Unexpected txlist shape: {}", e))?;

        raw.into_iter()
            .map(|tx| {
                let timestamp = tx
                    .time_stamp
                    .parse::<i64>()
                    .map_err(|e| eyre!("Invalid timeStamp '{}': {}", tx.time_stamp, e))?;
                Ok(ExplorerTx {
                    timestamp,
                    failed: tx.is_error == "1",
                })
            })
            .collect()
    }
}
