//! JSON-RPC client for Ethereum and Base
//!
//! One reqwest client, one URL per chain. Quantities come back as hex strings
//! and are parsed here so scanners only see numbers.

use alloy_primitives::U256;
use async_trait::async_trait;
use eyre::{eyre, Result};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use super::{CallRequest, ChainRpc, GasEstimate, TokenBalance};
use crate::models::types::Chain;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResult {
    #[serde(default)]
    token_balances: Vec<RawTokenBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenBalance {
    contract_address: String,
    #[serde(default)]
    token_balance: Option<String>,
}

#[derive(Clone)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    eth_url: String,
    base_url: String,
}

impl JsonRpcClient {
    pub fn new(client: reqwest::Client, eth_url: String, base_url: String) -> Self {
        Self {
            client,
            eth_url,
            base_url,
        }
    }

    fn url(&self, chain: Chain) -> &str {
        match chain {
            Chain::Ethereum => &self.eth_url,
            Chain::Base => &self.base_url,
        }
    }

    /// Execute single RPC call
    pub async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        chain: Chain,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        self.call_raw(chain, method, params)
            .await?
            .map_err(|error| eyre!("RPC error: {} (code: {})", error.message, error.code))
    }

    /// Transport failures are `Err`; a JSON-RPC error object is the inner `Err`
    async fn call_raw<T: for<'de> Deserialize<'de>>(
        &self,
        chain: Chain,
        method: &str,
        params: serde_json::Value,
    ) -> Result<std::result::Result<T, RpcError>> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!("📡 RPC {} on {}", method, chain);

        let response = self
            .client
            .post(self.url(chain))
            .json(&payload)
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

        let json: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse response: {}", e))?;

        if let Some(error) = json.error {
            return Ok(Err(error));
        }

        json.result.map(Ok).ok_or_else(|| eyre!("No result in response"))
    }
}

/// Parse a hex quantity ("0x1a") into u128
pub fn parse_hex_u128(raw: &str) -> Result<u128> {
    let digits = raw.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| eyre!("Invalid hex quantity '{}': {}", raw, e))
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn gas_price_wei(&self, chain: Chain) -> Result<u128> {
        let raw: String = self.call(chain, "eth_gasPrice", serde_json::json!([])).await?;
        parse_hex_u128(&raw)
    }

    async fn code_at(&self, chain: Chain, address: &str) -> Result<String> {
        self.call(chain, "eth_getCode", serde_json::json!([address, "latest"]))
            .await
    }

    async fn estimate_gas(&self, chain: Chain, call: &CallRequest) -> Result<GasEstimate> {
        let mut tx = serde_json::json!({
            "to": call.to,
            "value": format!("0x{:x}", call.value),
            "data": format!("0x{}", hex::encode(&call.data)),
        });
        if let Some(from) = &call.from {
            tx["from"] = serde_json::Value::String(from.clone());
        }

        // A node-side error here means the call itself reverts
        let raw: String = match self.call_raw(chain, "eth_estimateGas", serde_json::json!([tx])).await? {
            Ok(raw) => raw,
            Err(error) => return Ok(GasEstimate::Reverted(error.message)),
        };
        let gas = parse_hex_u128(&raw)?;
        let gas = u64::try_from(gas).map_err(|_| eyre!("Gas estimate out of range: {}", raw))?;
        Ok(GasEstimate::Gas(gas))
    }

    async fn balance_wei(&self, chain: Chain, address: &str) -> Result<U256> {
        let raw: String = self
            .call(chain, "eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        U256::from_str(raw.trim()).map_err(|e| eyre!("Invalid balance '{}': {}", raw, e))
    }

    async fn token_balances(&self, chain: Chain, address: &str) -> Result<Vec<TokenBalance>> {
        let result: TokenBalancesResult = self
            .call(chain, "alchemy_getTokenBalances", serde_json::json!([address, "erc20"]))
            .await?;

        Ok(result
            .token_balances
            .into_iter()
            .filter_map(|b| {
                let balance = b.token_balance?;
                // Zero balances are reported too
                if parse_hex_u128(&balance).map(|v| v == 0).unwrap_or(false) {
                    return None;
                }
                Some(TokenBalance {
                    contract: b.contract_address.to_lowercase(),
                    balance,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_u128("0x0").unwrap(), 0);
        assert_eq!(parse_hex_u128("0x").unwrap(), 0);
        assert_eq!(parse_hex_u128("0x5d21dba00").unwrap(), 25_000_000_000);
        assert!(parse_hex_u128("0xzz").is_err());
    }

    #[test]
    fn test_rpc_response_error_shape() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#;
        let parsed: RpcResponse<String> = serde_json::from_str(raw).unwrap();
        assert!(parsed.result.is_none());
        assert_eq!(parsed.error.unwrap().code, -32000);
    }
}
