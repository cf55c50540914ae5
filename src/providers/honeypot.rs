//! honeypot.is client
//!
//! API: https://api.honeypot.is/v2/IsHoneypot?address={token}&chainID={id}
//! Free, no API key required

use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;
use tracing::info;

use super::{get_json, HoneypotOracle};
use crate::models::types::Chain;
use crate::utils::constants::HONEYPOT_API_URL;

#[derive(Debug, Deserialize)]
struct HoneypotResponse {
    #[serde(rename = "honeypotResult", default)]
    honeypot_result: Option<HoneypotVerdict>,
    #[serde(rename = "IsHoneypot", default)]
    is_honeypot_flat: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HoneypotVerdict {
    #[serde(rename = "isHoneypot")]
    is_honeypot: bool,
}

impl HoneypotResponse {
    fn verdict(&self) -> bool {
        self.honeypot_result
            .as_ref()
            .map(|r| r.is_honeypot)
            .or(self.is_honeypot_flat)
            .unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct HoneypotIsClient {
    client: reqwest::Client,
}

impl HoneypotIsClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HoneypotOracle for HoneypotIsClient {
    async fn is_honeypot(&self, chain: Chain, address: &str) -> Result<bool> {
        let url = format!("{}?address={}&chainID={}", HONEYPOT_API_URL, address, chain.chain_id());
        let response: HoneypotResponse = get_json(&self.client, &url).await?;
        let verdict = response.verdict();
        if verdict {
            info!("🍯 honeypot.is flags {} on {}", address, chain);
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_and_flat_shapes() {
        let nested: HoneypotResponse =
            serde_json::from_str(r#"{"honeypotResult":{"isHoneypot":true}}"#).unwrap();
        assert!(nested.verdict());

        let flat: HoneypotResponse = serde_json::from_str(r#"{"IsHoneypot":true}"#).unwrap();
        assert!(flat.verdict());

        let empty: HoneypotResponse = serde_json::from_str(r#"{"token":{}}"#).unwrap();
        assert!(!empty.verdict());
    }
}
