//! Address labels
//!
//! Static table of well-known Base contracts. Lookups never leave the process.

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::core::orchestrator::Orchestrator;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::DataSource;

#[derive(Debug, Clone, PartialEq)]
pub struct AddressLabelInput {
    /// Lowercased 0x address
    pub address: String,
}

struct KnownLabel {
    labels: &'static [&'static str],
    entity: &'static str,
    category: &'static str,
    risk_level: &'static str,
    confidence: f64,
    sources: &'static [&'static str],
}

lazy_static! {
    static ref KNOWN_LABELS: HashMap<&'static str, KnownLabel> = {
        let mut m = HashMap::new();
        // Base WETH
        m.insert(
            "0x4200000000000000000000000000000000000006",
            KnownLabel {
                labels: &["weth", "wrapped-ether"],
                entity: "Wrapped Ether",
                category: "contract",
                risk_level: "low",
                confidence: 1.0,
                sources: &["official"],
            },
        );
        // Base USDC
        m.insert(
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
            KnownLabel {
                labels: &["usdc", "stablecoin"],
                entity: "USD Coin",
                category: "contract",
                risk_level: "low",
                confidence: 1.0,
                sources: &["official"],
            },
        );
        m
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressLabelResult {
    pub address: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub category: String,
    pub risk_level: String,
    pub confidence: f64,
    pub sources: Vec<String>,
    pub data_source: DataSource,
    pub checked_at: i64,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct AddressLabeler;

impl AddressLabeler {
    pub fn lookup(&self, address: &str) -> AddressLabelResult {
        let address = address.to_lowercase();
        let checked_at = Utc::now().timestamp();

        match KNOWN_LABELS.get(address.as_str()) {
            Some(known) => {
                debug!("🏷️ Known address {}: {}", address, known.entity);
                AddressLabelResult {
                    address,
                    labels: owned(known.labels),
                    entity: Some(known.entity.to_string()),
                    category: known.category.to_string(),
                    risk_level: known.risk_level.to_string(),
                    confidence: known.confidence,
                    sources: owned(known.sources),
                    data_source: DataSource::Live,
                    checked_at,
                }
            }
            None => AddressLabelResult {
                address,
                labels: Vec::new(),
                entity: None,
                category: "unknown".to_string(),
                risk_level: "medium".to_string(),
                confidence: 0.0,
                sources: Vec::new(),
                data_source: DataSource::Live,
                checked_at,
            },
        }
    }
}

#[async_trait]
impl Orchestrator for AddressLabeler {
    type Input = AddressLabelInput;
    type Output = AddressLabelResult;

    fn name(&self) -> &'static str {
        "address-labels"
    }

    async fn run(&self, input: AddressLabelInput) -> AppResult<AddressLabelResult> {
        Ok(self.lookup(&input.address))
    }

    fn fallback(&self, input: &AddressLabelInput, _reason: &AppError) -> AddressLabelResult {
        AddressLabelResult {
            data_source: DataSource::Fallback,
            ..self.lookup(&input.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_address_any_case() {
        let result = AddressLabeler.lookup("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
        assert_eq!(result.labels, vec!["usdc", "stablecoin"]);
        assert_eq!(result.entity.as_deref(), Some("USD Coin"));
        assert_eq!(result.risk_level, "low");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_unknown_address() {
        let result = AddressLabeler.lookup("0x1111111111111111111111111111111111111111");
        assert!(result.labels.is_empty());
        assert_eq!(result.category, "unknown");
        assert_eq!(result.risk_level, "medium");
        assert_eq!(result.confidence, 0.0);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("entity").is_none());
    }
}
