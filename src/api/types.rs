//! API Request/Response Types
//!
//! Request bodies keep every field optional so that a missing field becomes
//! a `BAD_INPUT` with a precise message instead of a generic decode error.

use serde::{Deserialize, Serialize};

use crate::core::payment::{PaymentError, PaymentRequirement};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, ResponseCode};
use crate::scanners::agent::AgentScoreInput;
use crate::scanners::contract::ContractScanInput;
use crate::scanners::labels::AddressLabelInput;
use crate::scanners::mev::MevCheckInput;
use crate::scanners::preflight::{parse_calldata, parse_value, TxPreflightInput};
use crate::scanners::prompt::PromptTestInput;
use crate::scanners::token::TokenScanInput;
use crate::scanners::wallet::WalletScanInput;
use crate::providers::CallRequest;
use crate::scanners::{is_valid_address, parse_chain, require_address, require_field};
use crate::utils::constants::X402_VERSION;

// ============================================
// Requests
// ============================================

/// Body of scan-contract, scan-token and scan-wallet
#[derive(Debug, Default, Deserialize)]
pub struct AddressRequest {
    pub address: Option<String>,
    pub chain: Option<String>,
}

impl AddressRequest {
    fn parts(&self) -> AppResult<(String, Chain)> {
        let address = require_address("address", self.address.as_deref())?;
        let chain = parse_chain(self.chain.as_deref())?;
        Ok((address, chain))
    }

    pub fn contract_input(&self) -> AppResult<ContractScanInput> {
        let (address, chain) = self.parts()?;
        Ok(ContractScanInput { address, chain })
    }

    pub fn token_input(&self) -> AppResult<TokenScanInput> {
        let (address, chain) = self.parts()?;
        Ok(TokenScanInput { address, chain })
    }

    pub fn wallet_input(&self) -> AppResult<WalletScanInput> {
        let (address, chain) = self.parts()?;
        Ok(WalletScanInput { address, chain })
    }

    pub fn label_input(&self) -> AppResult<AddressLabelInput> {
        Ok(AddressLabelInput {
            address: require_address("address", self.address.as_deref())?,
        })
    }
}

/// Body of tx-preflight and mev-check
#[derive(Debug, Default, Deserialize)]
pub struct TxRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub data: Option<String>,
    pub chain: Option<String>,
}

impl TxRequest {
    fn optional_address(field: &str, raw: Option<&str>) -> AppResult<Option<String>> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) if is_valid_address(v) => Ok(Some(v.to_lowercase())),
            Some(_) => Err(AppError::invalid_address(format!("Invalid {} address format", field))),
        }
    }

    pub fn preflight_input(&self) -> AppResult<TxPreflightInput> {
        let to = require_address("to", self.to.as_deref())?;
        Ok(TxPreflightInput {
            chain: parse_chain(self.chain.as_deref())?,
            call: CallRequest {
                from: Self::optional_address("from", self.from.as_deref())?,
                to,
                value: parse_value(self.value.as_deref())?,
                data: parse_calldata(self.data.as_deref())?,
            },
        })
    }

    pub fn mev_input(&self) -> AppResult<MevCheckInput> {
        Ok(MevCheckInput {
            chain: parse_chain(self.chain.as_deref())?,
            from: Self::optional_address("from", self.from.as_deref())?,
            to: Self::optional_address("to", self.to.as_deref())?,
            value: parse_value(self.value.as_deref())?,
            data: parse_calldata(self.data.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    pub prompt: Option<String>,
}

impl PromptRequest {
    pub fn input(&self) -> AppResult<PromptTestInput> {
        // Not trimmed: leading invisible characters are part of what is tested
        match self.prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => Ok(PromptTestInput { prompt: p.to_string() }),
            _ => Err(AppError::missing_field("prompt")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentRequest {
    pub agent_id: Option<String>,
    pub chain: Option<String>,
}

impl AgentRequest {
    pub fn input(&self) -> AppResult<AgentScoreInput> {
        Ok(AgentScoreInput {
            agent_id: require_field("agent_id", self.agent_id.as_deref())?,
            chain: parse_chain(self.chain.as_deref())?,
        })
    }
}

// ============================================
// Responses
// ============================================

/// 402 body when no token was presented
#[derive(Debug, Serialize)]
pub struct ChallengeBody {
    pub error: &'static str,
    pub code: &'static str,
    pub version: &'static str,
    pub payment: PaymentRequirement,
}

impl ChallengeBody {
    pub fn new(payment: PaymentRequirement) -> Self {
        Self {
            error: "Payment required",
            code: ResponseCode::PaymentChallenge.as_str(),
            version: X402_VERSION,
            payment,
        }
    }
}

/// 402 body when a token was presented and refused
#[derive(Debug, Serialize)]
pub struct RejectedBody {
    pub error: &'static str,
    pub code: &'static str,
    pub version: &'static str,
    pub details: String,
    pub payment: PaymentRequirement,
}

impl RejectedBody {
    pub fn new(payment: PaymentRequirement, reason: &PaymentError) -> Self {
        Self {
            error: "Invalid or insufficient payment",
            code: ResponseCode::PaymentRejected.as_str(),
            version: X402_VERSION,
            details: reason.to_string(),
            payment,
        }
    }
}

/// 200 body of every paid route
#[derive(Debug, Serialize)]
pub struct PaidResponse<T: Serialize> {
    pub data: T,
    pub payment_verified: bool,
}

impl<T: Serialize> PaidResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            payment_verified: true,
        }
    }
}

/// Every other error
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        Self {
            error: err.message.clone(),
            code: err.code.response_code().as_str(),
        }
    }
}

// ============================================
// Discovery
// ============================================

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub protocol: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub path: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<&'static str>,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// `/.well-known/x402`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct X402Discovery {
    pub version: &'static str,
    pub payment_requirements: Vec<AdvertisedRequirement>,
}

#[derive(Debug, Serialize)]
pub struct AdvertisedRequirement {
    pub resource: &'static str,
    pub method: &'static str,
    #[serde(flatten)]
    pub requirement: PaymentRequirement,
}
