//! Type definitions shared across scanners, pipeline and API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::constants::{CHAIN_ID_BASE, CHAIN_ID_ETHEREUM};

/// Risk level classification derived from a capped 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Nothing worth flagging
    None,
    /// Low risk - minor concerns
    Low,
    /// Medium risk - proceed with caution
    Medium,
    /// High risk - likely to lose funds
    High,
    /// Critical - almost certain loss (honeypot, jailbreak prompt, etc.)
    Critical,
}

impl RiskLevel {
    /// Thresholds are evaluated highest-first over the capped score
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => RiskLevel::Critical,
            60..=79 => RiskLevel::High,
            40..=59 => RiskLevel::Medium,
            20..=39 => RiskLevel::Low,
            _ => RiskLevel::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::None => "✅",
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a payload came from. Anything but `Live` is not fresh upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Cached,
    Fallback,
}

/// Chains the explorer-backed scanners understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Base,
    Ethereum,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Base => "base",
            Chain::Ethereum => "ethereum",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Base => CHAIN_ID_BASE,
            Chain::Ethereum => CHAIN_ID_ETHEREUM,
        }
    }

    /// Empty input defaults to Base, the settlement network of the service
    pub fn parse_or_default(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Chain::Base),
            Some(other) => other.parse(),
        }
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Chain::Base),
            "ethereum" => Ok(Chain::Ethereum),
            other => Err(format!("Invalid chain '{}' - use 'base' or 'ethereum'", other)),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a request, independent of HTTP naming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok,
    PaymentChallenge,
    PaymentRejected,
    BadInput,
    MethodNotAllowed,
    InternalFailure,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::PaymentChallenge => "PAYMENT_CHALLENGE",
            Self::PaymentRejected => "PAYMENT_REJECTED",
            Self::BadInput => "BAD_INPUT",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::InternalFailure => "INTERNAL_FAILURE",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::PaymentChallenge | Self::PaymentRejected => 402,
            Self::BadInput => 400,
            Self::MethodNotAllowed => 405,
            Self::InternalFailure => 500,
        }
    }

    /// Status class label used by the metrics collector
    pub fn status_class(&self) -> String {
        self.http_status().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::None);
        assert_eq!(RiskLevel::from_score(19), RiskLevel::None);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_chain_parsing() {
        assert_eq!(Chain::parse_or_default(None).unwrap(), Chain::Base);
        assert_eq!(Chain::parse_or_default(Some("")).unwrap(), Chain::Base);
        assert_eq!(Chain::parse_or_default(Some("ethereum")).unwrap(), Chain::Ethereum);
        assert!(Chain::parse_or_default(Some("solana")).is_err());
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(ResponseCode::PaymentChallenge.http_status(), 402);
        assert_eq!(ResponseCode::PaymentRejected.http_status(), 402);
        assert_eq!(ResponseCode::BadInput.status_class(), "400");
        assert_eq!(ResponseCode::InternalFailure.as_str(), "INTERNAL_FAILURE");
    }
}
