//! x402 Payment Gate
//!
//! Turns the presented bearer token into one of three decisions:
//! - no token: `Challenge` carrying the route's requirement
//! - token that does not decode or does not match: `Rejected`
//! - matching token: `Granted` with the decoded claim
//!
//! Tokens are JWT-shaped (`header.payload.signature`). The default validator
//! only decodes the payload; authenticity is NOT checked.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// What a priced route asks for. One per route, built at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub scheme: String,
    pub network: String,
    pub max_amount: String,
    pub min_amount: String,
    pub asset: String,
    pub receiver: String,
    pub description: String,
}

/// Payment facts decoded from a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentClaim {
    pub amount: String,
    pub asset: String,
    pub receiver: String,
    pub network: Option<String>,
    pub subject: Option<String>,
    pub id: Option<String>,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
}

/// Why a presented token was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("payload is not valid base64url: {0}")]
    Base64(String),
    #[error("payload is not a payment claim: {0}")]
    Json(String),
    #[error("amount mismatch: got {got}, required {want}")]
    AmountMismatch { got: String, want: String },
    #[error("asset mismatch: got {got}, required {want}")]
    AssetMismatch { got: String, want: String },
    #[error("receiver mismatch: got {got}, required {want}")]
    ReceiverMismatch { got: String, want: String },
    #[error("token expired at {expired_at}")]
    Expired { expired_at: i64 },
}

/// Decodes a presented token into a claim. Swappable so a signature-checking
/// validator can replace the default without touching the gate.
pub trait TokenValidator: Send + Sync {
    fn decode(&self, token: &str) -> Result<PaymentClaim, PaymentError>;
}

// ============================================
// Default validator: decode only
// ============================================

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(serde_json::Number),
}

impl AmountRepr {
    fn into_string(self) -> String {
        match self {
            AmountRepr::Text(s) => s,
            AmountRepr::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct PaymentFields {
    amount: AmountRepr,
    asset: String,
    receiver: String,
    #[serde(default)]
    network: Option<String>,
}

#[derive(Deserialize)]
struct TokenPayload {
    payment: PaymentFields,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    jti: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Reads the middle segment of a JWT-shaped token without checking the signature
#[derive(Debug, Default, Clone, Copy)]
pub struct UnverifiedJwtValidator;

impl TokenValidator for UnverifiedJwtValidator {
    fn decode(&self, token: &str) -> Result<PaymentClaim, PaymentError> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(PaymentError::Malformed(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }

        // Some issuers keep the '=' padding, the no-pad engine rejects it
        let segment = parts[1].trim_end_matches('=');
        let raw = URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|e| PaymentError::Base64(e.to_string()))?;
        let payload: TokenPayload =
            serde_json::from_slice(&raw).map_err(|e| PaymentError::Json(e.to_string()))?;

        Ok(PaymentClaim {
            amount: payload.payment.amount.into_string(),
            asset: payload.payment.asset,
            receiver: payload.payment.receiver,
            network: payload.payment.network,
            subject: payload.sub,
            id: payload.jti,
            issued_at: payload.iat,
            expires_at: payload.exp,
        })
    }
}

// ============================================
// Gate
// ============================================

/// Outcome of checking one request against one requirement
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Granted(PaymentClaim),
    Challenge,
    Rejected(PaymentError),
}

#[derive(Clone)]
pub struct PaymentGate {
    validator: Arc<dyn TokenValidator>,
    enforce_expiry: bool,
}

impl PaymentGate {
    pub fn new(validator: Arc<dyn TokenValidator>, enforce_expiry: bool) -> Self {
        Self {
            validator,
            enforce_expiry,
        }
    }

    /// Gate with the decode-only validator and permissive expiry
    pub fn unverified() -> Self {
        Self::new(Arc::new(UnverifiedJwtValidator), false)
    }

    pub fn enforces_expiry(&self) -> bool {
        self.enforce_expiry
    }

    pub fn authorize(&self, requirement: &PaymentRequirement, token: Option<&str>) -> GateDecision {
        self.authorize_at(requirement, token, chrono::Utc::now().timestamp())
    }

    /// Same as [`authorize`](Self::authorize) with an explicit clock (unix seconds)
    pub fn authorize_at(
        &self,
        requirement: &PaymentRequirement,
        token: Option<&str>,
        now: i64,
    ) -> GateDecision {
        let token = match token.map(str::trim) {
            None | Some("") => return GateDecision::Challenge,
            Some(t) => t,
        };

        let claim = match self.validator.decode(token) {
            Ok(claim) => claim,
            Err(e) => {
                warn!(reason = %e, "💳 Payment token rejected");
                return GateDecision::Rejected(e);
            }
        };

        match self.check(requirement, &claim, now) {
            Ok(()) => {
                debug!(amount = %claim.amount, subject = ?claim.subject, "💳 Payment accepted");
                GateDecision::Granted(claim)
            }
            Err(e) => {
                warn!(reason = %e, subject = ?claim.subject, "💳 Payment claim does not satisfy requirement");
                GateDecision::Rejected(e)
            }
        }
    }

    fn check(
        &self,
        requirement: &PaymentRequirement,
        claim: &PaymentClaim,
        now: i64,
    ) -> Result<(), PaymentError> {
        if claim.amount != requirement.min_amount {
            return Err(PaymentError::AmountMismatch {
                got: claim.amount.clone(),
                want: requirement.min_amount.clone(),
            });
        }
        if claim.asset != requirement.asset {
            return Err(PaymentError::AssetMismatch {
                got: claim.asset.clone(),
                want: requirement.asset.clone(),
            });
        }
        if !claim.receiver.eq_ignore_ascii_case(&requirement.receiver) {
            return Err(PaymentError::ReceiverMismatch {
                got: claim.receiver.clone(),
                want: requirement.receiver.clone(),
            });
        }
        if self.enforce_expiry {
            if let Some(exp) = claim.expires_at {
                if exp < now {
                    return Err(PaymentError::Expired { expired_at: exp });
                }
            }
        }
        Ok(())
    }
}

/// Build an unsigned JWT-shaped token around a payload (tests and local tooling)
pub fn encode_unsigned_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.unsigned", header, body)
}
