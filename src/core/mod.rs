//! Core Module - Payment Gate & Risk Engine
//!
//! Otak aplikasi: gerbang pembayaran x402, mesin skor risiko, dan kontrak
//! orchestrator yang dipakai oleh setiap route berbayar.

pub mod orchestrator;
pub mod payment;
pub mod risk_score;
pub mod signals;

pub use orchestrator::Orchestrator;
pub use payment::{
    GateDecision, PaymentClaim, PaymentError, PaymentGate, PaymentRequirement, TokenValidator,
    UnverifiedJwtValidator,
};
pub use risk_score::{RiskRule, RuleHit, RuleSet, ScoreResult, Severity};
pub use signals::Probe;
