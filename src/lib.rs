//! Ruster x402 Library
//!
//! Pay-per-call security analysis for autonomous agents. Every paid route sits
//! behind an x402 payment gate and runs one orchestrator:
//! - Contract, token and wallet risk scans
//! - Transaction preflight and MEV exposure checks
//! - Prompt injection testing and agent security scores
//! - Gas, validator queue and ETH/USD market data

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod scanners;
pub mod utils;

pub use crate::core::{GateDecision, PaymentGate, RuleSet, ScoreResult};
pub use models::{AppError, AppResult, Chain, RiskLevel, ServiceConfig};
pub use providers::Providers;
pub use scanners::{ScanCaches, Scanners};
pub use utils::{ExpiringCache, MetricsCollector};
