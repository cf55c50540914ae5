//! Orchestrator contract
//!
//! An orchestrator owns one paid route's analysis: it gathers signals from its
//! providers, scores them with its rule table and shapes the payload. When it
//! cannot finish, the pipeline asks it for a fallback payload instead.

use async_trait::async_trait;
use serde::Serialize;

use crate::models::errors::{AppError, AppResult};

#[async_trait]
pub trait Orchestrator: Send + Sync + 'static {
    /// Validated request input
    type Input: Clone + Send + Sync + 'static;
    /// Payload placed under `data` in a successful response
    type Output: Serialize + Send + 'static;

    /// Route label used in logs and metrics
    fn name(&self) -> &'static str;

    async fn run(&self, input: Self::Input) -> AppResult<Self::Output>;

    /// Payload served when `run` fails or overruns the deadline.
    /// Must be marked `"data_source": "fallback"`.
    fn fallback(&self, input: &Self::Input, reason: &AppError) -> Self::Output;
}
