//! Request pipeline shared by every paid route
//!
//! ```text
//! START -> input validation -> GATE_CHECK -> CHALLENGE_SENT
//!                                        -> REJECTED
//!                                        -> ORCHESTRATE -> RESPOND
//! ```
//!
//! Every terminal state records the request counter and the duration.
//! Revenue is recorded only when the response is `OK`.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use super::handlers::AppState;
use super::types::{ChallengeBody, ErrorBody, PaidResponse, RejectedBody};
use crate::core::orchestrator::Orchestrator;
use crate::core::payment::GateDecision;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::ResponseCode;
use crate::utils::constants::PAYMENT_HEADER;

/// JSON response with the HTTP status of a terminal code
pub fn respond<T: Serialize>(code: ResponseCode, body: T) -> Response {
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

pub fn error_response(err: &AppError) -> Response {
    respond(err.code.response_code(), ErrorBody::from(err))
}

/// Presented payment token, if any
fn payment_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(PAYMENT_HEADER).and_then(|v| v.to_str().ok())
}

/// Outcome of the orchestration stage
enum Outcome<T> {
    Served(T),
    Failed(AppError),
}

/// Run one paid request end to end
pub async fn run_paid<O: Orchestrator>(
    state: &AppState,
    route: &'static str,
    headers: &HeaderMap,
    input: AppResult<O::Input>,
    orchestrator: Arc<O>,
) -> Response {
    let start = Instant::now();
    let (code, response) = paid_outcome(state, route, headers, input, orchestrator).await;

    state.metrics.record_request(route, &code.status_class());
    state.metrics.record_duration(route, start.elapsed());
    response
}

async fn paid_outcome<O: Orchestrator>(
    state: &AppState,
    route: &'static str,
    headers: &HeaderMap,
    input: AppResult<O::Input>,
    orchestrator: Arc<O>,
) -> (ResponseCode, Response) {
    // 1. Malformed input never reaches the gate
    let input = match input {
        Ok(input) => input,
        Err(e) => {
            warn!(route, error = %e, "❌ Bad input");
            return (e.code.response_code(), error_response(&e));
        }
    };

    let requirement = match state.requirements.get(route) {
        Some(req) => req,
        None => {
            let e = AppError::internal(format!("No payment requirement for {}", route));
            error!(route, "💥 {}", e);
            return (ResponseCode::InternalFailure, error_response(&e));
        }
    };

    // 2. Payment gate
    let claim = match state.gate.authorize(requirement, payment_token(headers)) {
        GateDecision::Challenge => {
            return (
                ResponseCode::PaymentChallenge,
                respond(ResponseCode::PaymentChallenge, ChallengeBody::new(requirement.clone())),
            );
        }
        GateDecision::Rejected(reason) => {
            return (
                ResponseCode::PaymentRejected,
                respond(
                    ResponseCode::PaymentRejected,
                    RejectedBody::new(requirement.clone(), &reason),
                ),
            );
        }
        GateDecision::Granted(claim) => claim,
    };

    // 3. Orchestrate
    match orchestrate(state, orchestrator, input).await {
        Outcome::Served(output) => {
            state.metrics.record_payment(route, &claim.amount);
            (ResponseCode::Ok, respond(ResponseCode::Ok, PaidResponse::new(output)))
        }
        Outcome::Failed(e) => (e.code.response_code(), error_response(&e)),
    }
}

/// Run the orchestrator in its own task under the deadline. Upstream errors
/// and overruns become the fallback payload; a panic fails this request only.
async fn orchestrate<O: Orchestrator>(
    state: &AppState,
    orchestrator: Arc<O>,
    input: O::Input,
) -> Outcome<O::Output> {
    let deadline = state.config.orchestrator_deadline;
    let name = orchestrator.name();

    let mut task = {
        let orchestrator = Arc::clone(&orchestrator);
        let input = input.clone();
        tokio::spawn(async move { orchestrator.run(input).await })
    };

    match tokio::time::timeout(deadline, &mut task).await {
        Ok(Ok(Ok(output))) => Outcome::Served(output),
        Ok(Ok(Err(e))) if e.code.is_upstream() => {
            warn!(orchestrator = name, error = %e, "⚠️ Serving fallback payload");
            Outcome::Served(orchestrator.fallback(&input, &e))
        }
        Ok(Ok(Err(e))) => {
            error!(orchestrator = name, error = %e, "💥 Orchestrator failed");
            Outcome::Failed(e)
        }
        Ok(Err(join_err)) => {
            error!(orchestrator = name, error = %join_err, "💥 Orchestrator task panicked");
            Outcome::Failed(AppError::internal("Internal failure while processing request"))
        }
        Err(_) => {
            task.abort();
            let e = AppError::upstream_timeout(format!(
                "{} did not finish within {}ms",
                name,
                deadline.as_millis()
            ));
            warn!(orchestrator = name, "⏱️ Deadline exceeded, serving fallback payload");
            Outcome::Served(orchestrator.fallback(&input, &e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payment::encode_unsigned_token;
    use crate::models::config::ServiceConfig;
    use crate::providers::Providers;
    use crate::utils::constants::{DEFAULT_RECEIVER, ROUTE_GAS};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Misbehaving orchestrator: panics or sleeps past the deadline
    struct Faulty {
        panic: bool,
    }

    #[async_trait]
    impl Orchestrator for Faulty {
        type Input = ();
        type Output = &'static str;

        fn name(&self) -> &'static str {
            "faulty"
        }

        async fn run(&self, _: ()) -> AppResult<&'static str> {
            if self.panic {
                panic!("rule table out of bounds");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late")
        }

        fn fallback(&self, _: &(), _: &AppError) -> &'static str {
            "fallback"
        }
    }

    fn state() -> AppState {
        let config = ServiceConfig {
            orchestrator_deadline: Duration::from_millis(50),
            ..ServiceConfig::default()
        };
        let providers = Providers::http(&config.upstream).unwrap();
        AppState::new(config, &providers)
    }

    fn paid_headers() -> HeaderMap {
        let token = encode_unsigned_token(&serde_json::json!({
            "payment": { "amount": "0.001", "asset": "USDC", "receiver": DEFAULT_RECEIVER }
        }));
        let mut headers = HeaderMap::new();
        let name = axum::http::HeaderName::from_bytes(PAYMENT_HEADER.as_bytes()).unwrap();
        headers.insert(name, token.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_panic_is_internal_failure_and_not_billed() {
        let state = state();
        let response = run_paid(&state, ROUTE_GAS, &paid_headers(), Ok(()), Arc::new(Faulty { panic: true })).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.endpoints[ROUTE_GAS].requests_by_status["500"], 1);
        assert_eq!(snapshot.total_payments, 0);
    }

    #[tokio::test]
    async fn test_deadline_serves_fallback() {
        let state = state();
        let response = run_paid(&state, ROUTE_GAS, &paid_headers(), Ok(()), Arc::new(Faulty { panic: false })).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"], "fallback");
        assert_eq!(state.metrics.snapshot().total_payments, 1);
    }
}
