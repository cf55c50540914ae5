//! Ruster x402 API Module
//! Pay-per-call HTTP surface: discovery routes, payment gate, paid orchestrators

pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use routes::{create_metrics_router, create_router};
pub use types::*;
