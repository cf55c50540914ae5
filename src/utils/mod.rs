//! Utils Module - Helper Functions & Shared Utilities
//!
//! Berisi fungsi-fungsi pembantu yang digunakan di seluruh aplikasi: cache
//! dengan TTL, metrics collector, dan konstanta.

pub mod cache;
pub mod constants;
pub mod metrics;

pub use cache::{CacheHit, CacheStats, ExpiringCache};
pub use constants::*;
pub use metrics::{MetricsCollector, MetricsSnapshot};
