//! Typed signal plumbing for scanners
//!
//! Every upstream lookup becomes a [`Probe`]: either an observed value or the
//! reason it could not be observed. Rule predicates match on the variant, so a
//! failed lookup can never be mistaken for a negative answer.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Outcome of one bounded upstream lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Probe<T> {
    Observed(T),
    Unavailable(String),
}

impl<T> Probe<T> {
    pub fn observed(&self) -> Option<&T> {
        match self {
            Probe::Observed(v) => Some(v),
            Probe::Unavailable(_) => None,
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Probe::Observed(_))
    }

    /// True only when the value was observed and satisfies `f`
    pub fn is(&self, f: impl FnOnce(&T) -> bool) -> bool {
        self.observed().map(f).unwrap_or(false)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Observed(v) => Probe::Observed(f(v)),
            Probe::Unavailable(r) => Probe::Unavailable(r),
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Probe::Observed(_) => None,
            Probe::Unavailable(r) => Some(r),
        }
    }
}

impl Probe<bool> {
    pub fn is_true(&self) -> bool {
        matches!(self, Probe::Observed(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Probe::Observed(false))
    }
}

/// Run one upstream call under a deadline and fold the result into a [`Probe`]
pub async fn probe<T, F>(what: &str, timeout: Duration, fut: F) -> Probe<T>
where
    F: Future<Output = eyre::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Probe::Observed(value),
        Ok(Err(e)) => {
            warn!(lookup = what, error = %e, "⚠️ Upstream lookup failed");
            Probe::Unavailable(format!("{} failed: {}", what, e))
        }
        Err(_) => {
            warn!(lookup = what, timeout_ms = timeout.as_millis() as u64, "⏱️ Upstream lookup timed out");
            Probe::Unavailable(format!("{} timed out after {}ms", what, timeout.as_millis()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_observed() {
        let p = probe("ok", Duration::from_secs(1), async { Ok::<_, eyre::Report>(7u32) }).await;
        assert_eq!(p, Probe::Observed(7));
        assert!(p.is(|v| *v == 7));
    }

    #[tokio::test]
    async fn test_probe_error_is_unavailable() {
        let p: Probe<bool> = probe("explorer", Duration::from_secs(1), async {
            Err(eyre::eyre!("HTTP 500"))
        })
        .await;
        assert!(!p.is_observed());
        assert!(!p.is_false(), "a failed lookup is not a negative answer");
        assert!(p.unavailable_reason().unwrap().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let p: Probe<bool> = probe("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(true)
        })
        .await;
        assert!(p.unavailable_reason().unwrap().contains("timed out"));
    }
}
