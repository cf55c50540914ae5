//! Risk Scoring Module
//!
//! Generic weighted-rule evaluator shared by every scanner. A scanner only
//! supplies a [`RuleSet`] over its own typed signal struct; accumulation,
//! capping, classification and the safe flag are derived here once.
//!
//! - 0-19: NONE
//! - 20-39: LOW
//! - 40-59: MEDIUM
//! - 60-79: HIGH
//! - 80-100: CRITICAL

use serde::{Deserialize, Serialize};

use crate::models::types::RiskLevel;

/// Severity class of a single rule, independent of the cumulative score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Point value of a rule
pub enum Points<S> {
    Fixed(i32),
    /// Derived from the signals (e.g. a penalty proportional to a rate)
    Derived(fn(&S) -> i32),
}

impl<S> Points<S> {
    fn value(&self, signals: &S) -> i32 {
        match self {
            Points::Fixed(p) => *p,
            Points::Derived(f) => f(signals),
        }
    }
}

/// One independent predicate-plus-points unit
pub struct RiskRule<S> {
    pub name: &'static str,
    pub reason: &'static str,
    pub severity: Severity,
    pub points: Points<S>,
    predicate: fn(&S) -> bool,
}

impl<S> RiskRule<S> {
    pub fn new(
        name: &'static str,
        points: i32,
        severity: Severity,
        reason: &'static str,
        predicate: fn(&S) -> bool,
    ) -> Self {
        Self {
            name,
            reason,
            severity,
            points: Points::Fixed(points),
            predicate,
        }
    }

    pub fn derived(
        name: &'static str,
        points: fn(&S) -> i32,
        severity: Severity,
        reason: &'static str,
        predicate: fn(&S) -> bool,
    ) -> Self {
        Self {
            name,
            reason,
            severity,
            points: Points::Derived(points),
            predicate,
        }
    }

    pub fn matches(&self, signals: &S) -> bool {
        (self.predicate)(signals)
    }
}

/// A rule that fired for a given input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleHit {
    pub name: String,
    pub points: i32,
    pub severity: Severity,
    pub reason: String,
}

/// Immutable outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Baseline plus every triggered rule, before clamping
    pub raw_points: i32,
    /// Clamped to [0, 100]
    pub score: u8,
    pub level: RiskLevel,
    pub safe: bool,
    /// Triggered rules in rule-table order
    pub hits: Vec<RuleHit>,
}

impl ScoreResult {
    pub fn triggered(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.name.clone()).collect()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.reason.clone()).collect()
    }

    pub fn has(&self, rule: &str) -> bool {
        self.hits.iter().any(|h| h.name == rule)
    }
}

/// Rule table plus the per-scanner knobs for deriving `safe`
pub struct RuleSet<S> {
    rules: Vec<RiskRule<S>>,
    baseline: i32,
    /// One rule with at least this many points marks the result unsafe
    hard_fail_points: Option<i32>,
    /// A capped score at or above this marks the result unsafe
    unsafe_score: Option<u8>,
}

impl<S> RuleSet<S> {
    pub fn new(rules: Vec<RiskRule<S>>) -> Self {
        Self {
            rules,
            baseline: 0,
            hard_fail_points: None,
            unsafe_score: None,
        }
    }

    pub fn with_baseline(mut self, baseline: i32) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_hard_fail(mut self, points: i32) -> Self {
        self.hard_fail_points = Some(points);
        self
    }

    pub fn with_unsafe_score(mut self, score: u8) -> Self {
        self.unsafe_score = Some(score);
        self
    }

    pub fn rules(&self) -> &[RiskRule<S>] {
        &self.rules
    }

    /// Evaluate every rule against the same signals. Not first-match:
    /// overlapping signals all contribute.
    pub fn evaluate(&self, signals: &S) -> ScoreResult {
        let hits: Vec<RuleHit> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(signals))
            .map(|rule| RuleHit {
                name: rule.name.to_string(),
                points: rule.points.value(signals),
                severity: rule.severity,
                reason: rule.reason.to_string(),
            })
            .collect();

        let raw_points = hits
            .iter()
            .fold(self.baseline, |acc, h| acc.saturating_add(h.points));
        let score = raw_points.clamp(0, 100) as u8;

        let hard_failed = self
            .hard_fail_points
            .map(|threshold| hits.iter().any(|h| h.points >= threshold))
            .unwrap_or(false);
        let over_limit = self.unsafe_score.map(|limit| score >= limit).unwrap_or(false);

        ScoreResult {
            raw_points,
            score,
            level: RiskLevel::from_score(score),
            safe: !hard_failed && !over_limit,
            hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        a: bool,
        b: bool,
        rate: f64,
    }

    fn sample_rules() -> RuleSet<Sample> {
        RuleSet::new(vec![
            RiskRule::new("a", 30, Severity::Medium, "a fired", |s: &Sample| s.a),
            RiskRule::new("b", 50, Severity::High, "b fired", |s: &Sample| s.b),
            RiskRule::derived(
                "rate",
                |s: &Sample| (s.rate * 100.0) as i32,
                Severity::Low,
                "rate fired",
                |s: &Sample| s.rate > 0.0,
            ),
        ])
    }

    #[test]
    fn test_overlapping_rules_accumulate() {
        let result = sample_rules().evaluate(&Sample { a: true, b: true, rate: 0.0 });
        assert_eq!(result.raw_points, 80);
        assert_eq!(result.score, 80);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.triggered(), vec!["a", "b"]);
        assert_eq!(result.reasons(), vec!["a fired", "b fired"]);
    }

    #[test]
    fn test_score_is_capped() {
        let result = sample_rules().evaluate(&Sample { a: true, b: true, rate: 0.9 });
        assert_eq!(result.raw_points, 170);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_negative_accumulation_floors_at_zero() {
        let rules = RuleSet::new(vec![RiskRule::new(
            "bonus",
            -40,
            Severity::Info,
            "bonus",
            |_: &Sample| true,
        )])
        .with_baseline(10);
        let result = rules.evaluate(&Sample { a: false, b: false, rate: 0.0 });
        assert_eq!(result.raw_points, -30);
        assert_eq!(result.score, 0);
        assert_eq!(result.level, RiskLevel::None);
    }

    #[test]
    fn test_hard_fail_independent_of_score() {
        let rules = RuleSet::new(vec![
            RiskRule::new("severe", 70, Severity::High, "severe", |s: &Sample| s.a),
            RiskRule::new("offset", -60, Severity::Info, "offset", |s: &Sample| s.b),
        ])
        .with_hard_fail(70);
        let result = rules.evaluate(&Sample { a: true, b: true, rate: 0.0 });
        assert_eq!(result.score, 10);
        assert_eq!(result.level, RiskLevel::None);
        assert!(!result.safe);
    }

    #[test]
    fn test_unsafe_score_threshold() {
        let rules = sample_rules().with_unsafe_score(50);
        assert!(rules.evaluate(&Sample { a: true, b: false, rate: 0.0 }).safe);
        assert!(!rules.evaluate(&Sample { a: false, b: true, rate: 0.0 }).safe);
    }

    #[test]
    fn test_triggered_matches_true_predicates_exactly() {
        let rules = sample_rules();
        for &(a, b, rate) in &[(false, false, 0.0), (true, false, 0.0), (false, true, 0.2), (true, true, 0.5)] {
            let signals = Sample { a, b, rate };
            let result = rules.evaluate(&signals);
            let expected: Vec<String> = rules
                .rules()
                .iter()
                .filter(|r| r.matches(&signals))
                .map(|r| r.name.to_string())
                .collect();
            assert_eq!(result.triggered(), expected);
            assert!(result.score <= 100);
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let rules = sample_rules();
        let signals = Sample { a: true, b: false, rate: 0.25 };
        assert_eq!(rules.evaluate(&signals), rules.evaluate(&signals));
    }
}
