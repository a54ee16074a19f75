//! Decision evaluation: snapshots in, scored opportunities out.
//!
//! Evaluation is pure. The same snapshot and rule configuration always
//! produce the same opportunity, bit for bit.

use std::sync::Arc;

use crate::domain::id::CycleId;
use crate::domain::opportunity::Opportunity;
use crate::domain::rule::{Rule, RuleConfig};
use crate::domain::snapshot::PoolSnapshot;

/// Confidence scoring capability.
///
/// Implementations must be deterministic and return a value in `[0, 1]`.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, snapshot: &PoolSnapshot, rules: &RuleConfig) -> f64;
}

/// Weighted threshold scorer.
///
/// A satisfied rule contributes `weight * (0.5 + 0.5 * min(1, headroom))`
/// where headroom is how far the value clears its threshold, relative to
/// the threshold. Unsatisfied rules contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl RuleBasedScorer {
    fn headroom(value: f64, threshold: f64) -> f64 {
        if threshold <= 0.0 {
            return 1.0;
        }
        ((value - threshold) / threshold).clamp(0.0, 1.0)
    }
}

impl Scorer for RuleBasedScorer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn score(&self, snapshot: &PoolSnapshot, rules: &RuleConfig) -> f64 {
        let total = rules.weights.total();
        if total <= 0.0 || !total.is_finite() {
            return 0.0;
        }
        let earned: f64 = Rule::ALL
            .into_iter()
            .filter(|rule| rules.is_satisfied(*rule, snapshot))
            .map(|rule| {
                let headroom = Self::headroom(rule.value(snapshot), rules.threshold(rule));
                rules.weights.get(rule) * (0.5 + 0.5 * headroom)
            })
            .sum();
        let score = earned / total;
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }
}

/// Turns snapshots into opportunities using a rule configuration and a scorer.
#[derive(Clone)]
pub struct Evaluator {
    rules: RuleConfig,
    scorer: Arc<dyn Scorer>,
}

impl Evaluator {
    pub fn new(rules: RuleConfig, scorer: Arc<dyn Scorer>) -> Self {
        Self { rules, scorer }
    }

    /// Evaluator with the default rule-based scorer.
    #[must_use]
    pub fn rule_based(rules: RuleConfig) -> Self {
        Self::new(rules, Arc::new(RuleBasedScorer))
    }

    #[must_use]
    pub const fn rules(&self) -> &RuleConfig {
        &self.rules
    }

    #[must_use]
    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Zero or one opportunity for this snapshot.
    #[must_use]
    pub fn evaluate(&self, snapshot: Arc<PoolSnapshot>, cycle: CycleId) -> Option<Opportunity> {
        let triggered = self.rules.triggered(&snapshot);
        if !triggered.is_superset(&self.rules.required) || triggered.is_empty() {
            return None;
        }
        let confidence = self.scorer.score(&snapshot, &self.rules);
        if confidence < self.rules.min_confidence {
            return None;
        }
        Some(Opportunity::new(snapshot, confidence, triggered, cycle))
    }

    /// Evaluate a whole cycle's snapshots. Order follows the input.
    #[must_use]
    pub fn evaluate_all(&self, snapshots: Vec<PoolSnapshot>, cycle: CycleId) -> Vec<Opportunity> {
        snapshots
            .into_iter()
            .filter_map(|snapshot| self.evaluate(Arc::new(snapshot), cycle))
            .collect()
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("rules", &self.rules)
            .field("scorer", &self.scorer.name())
            .finish()
    }
}
