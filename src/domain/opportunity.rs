//! Scored, pool-specific signals.

use std::sync::Arc;

use super::id::{CycleId, PoolId};
use super::rule::RuleSet;
use super::snapshot::PoolSnapshot;

/// A scored signal derived from one snapshot in one cycle.
///
/// Read-only once built; the next cycle's opportunity for the same pool
/// supersedes it rather than mutating it.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    snapshot: Arc<PoolSnapshot>,
    confidence: f64,
    triggered: RuleSet,
    cycle: CycleId,
}

impl Opportunity {
    /// Build an opportunity. `confidence` is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(
        snapshot: Arc<PoolSnapshot>,
        confidence: f64,
        triggered: RuleSet,
        cycle: CycleId,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            snapshot,
            confidence,
            triggered,
            cycle,
        }
    }

    #[must_use]
    pub fn pool_id(&self) -> &PoolId {
        self.snapshot.pool_id()
    }

    #[must_use]
    pub fn snapshot(&self) -> &PoolSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub const fn triggered(&self) -> RuleSet {
        self.triggered
    }

    #[must_use]
    pub const fn cycle(&self) -> CycleId {
        self.cycle
    }
}
