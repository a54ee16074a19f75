//! Agent state owned by the coordinator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::CycleId;

/// Classification of the last error seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Provider kept failing transiently; the cycle was skipped.
    TransientProvider,
    /// Malformed response or rejected credentials; the cycle was aborted.
    PermanentConfig,
    /// Optimistic store update kept colliding.
    PersistenceConflict,
    /// The cycle deadline passed before all work started.
    DeadlineExceeded,
}

impl ErrorClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransientProvider => "transient_provider",
            Self::PermanentConfig => "permanent_config",
            Self::PersistenceConflict => "persistence_conflict",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last error recorded in [`AgentState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentError {
    pub class: ErrorClass,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed,
    /// Completed, but some work was abandoned.
    Degraded,
    /// Snapshot retries were exhausted.
    Skipped,
    /// A permanent provider error stopped the cycle.
    Aborted,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Degraded => "degraded",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Per-cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounters {
    pub pools_monitored: u32,
    pub opportunities: u32,
    pub alerts_sent: u32,
    pub trades_confirmed: u32,
    pub trades_failed: u32,
    pub trades_skipped: u32,
    pub abandoned: u32,
    pub errors: u32,
}

/// Coordinator bookkeeping, written once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub cycle_count: u64,
    pub last_cycle: Option<CycleId>,
    pub last_cycle_start: Option<DateTime<Utc>>,
    pub last_cycle_end: Option<DateTime<Utc>>,
    pub last_outcome: Option<CycleOutcome>,
    pub last_error: Option<AgentError>,
    pub degraded: bool,
    pub counters: CycleCounters,
}

impl AgentState {
    /// The identifier the next cycle should use.
    #[must_use]
    pub fn next_cycle(&self) -> CycleId {
        self.last_cycle.map_or(CycleId::new(1), |c| c.next())
    }

    /// Fold the result of one cycle into the state.
    pub fn record_cycle(
        &mut self,
        cycle: CycleId,
        started: DateTime<Utc>,
        ended: DateTime<Utc>,
        outcome: CycleOutcome,
        counters: CycleCounters,
        error: Option<AgentError>,
    ) {
        self.cycle_count += 1;
        self.last_cycle = Some(cycle);
        self.last_cycle_start = Some(started);
        self.last_cycle_end = Some(ended);
        self.last_outcome = Some(outcome);
        self.degraded = outcome == CycleOutcome::Degraded;
        self.counters = counters;
        if error.is_some() {
            self.last_error = error;
        }
    }
}
