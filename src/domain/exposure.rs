//! Daily exposure ledger and risk decisions.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Why the risk guard refused a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The amount exceeds the per-trade maximum.
    SingleTradeCapExceeded,
    /// Day total plus the amount exceeds the daily maximum.
    DailyCapExceeded,
    /// A reservation for the same user and pool is still unresolved.
    PoolBusy,
}

impl DenialReason {
    /// True for denials the user should hear about.
    #[must_use]
    pub const fn is_limit(self) -> bool {
        !matches!(self, Self::PoolBusy)
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleTradeCapExceeded => f.write_str("single trade cap exceeded"),
            Self::DailyCapExceeded => f.write_str("daily exposure cap exceeded"),
            Self::PoolBusy => f.write_str("another trade for this pool is in progress"),
        }
    }
}

/// How a reservation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Add the amount to the day's committed total.
    Commit,
    /// Return the amount to the available budget.
    Rollback,
}

/// Committed exposure for one user on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user: UserId,
    pub day: NaiveDate,
    pub committed: Decimal,
}

impl LedgerEntry {
    #[must_use]
    pub const fn new(user: UserId, day: NaiveDate, committed: Decimal) -> Self {
        Self {
            user,
            day,
            committed,
        }
    }
}
