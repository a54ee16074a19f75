//! Reservation result types for the risk guard.

use crate::domain::exposure::DenialReason;
use crate::domain::id::{PoolId, ReservationId, UserId};

pub use crate::domain::exposure::ReleaseOutcome;

/// Result of [`reserve`](crate::application::risk::RiskGuard::reserve).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Exposure is held until the reservation is released.
    Allowed(ReservationId),
    /// Nothing was held.
    Denied(DenialReason),
}

impl ReserveOutcome {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    #[must_use]
    pub const fn reservation(&self) -> Option<ReservationId> {
        match self {
            Self::Allowed(id) => Some(*id),
            Self::Denied(_) => None,
        }
    }

    #[must_use]
    pub const fn denial(&self) -> Option<DenialReason> {
        match self {
            Self::Denied(reason) => Some(*reason),
            Self::Allowed(_) => None,
        }
    }
}

/// Result of [`release`](crate::application::risk::RiskGuard::release).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseResult {
    /// The amount was added to the day's committed total.
    Committed,
    /// The hold was dropped.
    RolledBack,
    /// The reservation was unknown or had already expired.
    Unknown,
}

/// A hold that expired before it was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapsedHold {
    pub reservation: ReservationId,
    pub user: UserId,
    pub pool: PoolId,
}
