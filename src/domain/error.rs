//! Domain validation errors for core domain types.
//!
//! These errors are returned by `try_new` constructors and by the trade
//! record state machine when an invariant would be violated.

use rust_decimal::Decimal;
use thiserror::Error;

use super::trade::TradeStatus;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Trade and exposure amounts must be strictly positive.
    #[error("amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// The invalid amount that was provided.
        amount: Decimal,
    },

    /// Trade states only move forward.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// State the record was in.
        from: TradeStatus,
        /// State that was requested.
        to: TradeStatus,
    },

    /// Terminal records are immutable.
    #[error("trade record is terminal ({status}) and cannot change")]
    TerminalRecord {
        /// The terminal state.
        status: TradeStatus,
    },
}
