//! Trade records and their forward-only state machine.
//!
//! A [`TradeRecord`] is keyed by its [`IdempotencyKey`]. States only move
//! forward (`Pending → Quoted → Submitted → Confirmed | Failed`), and a
//! record in a terminal state never changes again.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::exposure::DenialReason;
use super::id::{IdempotencyKey, PoolId, TradeTrigger, UserId};
use super::money::Amount;
use super::subscription::TradeMode;

/// Status label of a trade state, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Quoted,
    Submitted,
    Confirmed,
    Failed,
}

impl TradeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Quoted => "quoted",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Position in the forward order. Both terminal states share the top rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Quoted => 1,
            Self::Submitted => 2,
            Self::Confirmed | Self::Failed => 3,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "quoted" => Ok(Self::Quoted),
            "submitted" => Ok(Self::Submitted),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown trade status '{other}'")),
        }
    }
}

/// Why a trade ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The risk guard refused the reservation.
    RiskLimit { denial: DenialReason },
    /// No quote could be obtained from the swap provider.
    QuoteUnavailable { detail: String },
    /// Every re-quote expired before execution.
    QuoteExpired { requotes: u32 },
    /// A re-quote moved the trade amount away from the reserved amount.
    AmountDrift { reserved: Decimal, quoted: Decimal },
    /// The provider rejected or failed the execution.
    ExecutionFailed { detail: String },
    /// The transaction was not confirmed in time.
    ConfirmationTimeout,
    /// The reservation lapsed before the trade resolved.
    ReservationExpired,
    /// The trade could not be recorded and was stopped before execution.
    Interrupted { detail: String },
}

impl FailureReason {
    /// Stable short code used in logs and storage.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RiskLimit { .. } => "risk_limit",
            Self::QuoteUnavailable { .. } => "quote_unavailable",
            Self::QuoteExpired { .. } => "quote_expired",
            Self::AmountDrift { .. } => "amount_drift",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::ReservationExpired => "reservation_expired",
            Self::Interrupted { .. } => "interrupted",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RiskLimit { denial } => write!(f, "risk limit: {denial}"),
            Self::QuoteUnavailable { detail } => write!(f, "no quote available: {detail}"),
            Self::QuoteExpired { requotes } => {
                write!(f, "quote expired after {requotes} re-quotes")
            }
            Self::AmountDrift { reserved, quoted } => {
                write!(f, "re-quoted amount {quoted} differs from reserved {reserved}")
            }
            Self::ExecutionFailed { detail } => write!(f, "execution failed: {detail}"),
            Self::ConfirmationTimeout => f.write_str("transaction was not confirmed in time"),
            Self::ReservationExpired => f.write_str("reservation expired before completion"),
            Self::Interrupted { detail } => write!(f, "interrupted: {detail}"),
        }
    }
}

/// Full trade state including terminal payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TradeState {
    Pending,
    Quoted,
    Submitted,
    Confirmed { simulated: bool },
    Failed { reason: FailureReason },
}

impl TradeState {
    #[must_use]
    pub const fn status(&self) -> TradeStatus {
        match self {
            Self::Pending => TradeStatus::Pending,
            Self::Quoted => TradeStatus::Quoted,
            Self::Submitted => TradeStatus::Submitted,
            Self::Confirmed { .. } => TradeStatus::Confirmed,
            Self::Failed { .. } => TradeStatus::Failed,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed { simulated: true } => f.write_str("confirmed (simulated)"),
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.status().as_str()),
        }
    }
}

/// Latest quote attached to a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInfo {
    pub quote_ref: String,
    pub expected_out: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// One trade, from reservation through its terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    key: IdempotencyKey,
    user: UserId,
    pool: PoolId,
    trigger: TradeTrigger,
    mode: TradeMode,
    amount: Amount,
    state: TradeState,
    quote: Option<QuoteInfo>,
    tx_ref: Option<String>,
    requotes: u32,
    /// Optimistic concurrency token maintained by the trade store.
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TradeRecord {
    /// A fresh record in `Pending`.
    #[must_use]
    pub fn pending(
        user: UserId,
        pool: PoolId,
        trigger: TradeTrigger,
        mode: TradeMode,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        let key = IdempotencyKey::derive(user, &pool, &trigger);
        Self {
            key,
            user,
            pool,
            trigger,
            mode,
            amount,
            state: TradeState::Pending,
            quote: None,
            tx_ref: None,
            requotes: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// A record that failed before any work began (e.g. a risk denial).
    #[must_use]
    pub fn failed_at_start(
        user: UserId,
        pool: PoolId,
        trigger: TradeTrigger,
        mode: TradeMode,
        amount: Amount,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::pending(user, pool, trigger, mode, amount, now);
        record.state = TradeState::Failed { reason };
        record
    }

    /// Rebuild a record from persisted fields.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn restore(
        key: IdempotencyKey,
        user: UserId,
        pool: PoolId,
        trigger: TradeTrigger,
        mode: TradeMode,
        amount: Amount,
        state: TradeState,
        quote: Option<QuoteInfo>,
        tx_ref: Option<String>,
        requotes: u32,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            user,
            pool,
            trigger,
            mode,
            amount,
            state,
            quote,
            tx_ref,
            requotes,
            version,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub const fn pool(&self) -> &PoolId {
        &self.pool
    }

    #[must_use]
    pub const fn trigger(&self) -> &TradeTrigger {
        &self.trigger
    }

    #[must_use]
    pub const fn mode(&self) -> TradeMode {
        self.mode
    }

    #[must_use]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    #[must_use]
    pub const fn state(&self) -> &TradeState {
        &self.state
    }

    #[must_use]
    pub const fn status(&self) -> TradeStatus {
        self.state.status()
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    #[must_use]
    pub const fn quote(&self) -> Option<&QuoteInfo> {
        self.quote.as_ref()
    }

    #[must_use]
    pub fn tx_ref(&self) -> Option<&str> {
        self.tx_ref.as_deref()
    }

    #[must_use]
    pub const fn requotes(&self) -> u32 {
        self.requotes
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Set by the store after a successful write.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move to `next`, enforcing forward-only transitions.
    ///
    /// # Errors
    ///
    /// [`DomainError::TerminalRecord`] if the record is already terminal,
    /// [`DomainError::InvalidTransition`] if `next` would not move forward.
    pub fn advance(&mut self, next: TradeState, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open()?;
        let from = self.state.status();
        let to = next.status();
        if to.rank() <= from.rank() {
            return Err(DomainError::InvalidTransition { from, to });
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Attach the first quote and move to `Quoted`.
    ///
    /// # Errors
    ///
    /// See [`TradeRecord::advance`].
    pub fn quoted(&mut self, quote: QuoteInfo, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.advance(TradeState::Quoted, now)?;
        self.quote = Some(quote);
        Ok(())
    }

    /// Replace the quote of a submitted trade after the previous one expired.
    ///
    /// # Errors
    ///
    /// Fails if the record is terminal or not `Submitted`.
    pub fn requoted(&mut self, quote: QuoteInfo, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open()?;
        if self.status() != TradeStatus::Submitted {
            return Err(DomainError::InvalidTransition {
                from: self.status(),
                to: TradeStatus::Submitted,
            });
        }
        self.quote = Some(quote);
        self.requotes += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Record the external transaction reference once execution is accepted.
    ///
    /// # Errors
    ///
    /// Fails if the record is terminal.
    pub fn attach_tx(&mut self, tx_ref: impl Into<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.tx_ref = Some(tx_ref.into());
        self.updated_at = now;
        Ok(())
    }

    /// Move to `Confirmed`.
    ///
    /// # Errors
    ///
    /// See [`TradeRecord::advance`].
    pub fn confirm(&mut self, simulated: bool, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.advance(TradeState::Confirmed { simulated }, now)
    }

    /// Move to `Failed`.
    ///
    /// # Errors
    ///
    /// See [`TradeRecord::advance`].
    pub fn fail(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.advance(TradeState::Failed { reason }, now)
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::TerminalRecord {
                status: self.status(),
            });
        }
        Ok(())
    }
}
