//! Action dispatcher: drives one trade from reservation to a terminal state.
//!
//! The idempotency key makes a repeated dispatch of the same trigger a
//! no-op, and the risk guard's per-pool hold keeps at most one trade per
//! user and pool in flight. Every path that obtained a reservation releases
//! it exactly once. The one exception is an interrupted trade whose final
//! state could not be written: its hold is left to lapse, and the trade is
//! settled from the store once the pool is free again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::notice;
use super::retry::{RetryPolicy, Transient};
use super::risk::RiskGuard;
use super::throttle::NotificationThrottler;
use crate::domain::error::DomainError;
use crate::domain::exposure::{DenialReason, ReleaseOutcome};
use crate::domain::id::{IdempotencyKey, PoolId, ReservationId, TradeTrigger, UserId};
use crate::domain::money::Amount;
use crate::domain::subscription::TradeMode;
use crate::domain::trade::{FailureReason, QuoteInfo, TradeRecord, TradeState, TradeStatus};
use crate::error::{StoreError, SwapError};
use crate::port::inbound::risk::{LapsedHold, ReserveOutcome};
use crate::port::outbound::store::TradeStore;
use crate::port::outbound::swap::{Quote, SwapProvider, TxRef, TxStatus};

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Slippage tolerance passed to the swap provider, as a fraction.
    pub max_slippage: Decimal,
    /// Re-quotes allowed after the provider reports an expired quote.
    pub max_requotes: u32,
    /// Immediate retries after an optimistic store conflict.
    pub conflict_retries: u32,
    pub confirm_poll: Duration,
    /// Must be shorter than the reservation TTL.
    pub confirm_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_slippage: Decimal::new(5, 2),
            max_requotes: 2,
            conflict_retries: 3,
            confirm_poll: Duration::from_secs(2),
            confirm_timeout: Duration::from_secs(120),
        }
    }
}

/// One unit of dispatch work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub user: UserId,
    pub pool: PoolId,
    pub trigger: TradeTrigger,
    pub mode: TradeMode,
    pub amount: Amount,
    /// Personal daily limit from the user's subscription.
    pub daily_limit: Option<Amount>,
}

impl DispatchRequest {
    #[must_use]
    pub fn key(&self) -> IdempotencyKey {
        IdempotencyKey::derive(self.user, &self.pool, &self.trigger)
    }
}

/// Why a request did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A record with this idempotency key already exists.
    Duplicate,
    /// Another trade for the same user and pool is unresolved.
    InFlight,
}

/// Why a trade was given up without reaching a terminal state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result of [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Confirmed {
        key: IdempotencyKey,
        simulated: bool,
    },
    Failed {
        key: IdempotencyKey,
        reason: FailureReason,
    },
    Skipped(SkipReason),
    Abandoned {
        key: IdempotencyKey,
        reason: AbandonReason,
    },
}

impl DispatchOutcome {
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    fn from_terminal(record: &TradeRecord) -> Self {
        match record.state() {
            TradeState::Confirmed { simulated } => Self::Confirmed {
                key: record.key().clone(),
                simulated: *simulated,
            },
            TradeState::Failed { reason } => Self::Failed {
                key: record.key().clone(),
                reason: reason.clone(),
            },
            _ => Self::Abandoned {
                key: record.key().clone(),
                reason: AbandonReason::Domain(DomainError::InvalidTransition {
                    from: record.status(),
                    to: TradeStatus::Confirmed,
                }),
            },
        }
    }
}

fn quote_info(quote: &Quote) -> QuoteInfo {
    QuoteInfo {
        quote_ref: quote.quote_ref.clone(),
        expected_out: quote.expected_out,
        expires_at: quote.expires_at,
    }
}

/// Turns (subscription, opportunity) pairs and manual requests into trades.
pub struct Dispatcher {
    config: DispatchConfig,
    risk: Arc<RiskGuard>,
    swap: Arc<dyn SwapProvider>,
    trades: Arc<dyn TradeStore>,
    throttler: Arc<NotificationThrottler>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        config: DispatchConfig,
        risk: Arc<RiskGuard>,
        swap: Arc<dyn SwapProvider>,
        trades: Arc<dyn TradeStore>,
        throttler: Arc<NotificationThrottler>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            risk,
            swap,
            trades,
            throttler,
            retry,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch one request to a terminal outcome.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        let key = request.key();
        match self.trades.get(&key) {
            Ok(Some(existing)) => {
                debug!(key = %key.short(), status = %existing.status(), "Duplicate trigger, skipping");
                return DispatchOutcome::Skipped(SkipReason::Duplicate);
            }
            Ok(None) => {}
            Err(e) => {
                error!(key = %key.short(), error = %e, "Trade lookup failed");
                return DispatchOutcome::Abandoned {
                    key,
                    reason: e.into(),
                };
            }
        }

        let now = Utc::now();
        let reservation = match self.risk.reserve_within(
            request.user,
            &request.pool,
            request.amount,
            now.date_naive(),
            request.daily_limit.map(|limit| limit.value()),
        ) {
            ReserveOutcome::Allowed(id) => id,
            ReserveOutcome::Denied(DenialReason::PoolBusy) => {
                debug!(user = %request.user, pool = %request.pool, "Trade already in flight, skipping");
                return DispatchOutcome::Skipped(SkipReason::InFlight);
            }
            ReserveOutcome::Denied(denial) => return self.deny(request, denial, now).await,
        };

        // Under our hold nothing else works this pair, so open records are leftovers.
        match self.settle_open(request.user, &request.pool).await {
            Ok(0) => {}
            Ok(unresolved) => {
                self.risk.release(reservation, ReleaseOutcome::Rollback);
                warn!(
                    user = %request.user,
                    pool = %request.pool,
                    unresolved,
                    "Earlier trade still unresolved, skipping"
                );
                return DispatchOutcome::Skipped(SkipReason::InFlight);
            }
            Err(e) => {
                self.risk.release(reservation, ReleaseOutcome::Rollback);
                error!(key = %key.short(), error = %e, "Open trade lookup failed");
                return DispatchOutcome::Abandoned {
                    key,
                    reason: e.into(),
                };
            }
        }

        let mut record = TradeRecord::pending(
            request.user,
            request.pool,
            request.trigger,
            request.mode,
            request.amount,
            now,
        );
        match self.trades.insert_if_absent(&record) {
            Ok(true) => record.set_version(1),
            Ok(false) => {
                self.risk.release(reservation, ReleaseOutcome::Rollback);
                debug!(key = %key.short(), "Lost insert race, skipping");
                return DispatchOutcome::Skipped(SkipReason::Duplicate);
            }
            Err(e) => {
                self.risk.release(reservation, ReleaseOutcome::Rollback);
                error!(key = %key.short(), error = %e, "Failed to create trade record");
                return DispatchOutcome::Abandoned {
                    key,
                    reason: e.into(),
                };
            }
        }
        info!(
            key = %key.short(),
            user = %record.user(),
            pool = %record.pool(),
            amount = %record.amount(),
            mode = %record.mode(),
            trigger = %record.trigger(),
            "Trade started"
        );

        match self.run_stages(&mut record).await {
            Ok(()) => {
                let release = match record.state() {
                    TradeState::Confirmed { simulated: false } => ReleaseOutcome::Commit,
                    _ => ReleaseOutcome::Rollback,
                };
                self.risk.release(reservation, release);
                info!(key = %key.short(), state = %record.state(), "Trade finished");
                self.notify(&record).await;
                DispatchOutcome::from_terminal(&record)
            }
            Err(reason) => self.abandon(record, reservation, reason).await,
        }
    }

    /// Settle the trade a lapsed hold was covering.
    ///
    /// Claims the pool first; if a new trade already holds it, that trade
    /// settles the leftovers itself.
    pub async fn settle_lapsed(&self, lapsed: &LapsedHold) {
        let Some(claim) = self
            .risk
            .claim(lapsed.user, &lapsed.pool, Utc::now().date_naive())
        else {
            debug!(user = %lapsed.user, pool = %lapsed.pool, "Pool busy, leftovers settled by the active trade");
            return;
        };
        match self.settle_open(lapsed.user, &lapsed.pool).await {
            Ok(0) => {}
            Ok(unresolved) => {
                warn!(user = %lapsed.user, pool = %lapsed.pool, unresolved, "Lapsed trade still unresolved");
            }
            Err(e) => {
                error!(user = %lapsed.user, pool = %lapsed.pool, error = %e, "Open trade lookup failed");
            }
        }
        self.risk.release(claim, ReleaseOutcome::Rollback);
    }

    /// Drive every open record for the pair to a terminal state.
    ///
    /// The caller must hold the pair. Returns how many records are still
    /// open afterwards.
    async fn settle_open(&self, user: UserId, pool: &PoolId) -> Result<usize, StoreError> {
        let open = self.trades.open_for(user, pool)?;
        let mut unresolved = 0;
        for record in open {
            if !self.settle_stale(record).await {
                unresolved += 1;
            }
        }
        Ok(unresolved)
    }

    /// Returns `true` once the record is terminal in the store.
    async fn settle_stale(&self, mut record: TradeRecord) -> bool {
        let ending = match (record.status(), record.tx_ref()) {
            (TradeStatus::Submitted, Some(tx)) => {
                let tx = TxRef(tx.to_string());
                self.await_confirmation(&tx).await
            }
            _ => Err(FailureReason::ReservationExpired),
        };
        if let Err(e) = Self::finish(&mut record, ending) {
            error!(key = %record.key().short(), error = %e, "Cannot settle leftover trade");
            return false;
        }

        match self.persist(&mut record) {
            Ok(()) => {
                if record.state() == &(TradeState::Confirmed { simulated: false }) {
                    self.risk
                        .settle(record.user(), record.created_at().date_naive(), record.amount());
                }
                warn!(
                    key = %record.key().short(),
                    user = %record.user(),
                    pool = %record.pool(),
                    state = %record.state(),
                    "Leftover trade settled"
                );
                self.notify(&record).await;
                true
            }
            Err(e) => {
                let settled_elsewhere = matches!(
                    self.trades.get(record.key()),
                    Ok(Some(stored)) if stored.is_terminal()
                );
                if !settled_elsewhere {
                    warn!(key = %record.key().short(), error = %e, "Failed to settle leftover trade");
                }
                settled_elsewhere
            }
        }
    }

    /// Confirm or fail an open record.
    fn finish(record: &mut TradeRecord, ending: Result<(), FailureReason>) -> Result<(), DomainError> {
        let now = Utc::now();
        match ending {
            Ok(()) => record.confirm(false, now),
            Err(reason) => record.fail(reason, now),
        }
    }

    async fn deny(
        &self,
        request: DispatchRequest,
        denial: DenialReason,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let reason = FailureReason::RiskLimit { denial };
        let record = TradeRecord::failed_at_start(
            request.user,
            request.pool,
            request.trigger,
            request.mode,
            request.amount,
            reason.clone(),
            now,
        );
        let key = record.key().clone();
        match self.trades.insert_if_absent(&record) {
            Ok(true) => {
                info!(key = %key.short(), user = %record.user(), %denial, "Trade denied by risk guard");
                self.notify(&record).await;
                DispatchOutcome::Failed { key, reason }
            }
            Ok(false) => DispatchOutcome::Skipped(SkipReason::Duplicate),
            Err(e) => {
                error!(key = %key.short(), error = %e, "Failed to record denied trade");
                DispatchOutcome::Abandoned {
                    key,
                    reason: e.into(),
                }
            }
        }
    }

    /// Bring an interrupted trade to a terminal state and tell the user.
    ///
    /// A trade the provider already accepted is followed to its on-chain
    /// result; anything earlier is failed. The final state is written once
    /// more; if that write fails too, the hold is left to lapse so the pair
    /// stays blocked until the store can be settled.
    async fn abandon(
        &self,
        mut record: TradeRecord,
        reservation: ReservationId,
        reason: AbandonReason,
    ) -> DispatchOutcome {
        let key = record.key().clone();
        error!(
            key = %key.short(),
            user = %record.user(),
            status = %record.status(),
            error = %reason,
            "Trade interrupted"
        );

        if !record.is_terminal() {
            let ending = match record.tx_ref() {
                Some(tx) => {
                    let tx = TxRef(tx.to_string());
                    self.await_confirmation(&tx).await
                }
                None => Err(FailureReason::Interrupted {
                    detail: reason.to_string(),
                }),
            };
            if let Err(e) = Self::finish(&mut record, ending) {
                error!(key = %key.short(), error = %e, "Cannot finish interrupted trade");
            }
        }

        if let Err(e) = self.persist(&mut record) {
            error!(key = %key.short(), error = %e, "Final state not written, hold left to lapse");
        } else {
            let release = match record.state() {
                TradeState::Confirmed { simulated: false } => ReleaseOutcome::Commit,
                _ => ReleaseOutcome::Rollback,
            };
            self.risk.release(reservation, release);
        }
        self.notify(&record).await;
        DispatchOutcome::Abandoned { key, reason }
    }

    /// Quote, optionally execute and confirm. Leaves `record` terminal on `Ok`.
    async fn run_stages(&self, record: &mut TradeRecord) -> Result<(), AbandonReason> {
        let pool = record.pool().clone();
        let amount = record.amount();

        let quote = match self.fetch_quote(&pool, amount).await {
            Ok(quote) => quote,
            Err(reason) => return self.transition(record, |r, now| r.fail(reason, now)),
        };
        self.transition(record, |r, now| r.quoted(quote_info(&quote), now))?;

        if !record.mode().is_live() {
            return self.transition(record, |r, now| r.confirm(true, now));
        }

        self.transition(record, |r, now| r.advance(TradeState::Submitted, now))?;
        let tx = match self.submit(record, quote).await? {
            Ok(tx) => tx,
            Err(reason) => return self.transition(record, |r, now| r.fail(reason, now)),
        };
        self.transition(record, |r, now| r.attach_tx(tx.0.clone(), now))?;

        match self.await_confirmation(&tx).await {
            Ok(()) => self.transition(record, |r, now| r.confirm(false, now)),
            Err(reason) => {
                warn!(key = %record.key().short(), tx = %tx, %reason, "Transaction not confirmed");
                self.transition(record, |r, now| r.fail(reason, now))
            }
        }
    }

    async fn fetch_quote(&self, pool: &PoolId, amount: Amount) -> Result<Quote, FailureReason> {
        self.retry
            .run("quote", || {
                self.swap.quote(pool, amount, self.config.max_slippage)
            })
            .await
            .into_result()
            .map_err(|e| FailureReason::QuoteUnavailable {
                detail: e.to_string(),
            })
    }

    /// Execute, re-quoting on expiry. The outer error abandons the trade,
    /// the inner one fails it.
    async fn submit(
        &self,
        record: &mut TradeRecord,
        quote: Quote,
    ) -> Result<Result<TxRef, FailureReason>, AbandonReason> {
        let pool = record.pool().clone();
        let amount = record.amount();
        let mut quote_ref = quote.quote_ref;
        loop {
            let attempt = self
                .retry
                .run("execute", || self.swap.execute(&quote_ref))
                .await;
            match attempt.result {
                Ok(tx) => return Ok(Ok(tx)),
                Err(SwapError::QuoteExpired) => {
                    if record.requotes() >= self.config.max_requotes {
                        return Ok(Err(FailureReason::QuoteExpired {
                            requotes: record.requotes(),
                        }));
                    }
                    let fresh = match self.fetch_quote(&pool, amount).await {
                        Ok(fresh) => fresh,
                        Err(reason) => return Ok(Err(reason)),
                    };
                    if fresh.amount_in != amount.value() {
                        return Ok(Err(FailureReason::AmountDrift {
                            reserved: amount.value(),
                            quoted: fresh.amount_in,
                        }));
                    }
                    self.transition(record, |r, now| r.requoted(quote_info(&fresh), now))?;
                    info!(key = %record.key().short(), requotes = record.requotes(), "Quote expired, re-quoted");
                    quote_ref = fresh.quote_ref;
                }
                Err(e) => {
                    return Ok(Err(FailureReason::ExecutionFailed {
                        detail: e.to_string(),
                    }))
                }
            }
        }
    }

    async fn await_confirmation(&self, tx: &TxRef) -> Result<(), FailureReason> {
        let poll = async {
            loop {
                match self.swap.status(tx).await {
                    Ok(TxStatus::Confirmed) => return Ok(()),
                    Ok(TxStatus::Failed(detail)) => {
                        return Err(FailureReason::ExecutionFailed { detail })
                    }
                    Ok(TxStatus::Pending) => {}
                    Err(e) if e.is_transient() => {
                        debug!(tx = %tx, error = %e, "Status poll failed, will retry");
                    }
                    Err(e) => {
                        return Err(FailureReason::ExecutionFailed {
                            detail: e.to_string(),
                        })
                    }
                }
                tokio::time::sleep(self.config.confirm_poll).await;
            }
        };
        tokio::time::timeout(self.config.confirm_timeout, poll)
            .await
            .unwrap_or(Err(FailureReason::ConfirmationTimeout))
    }

    /// Apply a state change and persist it.
    fn transition<F>(&self, record: &mut TradeRecord, apply: F) -> Result<(), AbandonReason>
    where
        F: FnOnce(&mut TradeRecord, DateTime<Utc>) -> Result<(), DomainError>,
    {
        apply(record, Utc::now())?;
        self.persist(record)?;
        Ok(())
    }

    /// Write `record`, retrying a bounded number of version conflicts.
    fn persist(&self, record: &mut TradeRecord) -> Result<(), StoreError> {
        let mut conflicts = 0;
        loop {
            match self.trades.update(record) {
                Ok(version) => {
                    record.set_version(version);
                    return Ok(());
                }
                Err(err @ StoreError::Conflict { .. }) => {
                    if conflicts >= self.config.conflict_retries {
                        return Err(err);
                    }
                    conflicts += 1;
                    warn!(key = %record.key().short(), attempt = conflicts, "Trade version conflict, retrying");
                    let Some(stored) = self.trades.get(record.key())? else {
                        return Err(StoreError::NotFound(record.key().to_string()));
                    };
                    if stored.is_terminal() {
                        return Err(err);
                    }
                    // This dispatcher owns the key; adopt the stored version.
                    record.set_version(stored.version());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn notify(&self, record: &TradeRecord) {
        self.throttler
            .enqueue(record.user(), notice::trade_outcome(record))
            .await;
    }
}
