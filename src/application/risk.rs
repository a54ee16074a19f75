//! Risk guard: per-user daily exposure with reservations.
//!
//! Every user has a book guarded by its own mutex, so checking the caps and
//! recording a hold is one atomic step per user while different users never
//! contend. A hold is either committed into the day's ledger, rolled back,
//! or swept after its TTL expires (treated as rollback). Lapsed holds are
//! queued so the dispatcher can settle whatever trade they were covering.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::exposure::{DenialReason, LedgerEntry, ReleaseOutcome};
use crate::domain::id::{PoolId, ReservationId, UserId};
use crate::domain::money::Amount;
use crate::port::inbound::risk::{LapsedHold, ReleaseResult, ReserveOutcome};
use crate::port::outbound::store::LedgerStore;

/// Caps enforced by the guard.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Largest single trade in USD.
    pub max_single_trade: Decimal,
    /// Largest committed-plus-held total per user per day in USD.
    pub max_daily_exposure: Decimal,
    /// Unresolved holds are rolled back after this long.
    pub reservation_ttl: Duration,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_single_trade: Decimal::from(1_000),
            max_daily_exposure: Decimal::from(10_000),
            reservation_ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug)]
struct Hold {
    pool: PoolId,
    day: NaiveDate,
    amount: Decimal,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct UserBook {
    /// Committed totals per day. Past days are kept for audit.
    committed: BTreeMap<NaiveDate, Decimal>,
    holds: HashMap<ReservationId, Hold>,
}

impl UserBook {
    fn committed_on(&self, day: NaiveDate) -> Decimal {
        self.committed.get(&day).copied().unwrap_or(Decimal::ZERO)
    }

    fn held_on(&self, day: NaiveDate) -> Decimal {
        self.holds
            .values()
            .filter(|hold| hold.day == day)
            .map(|hold| hold.amount)
            .sum()
    }

    fn drop_expired(&mut self, user: UserId, now: Instant) -> Vec<LapsedHold> {
        let mut expired = Vec::new();
        self.holds.retain(|id, hold| {
            let live = hold.expires_at > now;
            if !live {
                warn!(
                    user = %user,
                    reservation = %id,
                    pool = %hold.pool,
                    amount = %hold.amount,
                    "Reservation expired, rolling back"
                );
                expired.push(LapsedHold {
                    reservation: *id,
                    user,
                    pool: hold.pool.clone(),
                });
            }
            live
        });
        expired
    }
}

/// Grants and resolves exposure reservations.
///
/// Lock order: a user's book is never locked while `owners` is borrowed.
pub struct RiskGuard {
    limits: RiskLimits,
    books: DashMap<UserId, Arc<Mutex<UserBook>>>,
    owners: DashMap<ReservationId, UserId>,
    lapsed: Mutex<Vec<LapsedHold>>,
    next_id: AtomicU64,
    ledger: Option<Arc<dyn LedgerStore>>,
}

impl RiskGuard {
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            books: DashMap::new(),
            owners: DashMap::new(),
            lapsed: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            ledger: None,
        }
    }

    /// Persist commits to `ledger` as well as holding them in memory.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub const fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    fn book(&self, user: UserId) -> Arc<Mutex<UserBook>> {
        self.books.entry(user).or_default().clone()
    }

    /// Seed committed totals, e.g. today's ledger after a restart.
    pub fn restore(&self, entries: impl IntoIterator<Item = LedgerEntry>) {
        for entry in entries {
            let book = self.book(entry.user);
            let mut book = book.lock();
            *book.committed.entry(entry.day).or_default() += entry.committed;
        }
    }

    /// Try to hold `amount` of `user`'s budget for `day`.
    ///
    /// Checks, in order: the per-trade cap, an unresolved hold on the same
    /// pool, and the daily cap against committed plus held exposure.
    pub fn reserve(
        &self,
        user: UserId,
        pool: &PoolId,
        amount: Amount,
        day: NaiveDate,
    ) -> ReserveOutcome {
        self.reserve_within(user, pool, amount, day, None)
    }

    /// [`reserve`](Self::reserve) with a personal daily limit.
    ///
    /// The effective daily cap is the smaller of `personal_cap` and the
    /// global cap.
    pub fn reserve_within(
        &self,
        user: UserId,
        pool: &PoolId,
        amount: Amount,
        day: NaiveDate,
        personal_cap: Option<Decimal>,
    ) -> ReserveOutcome {
        let amount = amount.value();
        if amount > self.limits.max_single_trade {
            debug!(
                user = %user,
                amount = %amount,
                limit = %self.limits.max_single_trade,
                "Single trade cap exceeded"
            );
            return ReserveOutcome::Denied(DenialReason::SingleTradeCapExceeded);
        }
        let daily_cap = personal_cap.map_or(self.limits.max_daily_exposure, |cap| {
            cap.min(self.limits.max_daily_exposure)
        });

        let (outcome, expired) = {
            let book = self.book(user);
            let mut book = book.lock();
            let now = Instant::now();
            let expired = book.drop_expired(user, now);
            let outcome = self.try_hold(&mut book, user, pool, amount, day, daily_cap, now);
            (outcome, expired)
        };
        self.forget(expired);
        if let ReserveOutcome::Allowed(id) = outcome {
            self.owners.insert(id, user);
            debug!(user = %user, pool = %pool, reservation = %id, amount = %amount, "Exposure reserved");
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn try_hold(
        &self,
        book: &mut UserBook,
        user: UserId,
        pool: &PoolId,
        amount: Decimal,
        day: NaiveDate,
        daily_cap: Decimal,
        now: Instant,
    ) -> ReserveOutcome {
        if book.holds.values().any(|hold| &hold.pool == pool) {
            return ReserveOutcome::Denied(DenialReason::PoolBusy);
        }

        let committed = book.committed_on(day);
        let held = book.held_on(day);
        if committed + held + amount > daily_cap {
            info!(
                user = %user,
                committed = %committed,
                held = %held,
                amount = %amount,
                limit = %daily_cap,
                "Daily exposure cap would be exceeded"
            );
            return ReserveOutcome::Denied(DenialReason::DailyCapExceeded);
        }

        let id = ReservationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        book.holds.insert(
            id,
            Hold {
                pool: pool.clone(),
                day,
                amount,
                expires_at: now + self.limits.reservation_ttl,
            },
        );
        ReserveOutcome::Allowed(id)
    }

    /// Hold `pool` for `user` without consuming budget.
    ///
    /// Used to settle leftover trades for a pair without racing a new
    /// dispatch. Returns `None` while another hold covers the pool.
    pub fn claim(&self, user: UserId, pool: &PoolId, day: NaiveDate) -> Option<ReservationId> {
        let (claimed, expired) = {
            let book = self.book(user);
            let mut book = book.lock();
            let now = Instant::now();
            let expired = book.drop_expired(user, now);
            let claimed = if book.holds.values().any(|hold| &hold.pool == pool) {
                None
            } else {
                let id = ReservationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                book.holds.insert(
                    id,
                    Hold {
                        pool: pool.clone(),
                        day,
                        amount: Decimal::ZERO,
                        expires_at: now + self.limits.reservation_ttl,
                    },
                );
                Some(id)
            };
            (claimed, expired)
        };
        self.forget(expired);
        if let Some(id) = claimed {
            self.owners.insert(id, user);
        }
        claimed
    }

    fn forget(&self, expired: Vec<LapsedHold>) {
        if expired.is_empty() {
            return;
        }
        for hold in &expired {
            self.owners.remove(&hold.reservation);
        }
        self.lapsed.lock().extend(expired);
    }

    /// Resolve a hold.
    ///
    /// A hold that already expired is gone; committing it returns
    /// [`ReleaseResult::Unknown`] and is logged as an error. The ledger is
    /// written after the user's book is unlocked.
    pub fn release(&self, id: ReservationId, outcome: ReleaseOutcome) -> ReleaseResult {
        let Some((_, user)) = self.owners.remove(&id) else {
            Self::log_unknown(id, outcome);
            return ReleaseResult::Unknown;
        };
        let book = self.book(user);
        let (hold, day_total) = {
            let mut book = book.lock();
            let Some(hold) = book.holds.remove(&id) else {
                drop(book);
                Self::log_unknown(id, outcome);
                return ReleaseResult::Unknown;
            };
            let day_total = match outcome {
                ReleaseOutcome::Commit => {
                    let total = book.committed.entry(hold.day).or_default();
                    *total += hold.amount;
                    *total
                }
                ReleaseOutcome::Rollback => Decimal::ZERO,
            };
            (hold, day_total)
        };

        match outcome {
            ReleaseOutcome::Rollback => {
                debug!(user = %user, reservation = %id, amount = %hold.amount, "Reservation rolled back");
                ReleaseResult::RolledBack
            }
            ReleaseOutcome::Commit => {
                self.persist_commit(user, hold.day, hold.amount);
                info!(
                    user = %user,
                    pool = %hold.pool,
                    amount = %hold.amount,
                    day_total = %day_total,
                    "Exposure committed"
                );
                ReleaseResult::Committed
            }
        }
    }

    /// Commit exposure that no longer has a hold, e.g. a trade confirmed
    /// after its reservation lapsed.
    pub fn settle(&self, user: UserId, day: NaiveDate, amount: Amount) {
        let day_total = {
            let book = self.book(user);
            let mut book = book.lock();
            let total = book.committed.entry(day).or_default();
            *total += amount.value();
            *total
        };
        self.persist_commit(user, day, amount.value());
        info!(user = %user, amount = %amount, day_total = %day_total, "Late exposure committed");
    }

    fn persist_commit(&self, user: UserId, day: NaiveDate, amount: Decimal) {
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.add(user, day, amount) {
                error!(user = %user, day = %day, error = %e, "Failed to persist ledger entry");
            }
        }
    }

    fn log_unknown(id: ReservationId, outcome: ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Commit => {
                error!(reservation = %id, "Commit of unknown or expired reservation");
            }
            ReleaseOutcome::Rollback => {
                debug!(reservation = %id, "Rollback of unknown or expired reservation");
            }
        }
    }

    /// Roll back every expired hold.
    ///
    /// Returns every hold that lapsed since the last sweep, including those
    /// dropped while reserving.
    pub fn sweep_expired(&self) -> Vec<LapsedHold> {
        let now = Instant::now();
        let users: Vec<UserId> = self.books.iter().map(|entry| *entry.key()).collect();
        let mut expired = Vec::new();
        for user in users {
            let book = self.book(user);
            let dropped = book.lock().drop_expired(user, now);
            expired.extend(dropped);
        }
        self.forget(expired);
        std::mem::take(&mut *self.lapsed.lock())
    }

    /// Committed exposure for a user on a day.
    #[must_use]
    pub fn committed(&self, user: UserId, day: NaiveDate) -> Decimal {
        self.books
            .get(&user)
            .map_or(Decimal::ZERO, |book| book.lock().committed_on(day))
    }

    /// Held but unresolved exposure for a user on a day.
    #[must_use]
    pub fn held(&self, user: UserId, day: NaiveDate) -> Decimal {
        self.books
            .get(&user)
            .map_or(Decimal::ZERO, |book| book.lock().held_on(day))
    }

    /// Number of unresolved holds across all users.
    #[must_use]
    pub fn open_reservations(&self) -> usize {
        self.books.iter().map(|book| book.lock().holds.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn amount(value: Decimal) -> Amount {
        Amount::try_new(value).unwrap()
    }

    fn guard() -> RiskGuard {
        RiskGuard::new(RiskLimits::default())
    }

    #[test]
    fn single_cap_checked_first() {
        let g = guard();
        assert_eq!(
            g.reserve(UserId::new(1), &PoolId::from("p"), amount(dec!(1000.01)), day()),
            ReserveOutcome::Denied(DenialReason::SingleTradeCapExceeded)
        );
        assert!(g
            .reserve(UserId::new(1), &PoolId::from("p"), amount(dec!(1000)), day())
            .is_allowed());
    }

    #[test]
    fn same_pool_is_busy_until_released() {
        let g = guard();
        let user = UserId::new(1);
        let pool = PoolId::from("p");
        let first = g.reserve(user, &pool, amount(dec!(10)), day());
        assert_eq!(
            g.reserve(user, &pool, amount(dec!(10)), day()),
            ReserveOutcome::Denied(DenialReason::PoolBusy)
        );
        g.release(first.reservation().unwrap(), ReleaseOutcome::Rollback);
        assert!(g.reserve(user, &pool, amount(dec!(10)), day()).is_allowed());
    }

    #[test]
    fn rollback_frees_budget_and_commit_consumes_it() {
        let g = RiskGuard::new(RiskLimits {
            max_daily_exposure: dec!(1000),
            ..RiskLimits::default()
        });
        let user = UserId::new(1);
        let a = g.reserve(user, &PoolId::from("a"), amount(dec!(600)), day());
        assert_eq!(
            g.reserve(user, &PoolId::from("b"), amount(dec!(600)), day()),
            ReserveOutcome::Denied(DenialReason::DailyCapExceeded)
        );
        assert_eq!(
            g.release(a.reservation().unwrap(), ReleaseOutcome::Rollback),
            ReleaseResult::RolledBack
        );
        let b = g.reserve(user, &PoolId::from("b"), amount(dec!(600)), day());
        assert_eq!(
            g.release(b.reservation().unwrap(), ReleaseOutcome::Commit),
            ReleaseResult::Committed
        );
        assert_eq!(g.committed(user, day()), dec!(600));
        assert_eq!(g.held(user, day()), Decimal::ZERO);
    }

    #[test]
    fn days_are_independent() {
        let g = guard();
        let user = UserId::new(1);
        g.restore([LedgerEntry::new(user, day(), dec!(10000))]);
        let next = day().succ_opt().unwrap();
        assert!(!g.reserve(user, &PoolId::from("p"), amount(dec!(1)), day()).is_allowed());
        assert!(g.reserve(user, &PoolId::from("p"), amount(dec!(1)), next).is_allowed());
        assert_eq!(g.committed(user, day()), dec!(10000));
    }

    #[test]
    fn double_release_is_unknown() {
        let g = guard();
        let res = g
            .reserve(UserId::new(1), &PoolId::from("p"), amount(dec!(5)), day())
            .reservation()
            .unwrap();
        g.release(res, ReleaseOutcome::Commit);
        assert_eq!(g.release(res, ReleaseOutcome::Commit), ReleaseResult::Unknown);
        assert_eq!(g.committed(UserId::new(1), day()), dec!(5));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_holds_roll_back() {
        let g = RiskGuard::new(RiskLimits {
            reservation_ttl: Duration::from_secs(60),
            ..RiskLimits::default()
        });
        let user = UserId::new(1);
        let res = g
            .reserve(user, &PoolId::from("p"), amount(dec!(500)), day())
            .reservation()
            .unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(g.sweep_expired().len(), 1);
        assert_eq!(g.held(user, day()), Decimal::ZERO);
        assert_eq!(g.release(res, ReleaseOutcome::Commit), ReleaseResult::Unknown);
        assert_eq!(g.committed(user, day()), Decimal::ZERO);
        assert_eq!(g.open_reservations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn holds_lapsed_while_reserving_are_reported_by_the_next_sweep() {
        let g = RiskGuard::new(RiskLimits {
            reservation_ttl: Duration::from_secs(60),
            ..RiskLimits::default()
        });
        let user = UserId::new(1);
        g.reserve(user, &PoolId::from("a"), amount(dec!(5)), day());
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(g.reserve(user, &PoolId::from("b"), amount(dec!(5)), day()).is_allowed());

        let lapsed = g.sweep_expired();
        assert_eq!(lapsed.len(), 1);
        assert_eq!(lapsed[0].user, user);
        assert_eq!(lapsed[0].pool, PoolId::from("a"));
        assert!(g.sweep_expired().is_empty());
    }

    #[test]
    fn personal_cap_tightens_but_never_loosens() {
        let g = RiskGuard::new(RiskLimits {
            max_daily_exposure: dec!(1000),
            ..RiskLimits::default()
        });
        let user = UserId::new(1);
        assert_eq!(
            g.reserve_within(user, &PoolId::from("a"), amount(dec!(300)), day(), Some(dec!(200))),
            ReserveOutcome::Denied(DenialReason::DailyCapExceeded)
        );
        assert_eq!(
            g.reserve_within(user, &PoolId::from("a"), amount(dec!(900)), day(), Some(dec!(5000))),
            ReserveOutcome::Allowed(ReservationId::new(1))
        );
        assert_eq!(
            g.reserve_within(user, &PoolId::from("b"), amount(dec!(200)), day(), Some(dec!(5000))),
            ReserveOutcome::Denied(DenialReason::DailyCapExceeded)
        );
    }

    #[test]
    fn claim_blocks_the_pool_but_not_the_budget() {
        let g = RiskGuard::new(RiskLimits {
            max_daily_exposure: dec!(100),
            ..RiskLimits::default()
        });
        let user = UserId::new(3);
        let claim = g.claim(user, &PoolId::from("a"), day()).unwrap();
        assert!(g.claim(user, &PoolId::from("a"), day()).is_none());
        assert_eq!(
            g.reserve(user, &PoolId::from("a"), amount(dec!(10)), day()),
            ReserveOutcome::Denied(DenialReason::PoolBusy)
        );
        assert!(g.reserve(user, &PoolId::from("b"), amount(dec!(100)), day()).is_allowed());
        assert_eq!(g.release(claim, ReleaseOutcome::Rollback), ReleaseResult::RolledBack);
        assert_eq!(g.held(user, day()), dec!(100));
    }

    #[test]
    fn settle_commits_without_a_hold() {
        let g = guard();
        let user = UserId::new(2);
        g.settle(user, day(), amount(dec!(250)));
        assert_eq!(g.committed(user, day()), dec!(250));
        assert_eq!(g.open_reservations(), 0);
    }

    /// Ledger that reads the guard back while it is being written.
    #[derive(Default)]
    struct ReadBackLedger {
        guard: std::sync::OnceLock<std::sync::Weak<RiskGuard>>,
        seen: Mutex<Vec<Decimal>>,
    }

    impl LedgerStore for ReadBackLedger {
        fn add(&self, user: UserId, day: NaiveDate, _amount: Decimal) -> Result<(), crate::error::StoreError> {
            if let Some(guard) = self.guard.get().and_then(std::sync::Weak::upgrade) {
                self.seen.lock().push(guard.committed(user, day));
            }
            Ok(())
        }

        fn entries_for_day(&self, _day: NaiveDate) -> Result<Vec<LedgerEntry>, crate::error::StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn ledger_is_written_after_the_user_lock_is_dropped() {
        let ledger = Arc::new(ReadBackLedger::default());
        let g = Arc::new(guard().with_ledger(ledger.clone()));
        let _ = ledger.guard.set(Arc::downgrade(&g));
        let user = UserId::new(1);

        let res = g
            .reserve(user, &PoolId::from("p"), amount(dec!(40)), day())
            .reservation()
            .unwrap();
        assert_eq!(g.release(res, ReleaseOutcome::Commit), ReleaseResult::Committed);
        g.settle(user, day(), amount(dec!(10)));

        assert_eq!(*ledger.seen.lock(), vec![dec!(40), dec!(50)]);
    }
}
