//! Risk guard behavior under concurrency and across restarts.

use std::sync::Arc;

use chrono::NaiveDate;
use poolsentry::adapter::outbound::memory::MemoryLedgerStore;
use poolsentry::application::risk::RiskGuard;
use poolsentry::domain::exposure::{DenialReason, ReleaseOutcome};
use poolsentry::domain::id::{PoolId, UserId};
use poolsentry::port::inbound::risk::{ReleaseResult, ReserveOutcome};
use poolsentry::port::outbound::store::LedgerStore;
use poolsentry::testkit::config::limits;
use poolsentry::testkit::domain::amount;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
}

fn pool(id: &str) -> PoolId {
    PoolId::new(id)
}

#[test]
fn committed_exposure_bounds_later_reservations() {
    let guard = RiskGuard::new(limits(dec!(10000), dec!(10000)));
    let user = UserId::new(1);

    let id = guard
        .reserve(user, &pool("a"), amount(dec!(9500)), day())
        .reservation()
        .expect("first trade fits");
    assert_eq!(guard.release(id, ReleaseOutcome::Commit), ReleaseResult::Committed);

    let denied = guard.reserve(user, &pool("b"), amount(dec!(600)), day());
    assert_eq!(denied.denial(), Some(DenialReason::DailyCapExceeded));

    let allowed = guard.reserve(user, &pool("b"), amount(dec!(500)), day());
    assert!(allowed.is_allowed());
}

/// Two reservations racing for the same budget: at most one may win.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_reservations_cannot_exceed_daily_cap() {
    for _ in 0..50 {
        let guard = Arc::new(RiskGuard::new(limits(dec!(10000), dec!(10000))));
        let barrier = Arc::new(Barrier::new(2));
        let user = UserId::new(7);

        let mut handles = Vec::new();
        for name in ["manual", "autonomous"] {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                guard.reserve(user, &PoolId::new(name), amount(dec!(6000)), day())
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1, "exactly one reservation fits under the cap");
        assert_eq!(guard.held(user, day()), dec!(6000));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_same_pool_reservations_leave_one_hold() {
    let guard = Arc::new(RiskGuard::new(limits(dec!(1000), dec!(10000))));
    let barrier = Arc::new(Barrier::new(2));
    let user = UserId::new(8);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let guard = Arc::clone(&guard);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            guard.reserve(user, &PoolId::new("shared"), amount(dec!(100)), day())
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    assert_eq!(outcomes.iter().filter(|o| o.is_allowed()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, ReserveOutcome::Denied(DenialReason::PoolBusy))));
    assert_eq!(guard.open_reservations(), 1);
}

#[test]
fn commits_survive_a_restart_through_the_ledger() {
    let ledger = Arc::new(MemoryLedgerStore::new());
    let user = UserId::new(3);

    let first = RiskGuard::new(limits(dec!(1000), dec!(1500))).with_ledger(ledger.clone());
    let id = first
        .reserve(user, &pool("a"), amount(dec!(1000)), day())
        .reservation()
        .unwrap();
    first.release(id, ReleaseOutcome::Commit);

    let second = RiskGuard::new(limits(dec!(1000), dec!(1500))).with_ledger(ledger.clone());
    second.restore(ledger.entries_for_day(day()).unwrap());
    assert_eq!(second.committed(user, day()), dec!(1000));

    let denied = second.reserve(user, &pool("b"), amount(dec!(600)), day());
    assert_eq!(denied.denial(), Some(DenialReason::DailyCapExceeded));
}

#[test]
fn rollback_is_not_persisted() {
    let ledger = Arc::new(MemoryLedgerStore::new());
    let guard = RiskGuard::new(limits(dec!(1000), dec!(1500))).with_ledger(ledger.clone());
    let id = guard
        .reserve(UserId::new(4), &pool("a"), amount(dec!(400)), day())
        .reservation()
        .unwrap();
    assert_eq!(guard.release(id, ReleaseOutcome::Rollback), ReleaseResult::RolledBack);
    assert!(ledger.entries_for_day(day()).unwrap().is_empty());
}
