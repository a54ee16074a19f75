//! Action dispatcher: idempotency, simulation, live execution and re-quotes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use poolsentry::application::dispatch::{
    AbandonReason, DispatchConfig, DispatchOutcome, DispatchRequest, Dispatcher, SkipReason,
};
use poolsentry::application::risk::RiskGuard;
use poolsentry::application::throttle::NotificationThrottler;
use poolsentry::domain::exposure::DenialReason;
use poolsentry::domain::id::{CycleId, PoolId, TradeTrigger, UserId};
use poolsentry::domain::subscription::TradeMode;
use poolsentry::domain::trade::{FailureReason, QuoteInfo, TradeRecord, TradeState, TradeStatus};
use poolsentry::error::{StoreError, SwapError};
use poolsentry::port::outbound::store::TradeStore;
use poolsentry::port::outbound::swap::TxStatus;
use poolsentry::testkit::config::{fast_retry, limits};
use poolsentry::testkit::domain::amount;
use poolsentry::testkit::messenger::RecordingMessenger;
use poolsentry::testkit::store::FlakyTradeStore;
use poolsentry::testkit::swap::ScriptedSwap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Rig {
    dispatcher: Arc<Dispatcher>,
    risk: Arc<RiskGuard>,
    swap: Arc<ScriptedSwap>,
    trades: Arc<FlakyTradeStore>,
    messenger: Arc<RecordingMessenger>,
}

fn rig(swap: ScriptedSwap) -> Rig {
    rig_with(swap, FlakyTradeStore::new())
}

fn rig_with(swap: ScriptedSwap, trades: FlakyTradeStore) -> Rig {
    let risk = Arc::new(RiskGuard::new(limits(dec!(1000), dec!(10000))));
    let swap = Arc::new(swap);
    let trades = Arc::new(trades);
    let messenger = Arc::new(RecordingMessenger::new());
    let throttler = Arc::new(NotificationThrottler::new(
        messenger.clone(),
        5,
        fast_retry(2),
    ));
    let config = DispatchConfig {
        max_slippage: dec!(0.05),
        max_requotes: 2,
        conflict_retries: 3,
        confirm_poll: Duration::from_millis(1),
        confirm_timeout: Duration::from_secs(5),
    };
    let dispatcher = Arc::new(Dispatcher::new(
        config,
        risk.clone(),
        swap.clone(),
        trades.clone(),
        throttler,
        fast_retry(2),
    ));
    Rig {
        dispatcher,
        risk,
        swap,
        trades,
        messenger,
    }
}

fn request(mode: TradeMode, value: Decimal) -> DispatchRequest {
    DispatchRequest {
        user: UserId::new(11),
        pool: PoolId::new("pool-a"),
        trigger: TradeTrigger::Cycle(CycleId::new(4)),
        mode,
        amount: amount(value),
        daily_limit: None,
    }
}

fn next_cycle(mode: TradeMode, value: Decimal, cycle: u64) -> DispatchRequest {
    DispatchRequest {
        trigger: TradeTrigger::Cycle(CycleId::new(cycle)),
        ..request(mode, value)
    }
}

fn today_committed(rig: &Rig) -> Decimal {
    rig.risk.committed(UserId::new(11), Utc::now().date_naive())
}

#[tokio::test]
async fn concurrent_dispatch_of_one_trigger_creates_one_record() {
    let rig = rig(ScriptedSwap::new().with_execute_delay(Duration::from_millis(50)));
    let req = request(TradeMode::Live, dec!(100));

    let (a, b) = tokio::join!(
        rig.dispatcher.dispatch(req.clone()),
        rig.dispatcher.dispatch(req.clone())
    );

    let confirmed = [&a, &b].iter().filter(|o| o.is_confirmed()).count();
    let skipped = [&a, &b].iter().filter(|o| o.is_skipped()).count();
    assert_eq!((confirmed, skipped), (1, 1), "got {a:?} and {b:?}");
    assert_eq!(rig.trades.len(), 1);
    assert_eq!(rig.swap.executed().len(), 1);
    assert_eq!(today_committed(&rig), dec!(100));
}

#[tokio::test]
async fn repeated_trigger_is_a_no_op() {
    let rig = rig(ScriptedSwap::new());
    let req = request(TradeMode::Live, dec!(100));

    assert!(rig.dispatcher.dispatch(req.clone()).await.is_confirmed());
    let again = rig.dispatcher.dispatch(req).await;
    assert!(again.is_skipped());
    assert_eq!(rig.swap.executed().len(), 1);
    assert_eq!(today_committed(&rig), dec!(100));
}

#[tokio::test]
async fn simulation_quotes_but_never_executes() {
    let rig = rig(ScriptedSwap::new());
    let outcome = rig.dispatcher.dispatch(request(TradeMode::Simulate, dec!(250))).await;

    assert!(matches!(outcome, DispatchOutcome::Confirmed { simulated: true, .. }));
    assert_eq!(rig.swap.quote_calls(), 1);
    assert!(rig.swap.executed().is_empty());
    assert_eq!(today_committed(&rig), Decimal::ZERO);
    assert_eq!(rig.risk.open_reservations(), 0);

    let sent = rig.messenger.sent_to(UserId::new(11));
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("Simulated"));
}

#[tokio::test]
async fn live_trade_commits_exposure_and_records_tx() {
    let rig = rig(ScriptedSwap::new().then_status(Ok(TxStatus::Pending)));
    let req = request(TradeMode::Live, dec!(300));
    let key = req.key();

    let outcome = rig.dispatcher.dispatch(req).await;
    assert!(matches!(outcome, DispatchOutcome::Confirmed { simulated: false, .. }));
    assert_eq!(today_committed(&rig), dec!(300));
    assert_eq!(rig.swap.status_calls(), 2);

    let record = rig.trades.get(&key).unwrap().unwrap();
    assert_eq!(record.status(), TradeStatus::Confirmed);
    assert_eq!(record.tx_ref(), Some("tx-1"));

    let sent = rig.messenger.sent_to(UserId::new(11));
    assert!(sent[0].text.contains("Trade confirmed"));
    assert!(sent[0].text.contains("tx-1"));
}

#[tokio::test]
async fn expired_quote_is_requoted_once() {
    let rig = rig(ScriptedSwap::new().then_expired());
    let req = request(TradeMode::Live, dec!(100));
    let key = req.key();

    assert!(rig.dispatcher.dispatch(req).await.is_confirmed());
    assert_eq!(rig.swap.quote_calls(), 2);
    assert_eq!(rig.swap.executed(), vec!["q-1".to_string(), "q-2".to_string()]);
    assert_eq!(rig.trades.get(&key).unwrap().unwrap().requotes(), 1);
}

#[tokio::test]
async fn requotes_are_bounded() {
    let rig = rig(
        ScriptedSwap::new()
            .then_expired()
            .then_expired()
            .then_expired(),
    );
    let outcome = rig.dispatcher.dispatch(request(TradeMode::Live, dec!(100))).await;

    match outcome {
        DispatchOutcome::Failed { reason, .. } => {
            assert_eq!(reason, FailureReason::QuoteExpired { requotes: 2 });
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(rig.swap.executed().len(), 3);
    assert_eq!(today_committed(&rig), Decimal::ZERO);
    assert_eq!(rig.risk.open_reservations(), 0);
}

#[tokio::test]
async fn requote_for_a_different_amount_fails_the_trade() {
    let rig = rig(
        ScriptedSwap::new()
            .then_quote_amount(dec!(100))
            .then_quote_amount(dec!(140))
            .then_expired(),
    );
    let outcome = rig.dispatcher.dispatch(request(TradeMode::Live, dec!(100))).await;

    match outcome {
        DispatchOutcome::Failed { reason, .. } => assert_eq!(
            reason,
            FailureReason::AmountDrift {
                reserved: dec!(100),
                quoted: dec!(140),
            }
        ),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(rig.swap.executed().len(), 1);
    assert_eq!(rig.risk.open_reservations(), 0);
}

#[tokio::test]
async fn trade_over_the_single_cap_is_denied_and_reported() {
    let rig = rig(ScriptedSwap::new());
    let req = request(TradeMode::Live, dec!(1500));
    let key = req.key();

    let outcome = rig.dispatcher.dispatch(req).await;
    match outcome {
        DispatchOutcome::Failed { reason, .. } => assert_eq!(
            reason,
            FailureReason::RiskLimit {
                denial: DenialReason::SingleTradeCapExceeded
            }
        ),
        other => panic!("expected denial, got {other:?}"),
    }
    assert_eq!(rig.swap.quote_calls(), 0);
    assert_eq!(
        rig.trades.get(&key).unwrap().unwrap().status(),
        TradeStatus::Failed
    );
    let sent = rig.messenger.sent_to(UserId::new(11));
    assert!(sent[0].text.contains("Trade failed"));
}

#[tokio::test]
async fn rejected_execution_rolls_back() {
    let rig = rig(ScriptedSwap::new().then_execute(Err(SwapError::Rejected(
        "insufficient balance".into(),
    ))));
    let outcome = rig.dispatcher.dispatch(request(TradeMode::Live, dec!(100))).await;

    assert!(outcome.is_failed());
    assert_eq!(today_committed(&rig), Decimal::ZERO);
    assert_eq!(rig.risk.open_reservations(), 0);
}

#[tokio::test]
async fn failed_transaction_rolls_back() {
    let rig = rig(ScriptedSwap::new().then_status(Ok(TxStatus::Failed("slippage".into()))));
    let outcome = rig.dispatcher.dispatch(request(TradeMode::Live, dec!(100))).await;

    match outcome {
        DispatchOutcome::Failed { reason, .. } => assert_eq!(
            reason,
            FailureReason::ExecutionFailed {
                detail: "slippage".into()
            }
        ),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(today_committed(&rig), Decimal::ZERO);
}

#[tokio::test]
async fn quote_outage_fails_without_executing() {
    let rig = rig(
        ScriptedSwap::new()
            .then_quote_err(SwapError::Transient("503".into()))
            .then_quote_err(SwapError::Transient("503".into())),
    );
    let outcome = rig.dispatcher.dispatch(request(TradeMode::Live, dec!(100))).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Failed {
            reason: FailureReason::QuoteUnavailable { .. },
            ..
        }
    ));
    assert_eq!(rig.swap.quote_calls(), 2);
    assert!(rig.swap.executed().is_empty());
}

#[tokio::test]
async fn personal_daily_limit_denies_before_the_global_cap() {
    let rig = rig(ScriptedSwap::new());
    let mut first = request(TradeMode::Live, dec!(300));
    first.daily_limit = Some(amount(dec!(500)));
    assert!(rig.dispatcher.dispatch(first).await.is_confirmed());

    let mut second = next_cycle(TradeMode::Live, dec!(300), 5);
    second.daily_limit = Some(amount(dec!(500)));
    match rig.dispatcher.dispatch(second).await {
        DispatchOutcome::Failed { reason, .. } => assert_eq!(
            reason,
            FailureReason::RiskLimit {
                denial: DenialReason::DailyCapExceeded
            }
        ),
        other => panic!("expected denial, got {other:?}"),
    }
    assert_eq!(today_committed(&rig), dec!(300));
}

#[tokio::test]
async fn version_conflicts_within_the_retry_bound_still_confirm() {
    let rig = rig_with(ScriptedSwap::new(), FlakyTradeStore::new().then_conflicts(3));
    let req = request(TradeMode::Simulate, dec!(100));
    let key = req.key();

    let outcome = rig.dispatcher.dispatch(req).await;
    assert!(outcome.is_confirmed(), "got {outcome:?}");
    // Four writes for the quote, one for the confirm.
    assert_eq!(rig.trades.update_calls(), 5);
    assert_eq!(
        rig.trades.get(&key).unwrap().unwrap().status(),
        TradeStatus::Confirmed
    );
}

#[tokio::test]
async fn conflicts_past_the_retry_bound_abandon_but_still_finish_the_trade() {
    let rig = rig_with(ScriptedSwap::new(), FlakyTradeStore::new().then_conflicts(4));
    let req = request(TradeMode::Simulate, dec!(100));
    let key = req.key();

    let outcome = rig.dispatcher.dispatch(req).await;
    assert!(
        matches!(
            outcome,
            DispatchOutcome::Abandoned {
                reason: AbandonReason::Store(StoreError::Conflict { .. }),
                ..
            }
        ),
        "got {outcome:?}"
    );

    let stored = rig.trades.get(&key).unwrap().unwrap();
    assert!(matches!(
        stored.state(),
        TradeState::Failed {
            reason: FailureReason::Interrupted { .. }
        }
    ));
    assert!(rig.trades.open().is_empty());
    assert_eq!(rig.risk.open_reservations(), 0);

    let sent = rig.messenger.sent_to(UserId::new(11));
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("Trade failed"));
    assert!(sent[0].text.contains("interrupted"));
}

#[tokio::test]
async fn interrupted_trade_is_failed_and_reported() {
    let rig = rig_with(
        ScriptedSwap::new(),
        FlakyTradeStore::new().then_backend_errors(1, "disk I/O error"),
    );

    let outcome = rig.dispatcher.dispatch(request(TradeMode::Simulate, dec!(100))).await;
    assert!(matches!(outcome, DispatchOutcome::Abandoned { .. }));
    assert!(rig.trades.open().is_empty());
    assert_eq!(rig.risk.open_reservations(), 0);
    assert_eq!(rig.messenger.sent_to(UserId::new(11)).len(), 1);

    let retry = rig.dispatcher.dispatch(next_cycle(TradeMode::Simulate, dec!(100), 5)).await;
    assert!(retry.is_confirmed(), "got {retry:?}");
    assert!(rig.trades.open().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unwritable_trade_keeps_its_hold_until_settled_by_the_sweep() {
    let rig = rig_with(
        ScriptedSwap::new(),
        FlakyTradeStore::new().then_backend_errors(2, "disk I/O error"),
    );

    let outcome = rig.dispatcher.dispatch(request(TradeMode::Simulate, dec!(100))).await;
    assert!(matches!(outcome, DispatchOutcome::Abandoned { .. }));
    assert_eq!(rig.trades.open().len(), 1);
    assert_eq!(rig.risk.open_reservations(), 1);
    assert_eq!(rig.messenger.sent_to(UserId::new(11)).len(), 1);

    let blocked = rig.dispatcher.dispatch(next_cycle(TradeMode::Simulate, dec!(100), 5)).await;
    assert_eq!(blocked, DispatchOutcome::Skipped(SkipReason::InFlight));

    tokio::time::advance(Duration::from_secs(601)).await;
    let lapsed = rig.risk.sweep_expired();
    assert_eq!(lapsed.len(), 1);
    rig.dispatcher.settle_lapsed(&lapsed[0]).await;

    let records = rig.trades.for_user(UserId::new(11)).unwrap();
    assert!(rig.trades.open().is_empty());
    assert!(records.iter().any(|r| matches!(
        r.state(),
        TradeState::Failed {
            reason: FailureReason::ReservationExpired
        }
    )));
    assert_eq!(rig.risk.open_reservations(), 0);
    assert_eq!(rig.messenger.sent_to(UserId::new(11)).len(), 2);

    let next = rig.dispatcher.dispatch(next_cycle(TradeMode::Simulate, dec!(100), 6)).await;
    assert!(next.is_confirmed(), "got {next:?}");
}

#[tokio::test(start_paused = true)]
async fn next_dispatch_settles_a_leftover_before_trading() {
    let rig = rig_with(
        ScriptedSwap::new(),
        FlakyTradeStore::new().then_backend_errors(2, "disk I/O error"),
    );
    rig.dispatcher.dispatch(request(TradeMode::Simulate, dec!(100))).await;
    assert_eq!(rig.trades.open().len(), 1);

    tokio::time::advance(Duration::from_secs(601)).await;
    let next = rig.dispatcher.dispatch(next_cycle(TradeMode::Simulate, dec!(100), 5)).await;
    assert!(next.is_confirmed(), "got {next:?}");
    assert!(rig.trades.open().is_empty());

    // The lapsed hold is still reported; settling it finds nothing left.
    let lapsed = rig.risk.sweep_expired();
    assert_eq!(lapsed.len(), 1);
    rig.dispatcher.settle_lapsed(&lapsed[0]).await;
    assert_eq!(rig.risk.open_reservations(), 0);
    assert_eq!(rig.messenger.sent_to(UserId::new(11)).len(), 3);
}

#[tokio::test]
async fn submitted_leftover_is_followed_to_its_result_and_committed() {
    let rig = rig(ScriptedSwap::new());
    let now = Utc::now();
    let mut leftover = TradeRecord::pending(
        UserId::new(11),
        PoolId::new("pool-a"),
        TradeTrigger::Cycle(CycleId::new(1)),
        TradeMode::Live,
        amount(dec!(200)),
        now,
    );
    leftover
        .quoted(
            QuoteInfo {
                quote_ref: "q-old".into(),
                expected_out: dec!(199),
                expires_at: now,
            },
            now,
        )
        .unwrap();
    leftover.advance(TradeState::Submitted, now).unwrap();
    leftover.attach_tx("tx-old", now).unwrap();
    rig.trades.seed(&leftover);

    let outcome = rig.dispatcher.dispatch(request(TradeMode::Live, dec!(100))).await;
    assert!(outcome.is_confirmed(), "got {outcome:?}");

    let settled = rig.trades.get(leftover.key()).unwrap().unwrap();
    assert_eq!(settled.status(), TradeStatus::Confirmed);
    assert_eq!(today_committed(&rig), dec!(300));

    let sent = rig.messenger.sent_to(UserId::new(11));
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("tx-old"));
}
