//! Notification throttler: per-user hourly cap and delivery retries.

use std::sync::Arc;
use std::time::Duration;

use poolsentry::application::throttle::{Delivery, NotificationThrottler};
use poolsentry::domain::id::UserId;
use poolsentry::error::DeliveryError;
use poolsentry::port::outbound::messenger::Message;
use poolsentry::testkit::config::fast_retry;
use poolsentry::testkit::messenger::RecordingMessenger;

fn throttler(messenger: Arc<RecordingMessenger>) -> NotificationThrottler {
    NotificationThrottler::new(messenger, 5, fast_retry(3))
}

#[tokio::test]
async fn sixth_message_in_an_hour_is_dropped() {
    let messenger = Arc::new(RecordingMessenger::new());
    let throttler = throttler(messenger.clone());
    let user = UserId::new(1);

    for i in 0..5 {
        let delivery = throttler.enqueue(user, Message::text(format!("msg {i}"))).await;
        assert_eq!(delivery, Delivery::Delivered);
    }
    let sixth = throttler.enqueue(user, Message::text("msg 5")).await;

    assert_eq!(sixth, Delivery::RateLimited);
    assert_eq!(messenger.sent_to(user).len(), 5);
    assert_eq!(throttler.stats().rate_limited, 1);
}

#[tokio::test]
async fn users_have_separate_windows() {
    let messenger = Arc::new(RecordingMessenger::new());
    let throttler = throttler(messenger.clone());

    for _ in 0..5 {
        throttler.enqueue(UserId::new(1), Message::text("a")).await;
    }
    let other = throttler.enqueue(UserId::new(2), Message::text("b")).await;

    assert_eq!(other, Delivery::Delivered);
    assert_eq!(throttler.in_window(UserId::new(1)), 5);
    assert_eq!(throttler.in_window(UserId::new(2)), 1);
}

#[tokio::test(start_paused = true)]
async fn window_rolls_after_an_hour() {
    let messenger = Arc::new(RecordingMessenger::new());
    let throttler = throttler(messenger.clone());
    let user = UserId::new(3);

    for _ in 0..5 {
        throttler.enqueue(user, Message::text("x")).await;
    }
    assert_eq!(
        throttler.enqueue(user, Message::text("x")).await,
        Delivery::RateLimited
    );

    tokio::time::advance(Duration::from_secs(3601)).await;
    assert_eq!(
        throttler.enqueue(user, Message::text("x")).await,
        Delivery::Delivered
    );
}

#[tokio::test]
async fn concurrent_sends_never_overshoot_the_cap() {
    let messenger = Arc::new(RecordingMessenger::new());
    let throttler = Arc::new(throttler(messenger.clone()));
    let user = UserId::new(4);

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let throttler = Arc::clone(&throttler);
            tokio::spawn(async move { throttler.enqueue(user, Message::text(format!("{i}"))).await })
        })
        .collect();

    let mut delivered = 0;
    for handle in handles {
        if handle.await.unwrap() == Delivery::Delivered {
            delivered += 1;
        }
    }
    assert_eq!(delivered, 5);
    assert_eq!(messenger.sent_to(user).len(), 5);
}

#[tokio::test]
async fn failed_delivery_is_retried_and_frees_its_slot() {
    let messenger = Arc::new(RecordingMessenger::failing(DeliveryError::Transient(
        "timeout".into(),
    )));
    let throttler = throttler(messenger.clone());
    let user = UserId::new(5);

    let delivery = throttler.enqueue(user, Message::text("x")).await;

    assert_eq!(delivery, Delivery::Failed);
    assert_eq!(messenger.attempts(), 3);
    assert_eq!(throttler.in_window(user), 0);
}

#[tokio::test]
async fn undeliverable_recipient_is_not_retried() {
    let messenger = Arc::new(RecordingMessenger::failing(DeliveryError::Permanent(
        "bot was blocked by the user".into(),
    )));
    let throttler = throttler(messenger.clone());

    let delivery = throttler.enqueue(UserId::new(6), Message::text("x")).await;

    assert_eq!(delivery, Delivery::Failed);
    assert_eq!(messenger.attempts(), 1);
}
