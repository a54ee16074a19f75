//! Per-user rolling-hour notification throttle.
//!
//! A slot in the user's window is taken before the send starts, so
//! concurrent sends for the same user can never overshoot the cap. Messages
//! over the cap are dropped, never queued. A send that fails after every
//! retry gives its slot back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use crate::domain::id::UserId;
use crate::port::outbound::messenger::{Message, Messenger};

/// What happened to one enqueued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Dropped because the user hit the hourly cap.
    RateLimited,
    /// Every delivery attempt failed.
    Failed,
}

/// Throttle counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    pub delivered: u64,
    pub rate_limited: u64,
    pub failed: u64,
}

/// Rate-limits and delivers user notifications.
pub struct NotificationThrottler {
    messenger: Arc<dyn Messenger>,
    cap: usize,
    window: Duration,
    retry: RetryPolicy,
    sent: DashMap<UserId, VecDeque<Instant>>,
    delivered: AtomicU64,
    rate_limited: AtomicU64,
    failed: AtomicU64,
}

impl NotificationThrottler {
    pub fn new(messenger: Arc<dyn Messenger>, per_hour: u32, retry: RetryPolicy) -> Self {
        Self::with_window(messenger, per_hour, Duration::from_secs(3600), retry)
    }

    pub fn with_window(
        messenger: Arc<dyn Messenger>,
        cap: u32,
        window: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            messenger,
            cap: cap as usize,
            window,
            retry,
            sent: DashMap::new(),
            delivered: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn messenger_name(&self) -> &'static str {
        self.messenger.name()
    }

    /// Take a slot in the user's window, or `None` when the cap is reached.
    fn take_slot(&self, user: UserId) -> Option<Instant> {
        let now = Instant::now();
        let mut window = self.sent.entry(user).or_default();
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.cap {
            return None;
        }
        window.push_back(now);
        Some(now)
    }

    fn return_slot(&self, user: UserId, slot: Instant) {
        if let Some(mut window) = self.sent.get_mut(&user) {
            if let Some(pos) = window.iter().position(|t| *t == slot) {
                window.remove(pos);
            }
        }
    }

    /// Deliver `message` now if the user is under the cap, otherwise drop it.
    pub async fn enqueue(&self, user: UserId, message: Message) -> Delivery {
        let Some(slot) = self.take_slot(user) else {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
            warn!(user = %user, reason = "RateLimited", cap = self.cap, "Notification dropped");
            return Delivery::RateLimited;
        };

        let attempt = self
            .retry
            .run("notify", || self.messenger.send(user, &message))
            .await;
        match attempt.result {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(user = %user, attempts = attempt.attempts, "Notification delivered");
                Delivery::Delivered
            }
            Err(e) => {
                self.return_slot(user, slot);
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user = %user,
                    attempts = attempt.attempts,
                    error = %e,
                    "Notification delivery failed"
                );
                Delivery::Failed
            }
        }
    }

    /// Messages counted against the user's current window.
    #[must_use]
    pub fn in_window(&self, user: UserId) -> usize {
        let now = Instant::now();
        self.sent.get(&user).map_or(0, |window| {
            window
                .iter()
                .filter(|t| now.duration_since(**t) < self.window)
                .count()
        })
    }

    #[must_use]
    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
