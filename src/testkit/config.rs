//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::retry::RetryPolicy;
use crate::application::risk::RiskLimits;
use crate::domain::subscription::TradeMode;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::subscription::SubscriptionConfig;

/// Pool API address used by configs that never reach the network.
pub const POOL_API: &str = "http://127.0.0.1:5000";

/// Valid config with in-memory stores and millisecond backoff.
pub fn config() -> Config {
    let mut config = Config::default();
    config.market.base_url = POOL_API.to_string();
    config.retry.base_backoff_ms = 1;
    config.retry.max_backoff_ms = 10;
    config.swap.confirm_poll_ms = 1;
    config
}

/// [`config`] plus one subscription for `user` on `pool` (`any` for all pools).
pub fn config_with_subscription(user: i64, pool: &str) -> Config {
    let mut config = config();
    config.subscriptions.push(subscription(user, pool, None, None));
    config
}

/// A seed subscription entry.
pub fn subscription(
    user: i64,
    pool: &str,
    mode: Option<TradeMode>,
    amount: Option<Decimal>,
) -> SubscriptionConfig {
    SubscriptionConfig {
        user,
        pool: pool.to_string(),
        mode,
        amount,
        min_apy: None,
        max_daily: None,
        active: true,
    }
}

/// Risk limits with the given caps and a ten minute hold TTL.
pub fn limits(max_single_trade: Decimal, max_daily_exposure: Decimal) -> RiskLimits {
    RiskLimits {
        max_single_trade,
        max_daily_exposure,
        reservation_ttl: Duration::from_secs(600),
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(10))
}
