//! Builders for domain primitives.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::id::{PoolId, UserId};
use crate::domain::money::Amount;
use crate::domain::snapshot::PoolSnapshot;
use crate::domain::subscription::{PoolFilter, Subscription, TradeMode};

/// A pool that clears the default TVL and volume thresholds.
pub fn snapshot(id: &str, apy: f64) -> PoolSnapshot {
    snapshot_with(id, apy, 2_000_000.0, 500_000.0)
}

pub fn snapshot_with(id: &str, apy: f64, tvl: f64, volume_24h: f64) -> PoolSnapshot {
    PoolSnapshot::new(
        PoolId::new(id),
        format!("{}/USDC", id.to_uppercase()),
        apy,
        tvl,
        volume_24h,
        Utc::now(),
    )
}

/// A positive amount.
///
/// # Panics
/// Panics on zero or negative values.
pub fn amount(value: Decimal) -> Amount {
    Amount::try_new(value).expect("test amounts are positive")
}

/// A subscription to one pool with a fixed amount.
pub fn subscription(user: i64, pool: &str, mode: TradeMode, value: Decimal) -> Subscription {
    let mut sub = Subscription::new(UserId::new(user), PoolFilter::Pool(PoolId::new(pool)), mode);
    sub.amount = Some(amount(value));
    sub
}
