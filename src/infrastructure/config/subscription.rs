//! Seed subscriptions declared in the config file.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::error::DomainError;
use crate::domain::id::UserId;
use crate::domain::money::Amount;
use crate::domain::subscription::{PoolFilter, Subscription, TradeMode};

/// One `[[subscriptions]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    pub user: i64,
    /// Pool id, or `any` for every matching pool.
    #[serde(default = "default_pool")]
    pub pool: String,
    /// Falls back to the agent's simulation default.
    #[serde(default)]
    pub mode: Option<TradeMode>,
    /// Fixed trade size in dollars.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Personal APY floor in percent.
    #[serde(default)]
    pub min_apy: Option<f64>,
    /// Personal daily exposure limit in dollars.
    #[serde(default)]
    pub max_daily: Option<Decimal>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_pool() -> String {
    "any".into()
}

const fn default_active() -> bool {
    true
}

impl SubscriptionConfig {
    /// Build the domain subscription.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NonPositiveAmount`] for a zero or negative
    /// amount or daily limit.
    pub fn to_subscription(&self, default_mode: TradeMode) -> Result<Subscription, DomainError> {
        let filter = self
            .pool
            .parse::<PoolFilter>()
            .unwrap_or(PoolFilter::Any);
        let mut sub = Subscription::new(
            UserId::new(self.user),
            filter,
            self.mode.unwrap_or(default_mode),
        );
        sub.amount = self.amount.map(Amount::try_new).transpose()?;
        sub.min_apy = self.min_apy;
        sub.max_daily = self.max_daily.map(Amount::try_new).transpose()?;
        sub.active = self.active;
        Ok(sub)
    }
}
