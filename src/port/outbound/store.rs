//! Persistence ports.
//!
//! All stores are synchronous: the in-memory and SQLite backends both
//! complete without suspending, and callers hold no locks across them.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::agent::AgentState;
use crate::domain::exposure::LedgerEntry;
use crate::domain::id::{IdempotencyKey, PoolId, UserId};
use crate::domain::subscription::Subscription;
use crate::domain::trade::TradeRecord;
use crate::error::StoreError;

/// Trade records keyed by idempotency key.
pub trait TradeStore: Send + Sync {
    /// Insert `record` unless a record with the same key exists.
    ///
    /// Returns `true` when inserted. The stored record starts at version 1.
    fn insert_if_absent(&self, record: &TradeRecord) -> Result<bool, StoreError>;

    fn get(&self, key: &IdempotencyKey) -> Result<Option<TradeRecord>, StoreError>;

    /// Replace the stored record if its version still equals `record.version()`.
    ///
    /// Returns the new version. A mismatch yields [`StoreError::Conflict`].
    fn update(&self, record: &TradeRecord) -> Result<u64, StoreError>;

    /// Non-terminal records for a user and pool.
    fn open_for(&self, user: UserId, pool: &PoolId) -> Result<Vec<TradeRecord>, StoreError>;

    /// Every record for a user, newest first.
    fn for_user(&self, user: UserId) -> Result<Vec<TradeRecord>, StoreError>;
}

/// User subscriptions.
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the subscription for `(user, filter)`.
    fn upsert(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// Active subscriptions only.
    fn active(&self) -> Result<Vec<Subscription>, StoreError>;

    fn for_user(&self, user: UserId) -> Result<Vec<Subscription>, StoreError>;
}

/// Daily committed exposure.
pub trait LedgerStore: Send + Sync {
    /// Add `amount` to the entry for `(user, day)`, creating it if needed.
    fn add(&self, user: UserId, day: NaiveDate, amount: Decimal) -> Result<(), StoreError>;

    fn entries_for_day(&self, day: NaiveDate) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Coordinator state, one row.
pub trait AgentStateStore: Send + Sync {
    fn load(&self) -> Result<Option<AgentState>, StoreError>;

    fn save(&self, state: &AgentState) -> Result<(), StoreError>;
}
