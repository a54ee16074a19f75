//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{agent_state, exposure_ledger, subscriptions, trades, users};

/// Database row for a trade record.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub key: String,
    pub user_id: i64,
    pub pool_id: String,
    /// JSON-encoded trigger.
    pub trade_trigger: String,
    pub mode: String,
    /// Decimal as text.
    pub amount: String,
    pub status: String,
    /// JSON-encoded state, including any failure reason.
    pub state: String,
    pub quote: Option<String>,
    pub tx_ref: Option<String>,
    pub requotes: i32,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a subscription.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SubscriptionRow {
    pub user_id: i64,
    pub pool_filter: String,
    pub mode: String,
    pub amount: Option<String>,
    pub min_apy: Option<f64>,
    pub max_daily: Option<String>,
    pub active: bool,
    pub updated_at: String,
}

/// Database row for one user's committed exposure on one day.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = exposure_ledger)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LedgerRow {
    pub user_id: i64,
    /// `YYYY-MM-DD`.
    pub day: String,
    pub committed: String,
}

/// Singleton row holding the serialized agent state.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = agent_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AgentStateRow {
    pub id: i32,
    pub state: String,
    pub updated_at: String,
}

/// A chat user seen through a subscription.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i64,
    pub created_at: String,
}
