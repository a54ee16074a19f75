//! SQLite persistence adapters.
//!
//! Provides SQLite-backed implementations of the trade, subscription,
//! ledger and agent state stores using Diesel ORM.

pub mod database;
pub mod ledger;
pub mod state;
pub mod store;
pub mod subscription;

pub use ledger::SqliteLedgerStore;
pub use state::SqliteAgentStateStore;
pub use store::SqliteTradeStore;
pub use subscription::SqliteSubscriptionStore;
