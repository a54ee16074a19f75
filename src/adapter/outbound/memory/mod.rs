//! In-memory store implementations.
//!
//! Used when `database = ":memory:"` and throughout the tests. Each store
//! guards its map with a single lock, which gives the same atomicity as a
//! SQLite transaction.

mod ledger;
mod state;
mod subscription;
mod trade;

pub use ledger::MemoryLedgerStore;
pub use state::MemoryAgentStateStore;
pub use subscription::MemorySubscriptionStore;
pub use trade::MemoryTradeStore;
