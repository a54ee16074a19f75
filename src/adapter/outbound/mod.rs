//! Outbound adapters (driven side).

pub mod memory;
pub mod notifier;
pub mod pool_api;
pub mod sqlite;
