//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`market`]: Scripted [`MarketDataSource`](crate::port::outbound::market::MarketDataSource).
//! - [`swap`]: Scripted [`SwapProvider`](crate::port::outbound::swap::SwapProvider)
//!   that records every execute call.
//! - [`messenger`]: Recording [`Messenger`](crate::port::outbound::messenger::Messenger).
//! - [`store`]: [`TradeStore`](crate::port::outbound::store::TradeStore) with
//!   scripted update conflicts and backend errors.
//! - [`domain`]: Builders for snapshots, amounts and subscriptions.
//! - [`config`]: Canonical test configurations.
//! - [`agent`]: A fully wired coordinator over the scripted collaborators.

pub mod agent;
pub mod config;
pub mod domain;
pub mod market;
pub mod messenger;
pub mod store;
pub mod swap;
