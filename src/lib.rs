//! Poolsentry - liquidity pool monitoring with risk-bounded trade dispatch.
//!
//! The agent samples pool metrics on a fixed interval, scores them into
//! opportunities, and acts on them for subscribed users: it reserves
//! exposure, quotes and (in live mode) executes swaps exactly once per
//! trigger, and sends rate-limited notifications.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Pure types and rules: snapshots, opportunities, trade
//!   records and their state machine, exposure accounting, position sizing
//! - **`port`** - Interfaces to the market data source, the swap provider,
//!   the messenger and persistence
//! - **`application`** - Risk guard, decision evaluator, action dispatcher,
//!   notification throttler and the cycle coordinator
//! - **`adapter`** - HTTP clients for the pool and swap APIs, Telegram and
//!   log messengers, in-memory and SQLite stores, and the CLI
//! - **`infrastructure`** - Configuration, wiring and the runtime lifecycle
//!
//! # Features
//!
//! - `telegram` (default) - Deliver notifications through a Telegram bot and
//!   accept `invest:<pool>:<amount>` button presses as manual requests
//! - `testkit` - Scripted collaborators for integration tests
//!
//! # Example
//!
//! ```no_run
//! use poolsentry::infrastructure::config::settings::Config;
//! use poolsentry::infrastructure::orchestration;
//!
//! # async fn example() -> poolsentry::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let report = orchestration::run_once(&config).await?;
//! println!("{} opportunities", report.opportunities.len());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
