//! Pool data and swap HTTP API adapters.
//!
//! Both APIs share one JSON-over-HTTP transport:
//! - `GET  /api/pools`, `GET /api/pools/{id}`, `GET /api/health`
//! - `POST /api/swap/quote`, `POST /api/swap/execute`
//! - `GET  /api/swap/status/{tx}`
//!
//! Adapters make a single attempt per call and classify failures; retries
//! belong to the caller.

pub mod dto;
pub mod http;
pub mod market;
pub mod swap;

pub use market::PoolApiClient;
pub use swap::SwapApiClient;
