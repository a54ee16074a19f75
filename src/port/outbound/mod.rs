//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the market data source, the swap provider, the
//! messaging front-end and persistence.

pub mod market;
pub mod messenger;
pub mod store;
pub mod swap;
