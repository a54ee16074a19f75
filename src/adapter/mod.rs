//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`]: the command line
//! - [`outbound`]: pool and swap APIs, messengers, persistence

pub mod inbound;
pub mod outbound;
