//! Messenger adapters.
//!
//! Implements the `port::outbound::messenger::Messenger` trait for the log
//! (always available) and Telegram (behind the `telegram` feature).

pub mod log;
#[cfg(feature = "telegram")]
pub mod telegram;

pub use log::LogMessenger;
