//! Telegram delivery and inline-button handling.
//!
//! Requires the `telegram` feature to be enabled.

pub mod callback;
pub mod messenger;

pub use callback::spawn_callback_listener;
pub use messenger::TelegramMessenger;
