//! Messenger that writes notifications to the log.

use async_trait::async_trait;
use tracing::info;

use crate::domain::id::UserId;
use crate::error::DeliveryError;
use crate::port::outbound::messenger::{Message, Messenger};

/// Logs every message at info level. Used when Telegram is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, user: UserId, message: &Message) -> Result<(), DeliveryError> {
        let buttons: Vec<&str> = message.buttons.iter().map(|b| b.data.as_str()).collect();
        info!(%user, text = %message.text, ?buttons, "Notification");
        Ok(())
    }
}
