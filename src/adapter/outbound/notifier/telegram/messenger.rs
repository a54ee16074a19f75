//! Telegram messenger.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::RequestError;

use crate::domain::id::UserId;
use crate::error::DeliveryError;
use crate::port::outbound::messenger::{Button, Message, Messenger};

/// Sends messages to the private chat of each user.
///
/// Telegram user ids double as private chat ids. One call is one attempt;
/// the throttler owns retries.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    #[must_use]
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }

    #[must_use]
    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }
}

/// One button per row keeps long pool labels readable on phones.
fn keyboard(buttons: &[Button]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        buttons
            .iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label.clone(), b.data.clone())]),
    )
}

fn classify(err: &RequestError) -> DeliveryError {
    match err {
        RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_) => {
            DeliveryError::Transient(err.to_string())
        }
        _ => DeliveryError::Permanent(err.to_string()),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, user: UserId, message: &Message) -> Result<(), DeliveryError> {
        let request = self.bot.send_message(ChatId(user.value()), &message.text);
        let result = if message.buttons.is_empty() {
            request.await
        } else {
            request.reply_markup(keyboard(&message.buttons)).await
        };
        result.map(|_| ()).map_err(|e| classify(&e))
    }
}
