//! Messaging port.

use async_trait::async_trait;

use crate::domain::id::UserId;
use crate::error::DeliveryError;

/// Inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    /// Opaque callback data echoed back when the user presses the button.
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// An outbound message for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub buttons: Vec<Button>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }
}

/// Delivers messages to users.
///
/// Implementations perform exactly one delivery attempt per call; retry
/// and rate limiting live in the notification throttler.
#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, user: UserId, message: &Message) -> Result<(), DeliveryError>;
}
