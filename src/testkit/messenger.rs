//! Recording messenger.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::id::UserId;
use crate::error::DeliveryError;
use crate::port::outbound::messenger::{Message, Messenger};

/// Keeps every delivered message; optionally fails every attempt.
pub struct RecordingMessenger {
    sent: Mutex<Vec<(UserId, Message)>>,
    failure: Option<DeliveryError>,
    attempts: AtomicU32,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: None,
            attempts: AtomicU32::new(0),
        }
    }

    /// A messenger whose every attempt fails with `err`.
    pub fn failing(err: DeliveryError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<(UserId, Message)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, user: UserId) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, user: UserId, message: &Message) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.sent.lock().push((user, message.clone()));
        Ok(())
    }
}
