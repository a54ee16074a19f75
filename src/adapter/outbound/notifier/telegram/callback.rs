//! Inline-button callback listener.
//!
//! Turns `invest:<pool>:<amount>` button presses into manual invest
//! requests for the coordinator. The request id names the button that was
//! pressed, so pressing it again dedupes against the first trade.

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::id::{RequestId, UserId};
use crate::port::inbound::manual::ManualInvestRequest;

/// Where a button was pressed: its chat and message when still visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMessage {
    pub chat: i64,
    pub message: i32,
}

/// Stable id for one button. Falls back to the query id, which Telegram
/// reuses when it redelivers the same press.
#[must_use]
pub fn press_origin(message: Option<ButtonMessage>, query_id: &str, data: &str) -> RequestId {
    match message {
        Some(m) => RequestId::from(format!("msg:{}:{}:{data}", m.chat, m.message)),
        None => RequestId::from(format!("cbq:{query_id}")),
    }
}

/// Parse a button press into a request, if it is an invest button.
#[must_use]
pub fn request_from_callback(
    from: u64,
    message: Option<ButtonMessage>,
    query_id: &str,
    data: &str,
) -> Option<ManualInvestRequest> {
    let user = UserId::new(i64::try_from(from).ok()?);
    ManualInvestRequest::from_callback(user, press_origin(message, query_id, data), data)
}

async fn on_callback(
    bot: Bot,
    query: CallbackQuery,
    requests: mpsc::Sender<ManualInvestRequest>,
) -> ResponseResult<()> {
    let message = query.message.as_ref().map(|m| ButtonMessage {
        chat: m.chat().id.0,
        message: m.id().0,
    });
    let request = query
        .data
        .as_deref()
        .and_then(|data| request_from_callback(query.from.id.0, message, &query.id, data));

    let ack = match request {
        Some(request) => {
            debug!(
                user = %request.user,
                pool = %request.pool,
                request = %request.request_id,
                "Invest button pressed"
            );
            if requests.send(request).await.is_err() {
                warn!("Manual request channel closed");
                "Agent is shutting down"
            } else {
                "Processing your investment…"
            }
        }
        None => "Unknown action",
    };

    bot.answer_callback_query(query.id.clone()).text(ack).await?;
    Ok(())
}

/// Listen for callback queries until the bot is stopped.
pub fn spawn_callback_listener(
    bot: Bot,
    requests: mpsc::Sender<ManualInvestRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Telegram callback listener started");
        let handler = Update::filter_callback_query().endpoint(on_callback);
        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![requests])
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;
        warn!("Telegram callback listener stopped");
    })
}
