//! Telegram messenger configuration.

use serde::Deserialize;

/// `[telegram]` section. The bot token only comes from `TELEGRAM_BOT_TOKEN`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    /// Deliver notifications through Telegram instead of the log.
    #[serde(default)]
    pub enabled: bool,
    /// Loaded from the environment, never from the file.
    #[serde(skip)]
    pub bot_token: Option<String>,
}
