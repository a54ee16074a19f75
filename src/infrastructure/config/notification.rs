//! Notification throttle configuration.

use serde::Deserialize;

/// `[notifications]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Messages per user per rolling hour (default: 5).
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,
    /// Delivery attempts per message (default: 3).
    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u32,
    /// Send opportunity alerts each cycle.
    #[serde(default = "default_true")]
    pub alerts: bool,
    /// Send each subscriber a daily activity report.
    #[serde(default = "default_true")]
    pub daily_reports: bool,
}

const fn default_per_hour() -> u32 {
    5
}

const fn default_delivery_attempts() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            per_hour: default_per_hour(),
            delivery_attempts: default_delivery_attempts(),
            alerts: default_true(),
            daily_reports: default_true(),
        }
    }
}
