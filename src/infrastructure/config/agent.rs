//! Cycle scheduling configuration.

use std::time::Duration;

use serde::Deserialize;

use super::notification::NotificationConfig;
use crate::application::context::CycleSettings;
use crate::domain::subscription::TradeMode;

/// `[agent]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Seconds between cycles (default: 10800, three hours).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Cycle deadline in seconds (default: 300).
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Concurrent dispatches per cycle (default: 10).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Default mode for subscriptions and manual requests that do not set one.
    #[serde(default = "default_simulation_mode")]
    pub simulation_mode: bool,
    /// Seconds between health checks while running (default: 3600).
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    /// Seconds between daily reports (default: 86400).
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

const fn default_interval_secs() -> u64 {
    10_800
}

const fn default_deadline_secs() -> u64 {
    300
}

const fn default_concurrency() -> usize {
    10
}

const fn default_simulation_mode() -> bool {
    true
}

const fn default_health_interval_secs() -> u64 {
    3_600
}

const fn default_report_interval_secs() -> u64 {
    86_400
}

impl AgentConfig {
    #[must_use]
    pub const fn default_mode(&self) -> TradeMode {
        if self.simulation_mode {
            TradeMode::Simulate
        } else {
            TradeMode::Live
        }
    }

    #[must_use]
    pub fn cycle_settings(&self, notifications: &NotificationConfig) -> CycleSettings {
        CycleSettings {
            interval: Duration::from_secs(self.interval_secs),
            deadline: Duration::from_secs(self.deadline_secs),
            concurrency: self.concurrency,
            alerts: notifications.alerts,
            daily_reports: notifications.daily_reports,
            health_interval: Duration::from_secs(self.health_interval_secs),
            report_interval: Duration::from_secs(self.report_interval_secs),
            default_mode: self.default_mode(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            deadline_secs: default_deadline_secs(),
            concurrency: default_concurrency(),
            simulation_mode: default_simulation_mode(),
            health_interval_secs: default_health_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}
