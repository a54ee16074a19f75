//! Risk management configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::risk::RiskLimits;

/// `[risk]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Maximum single trade in dollars.
    #[serde(default = "default_max_single_trade")]
    pub max_single_trade: Decimal,
    /// Maximum committed exposure per user per day in dollars.
    #[serde(default = "default_max_daily_exposure")]
    pub max_daily_exposure: Decimal,
    /// Maximum slippage tolerance (e.g., 0.05 = 5%).
    #[serde(default = "default_max_slippage")]
    pub max_slippage: Decimal,
    /// Unresolved reservations roll back after this many seconds (default: 600).
    #[serde(default = "default_reservation_ttl_secs")]
    pub reservation_ttl_secs: u64,
}

fn default_max_single_trade() -> Decimal {
    Decimal::from(1000)
}

fn default_max_daily_exposure() -> Decimal {
    Decimal::from(10000)
}

fn default_max_slippage() -> Decimal {
    Decimal::new(5, 2) // 5%
}

const fn default_reservation_ttl_secs() -> u64 {
    600
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_single_trade: default_max_single_trade(),
            max_daily_exposure: default_max_daily_exposure(),
            max_slippage: default_max_slippage(),
            reservation_ttl_secs: default_reservation_ttl_secs(),
        }
    }
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_single_trade: config.max_single_trade,
            max_daily_exposure: config.max_daily_exposure,
            reservation_ttl: Duration::from_secs(config.reservation_ttl_secs),
        }
    }
}
