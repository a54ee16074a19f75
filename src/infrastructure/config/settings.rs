//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all agent settings.
//! Configuration is loaded from a TOML file; environment variables override
//! the tunables and supply secrets like `TELEGRAM_BOT_TOKEN`.
//!
//! # Example
//!
//! ```no_run
//! use poolsentry::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use super::agent::AgentConfig;
use super::env::{apply_overrides, process_env};
use super::logging::LoggingConfig;
use super::market::{MarketConfig, SwapConfig};
use super::notification::NotificationConfig;
use super::retry::RetryConfig;
use super::risk::RiskConfig;
use super::rules::RulesConfig;
use super::subscription::SubscriptionConfig;
use super::telegram::TelegramConfig;
use crate::application::dispatch::DispatchConfig;
use crate::application::retry::RetryPolicy;
use crate::application::risk::RiskLimits;
use crate::domain::rule::RuleConfig;
use crate::domain::subscription::Subscription;
use crate::error::{ConfigError, Result};

/// Database value that selects the in-memory stores.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Cycle cadence, deadline, concurrency and default trade mode.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Pool data API.
    #[serde(default)]
    pub market: MarketConfig,

    /// Swap API and confirmation behaviour.
    #[serde(default)]
    pub swap: SwapConfig,

    /// Backoff for provider calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Opportunity thresholds and weights.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Per-trade and per-day exposure limits.
    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path to the SQLite database file, or `:memory:` for volatile stores.
    #[serde(default = "default_database_path")]
    pub database: String,

    /// Subscriptions seeded into the store at startup.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

fn default_database_path() -> String {
    IN_MEMORY_DATABASE.to_string()
}

impl Config {
    /// Parse configuration from TOML content, applying process environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML content is malformed
    /// - An environment override does not parse
    /// - Validation fails (e.g., single trade cap above the daily cap)
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        Self::parse_toml_with(content, process_env)
    }

    /// Parse configuration from TOML content with an explicit environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::parse_toml`].
    #[allow(clippy::result_large_err)]
    pub fn parse_toml_with<F>(content: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        apply_overrides(&mut config, env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    ///
    /// Checks that all required fields are present and values are within
    /// acceptable ranges.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.market.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "market.base_url",
            }
            .into());
        }
        check_url("market.base_url", &self.market.base_url)?;
        if let Some(ref swap_url) = self.swap.base_url {
            check_url("swap.base_url", swap_url)?;
        }

        if self.risk.max_single_trade <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "max_single_trade",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.risk.max_daily_exposure <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "max_daily_exposure",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.risk.max_single_trade > self.risk.max_daily_exposure {
            return Err(ConfigError::InvalidValue {
                field: "max_single_trade",
                reason: "must be <= max_daily_exposure".to_string(),
            }
            .into());
        }
        if self.risk.max_slippage < Decimal::ZERO || self.risk.max_slippage > Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                field: "max_slippage",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }
        if self.risk.reservation_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reservation_ttl_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.swap.confirm_timeout_secs >= self.risk.reservation_ttl_secs {
            return Err(ConfigError::InvalidValue {
                field: "confirm_timeout_secs",
                reason: "must be shorter than reservation_ttl_secs".to_string(),
            }
            .into());
        }
        if self.swap.confirm_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "confirm_poll_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let weights = &self.rules.weights;
        if weights.apy < 0.0 || weights.tvl < 0.0 || weights.volume < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rules.weights",
                reason: "weights must be non-negative".to_string(),
            }
            .into());
        }
        if weights.apy + weights.tvl + weights.volume <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rules.weights",
                reason: "weights must have a positive sum".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.rules.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "min_confidence",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }

        if self.agent.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.agent.health_interval_secs == 0 || self.agent.report_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "health_interval_secs",
                reason: "health and report intervals must be greater than 0".to_string(),
            }
            .into());
        }
        if self.agent.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.retry.max_backoff_ms < self.retry.base_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_backoff_ms",
                reason: "must be >= base_backoff_ms".to_string(),
            }
            .into());
        }
        let deadline_ms = self.agent.deadline_secs.saturating_mul(1000);
        if self.market.http.timeout_ms >= deadline_ms || self.swap.http.timeout_ms >= deadline_ms {
            return Err(ConfigError::InvalidValue {
                field: "timeout_ms",
                reason: "provider timeout must be shorter than the cycle deadline".to_string(),
            }
            .into());
        }

        if self.notifications.delivery_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "delivery_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        for sub in &self.subscriptions {
            if sub.amount.is_some_and(|amount| amount <= Decimal::ZERO) {
                return Err(ConfigError::InvalidValue {
                    field: "subscriptions.amount",
                    reason: format!("must be greater than 0 (user {})", sub.user),
                }
                .into());
            }
            if sub.max_daily.is_some_and(|limit| limit <= Decimal::ZERO) {
                return Err(ConfigError::InvalidValue {
                    field: "subscriptions.max_daily",
                    reason: format!("must be greater than 0 (user {})", sub.user),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Swap API base URL, falling back to the market API.
    #[must_use]
    pub fn swap_base_url(&self) -> &str {
        self.swap
            .base_url
            .as_deref()
            .unwrap_or(&self.market.base_url)
    }

    #[must_use]
    pub fn rule_config(&self) -> RuleConfig {
        RuleConfig::from(&self.rules)
    }

    #[must_use]
    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits::from(&self.risk)
    }

    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_slippage: self.risk.max_slippage,
            max_requotes: self.swap.max_requotes,
            conflict_retries: self.swap.conflict_retries,
            confirm_poll: Duration::from_millis(self.swap.confirm_poll_ms),
            confirm_timeout: Duration::from_secs(self.swap.confirm_timeout_secs),
        }
    }

    /// Retry policy for provider calls.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// Retry policy for message delivery.
    #[must_use]
    pub fn delivery_policy(&self) -> RetryPolicy {
        self.retry
            .policy()
            .with_attempts(self.notifications.delivery_attempts)
    }

    /// Seed subscriptions as domain values.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscription carries a non-positive amount.
    #[allow(clippy::result_large_err)]
    pub fn seed_subscriptions(&self) -> Result<Vec<Subscription>> {
        let mode = self.agent.default_mode();
        self.subscriptions
            .iter()
            .map(|sub| sub.to_subscription(mode).map_err(Into::into))
            .collect()
    }

    #[must_use]
    pub fn uses_memory_store(&self) -> bool {
        self.database == IN_MEMORY_DATABASE
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[allow(clippy::result_large_err)]
fn check_url(field: &'static str, raw: &str) -> Result<()> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::rule::Rule;
    use crate::domain::subscription::{PoolFilter, TradeMode};
    use crate::error::Error;

    const MINIMAL: &str = r#"
        [market]
        base_url = "http://localhost:5000"
    "#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn invalid_field(result: Result<Config>) -> &'static str {
        match result {
            Err(Error::Config(ConfigError::InvalidValue { field, .. })) => field,
            Err(Error::Config(ConfigError::MissingField { field })) => field,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("config should have been rejected"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse_toml_with(MINIMAL, no_env).unwrap();
        assert_eq!(config.agent.interval_secs, 10_800);
        assert_eq!(config.agent.concurrency, 10);
        assert_eq!(config.agent.default_mode(), TradeMode::Simulate);
        assert_eq!(config.risk.max_single_trade, dec!(1000));
        assert_eq!(config.risk.max_daily_exposure, dec!(10000));
        assert_eq!(config.notifications.per_hour, 5);
        assert_eq!(config.rules.required, vec![Rule::Apy, Rule::Tvl]);
        assert_eq!(config.swap_base_url(), "http://localhost:5000");
        assert!(config.uses_memory_store());
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            database = "agent.db"

            [agent]
            interval_secs = 600
            deadline_secs = 120
            concurrency = 4
            simulation_mode = false

            [market]
            base_url = "http://pools.local"
            timeout_ms = 2000

            [swap]
            base_url = "http://swap.local"
            max_requotes = 1

            [rules]
            min_apy = 20.0
            required = ["apy"]

            [rules.weights]
            apy = 1.0
            tvl = 0.0
            volume = 0.0

            [risk]
            max_single_trade = 250
            max_daily_exposure = 1000

            [logging]
            level = "debug"
            format = "json"

            [[subscriptions]]
            user = 42
            pool = "pool-a"
            amount = 100

            [[subscriptions]]
            user = 7
            mode = "simulate"
        "#;
        let config = Config::parse_toml_with(toml, no_env).unwrap();
        assert_eq!(config.swap_base_url(), "http://swap.local");
        assert_eq!(config.dispatch_config().max_requotes, 1);
        assert_eq!(config.dispatch_config().confirm_timeout, Duration::from_secs(120));
        assert!(!config.uses_memory_store());

        let subs = config.seed_subscriptions().unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].mode, TradeMode::Live);
        assert!(matches!(subs[0].filter, PoolFilter::Pool(_)));
        assert_eq!(subs[1].mode, TradeMode::Simulate);
        assert_eq!(subs[1].filter, PoolFilter::Any);
    }

    #[test]
    fn missing_market_url_is_rejected() {
        assert_eq!(invalid_field(Config::parse_toml_with("", no_env)), "market.base_url");
    }

    #[test]
    fn single_cap_above_daily_cap_is_rejected() {
        let toml = format!("{MINIMAL}\n[risk]\nmax_single_trade = 500\nmax_daily_exposure = 100\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "max_single_trade");
    }

    #[test]
    fn slippage_outside_unit_range_is_rejected() {
        let toml = format!("{MINIMAL}\n[risk]\nmax_slippage = 1.5\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "max_slippage");
    }

    #[test]
    fn zero_weight_sum_is_rejected() {
        let toml = format!("{MINIMAL}\n[rules.weights]\napy = 0.0\ntvl = 0.0\nvolume = 0.0\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "rules.weights");
    }

    #[test]
    fn personal_daily_limit_is_seeded_and_must_be_positive() {
        let toml = format!("{MINIMAL}\n[[subscriptions]]\nuser = 5\nmax_daily = 300\n");
        let config = Config::parse_toml_with(&toml, no_env).unwrap();
        let subs = config.seed_subscriptions().unwrap();
        assert_eq!(subs[0].max_daily.map(|l| l.value()), Some(dec!(300)));

        let toml = format!("{MINIMAL}\n[[subscriptions]]\nuser = 5\nmax_daily = 0\n");
        assert_eq!(
            invalid_field(Config::parse_toml_with(&toml, no_env)),
            "subscriptions.max_daily"
        );
    }

    #[test]
    fn zero_health_or_report_interval_is_rejected() {
        let toml = format!("{MINIMAL}\n[agent]\nhealth_interval_secs = 0\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "health_interval_secs");
        let toml = format!("{MINIMAL}\n[agent]\nreport_interval_secs = 0\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "health_interval_secs");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let toml = format!("{MINIMAL}\n[agent]\nconcurrency = 0\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "concurrency");
    }

    #[test]
    fn provider_timeout_must_fit_in_deadline() {
        let toml = format!("{MINIMAL}\n[agent]\ndeadline_secs = 5\n");
        assert_eq!(invalid_field(Config::parse_toml_with(&toml, no_env)), "timeout_ms");
    }

    #[test]
    fn confirmation_timeout_must_be_shorter_than_reservation_ttl() {
        let toml = format!("{MINIMAL}\n[risk]\nreservation_ttl_secs = 60\n");
        assert_eq!(
            invalid_field(Config::parse_toml_with(&toml, no_env)),
            "confirm_timeout_secs"
        );
    }

    #[test]
    fn environment_can_break_validation() {
        let env = |name: &str| (name == "MAX_SINGLE_INVESTMENT_USD").then(|| "50000".to_string());
        assert_eq!(invalid_field(Config::parse_toml_with(MINIMAL, env)), "max_single_trade");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::parse_toml_with("[agent", no_env).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
        assert_eq!(err.exit_code(), 1);
    }
}
