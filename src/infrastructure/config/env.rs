//! Environment variable overrides.
//!
//! Every tunable deployment value can be set from the environment, which
//! wins over the file. The lookup is injected so tests never touch the
//! process environment.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::settings::Config;
use crate::error::{ConfigError, Result};

pub const MONITORING_INTERVAL: &str = "MONITORING_INTERVAL";
pub const MIN_APY_THRESHOLD: &str = "MIN_APY_THRESHOLD";
pub const MIN_TVL_THRESHOLD: &str = "MIN_TVL_THRESHOLD";
pub const MIN_VOLUME_THRESHOLD: &str = "MIN_VOLUME_THRESHOLD";
pub const MAX_SLIPPAGE: &str = "MAX_SLIPPAGE";
pub const MAX_SINGLE_INVESTMENT_USD: &str = "MAX_SINGLE_INVESTMENT_USD";
pub const MAX_DAILY_EXPOSURE_USD: &str = "MAX_DAILY_EXPOSURE_USD";
pub const NOTIFICATIONS_PER_HOUR: &str = "NOTIFICATIONS_PER_HOUR";
pub const SIMULATION_MODE: &str = "SIMULATION_MODE";
pub const PROVIDER_MAX_ATTEMPTS: &str = "PROVIDER_MAX_ATTEMPTS";
pub const PROVIDER_BASE_BACKOFF_MS: &str = "PROVIDER_BASE_BACKOFF_MS";
pub const CYCLE_DEADLINE_SECS: &str = "CYCLE_DEADLINE_SECS";
pub const DISPATCH_CONCURRENCY: &str = "DISPATCH_CONCURRENCY";
pub const POOL_API_URL: &str = "POOL_API_URL";
pub const SWAP_API_URL: &str = "SWAP_API_URL";
pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

/// Read from the process environment, treating blank values as unset.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[allow(clippy::result_large_err)]
fn parsed<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|e| {
        ConfigError::InvalidValue {
            field: name,
            reason: format!("cannot parse {raw:?}: {e}"),
        }
        .into()
    })
}

#[allow(clippy::result_large_err)]
fn flag<F>(lookup: &F, name: &'static str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            field: name,
            reason: format!("expected true or false, got {raw:?}"),
        }
        .into()),
    }
}

/// Apply overrides from `lookup` onto a parsed config.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming the variable when a value
/// does not parse.
#[allow(clippy::result_large_err)]
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secs) = parsed(&lookup, MONITORING_INTERVAL)? {
        config.agent.interval_secs = secs;
    }
    if let Some(secs) = parsed(&lookup, CYCLE_DEADLINE_SECS)? {
        config.agent.deadline_secs = secs;
    }
    if let Some(n) = parsed(&lookup, DISPATCH_CONCURRENCY)? {
        config.agent.concurrency = n;
    }
    if let Some(sim) = flag(&lookup, SIMULATION_MODE)? {
        config.agent.simulation_mode = sim;
    }

    if let Some(v) = parsed(&lookup, MIN_APY_THRESHOLD)? {
        config.rules.min_apy = v;
    }
    if let Some(v) = parsed(&lookup, MIN_TVL_THRESHOLD)? {
        config.rules.min_tvl = v;
    }
    if let Some(v) = parsed(&lookup, MIN_VOLUME_THRESHOLD)? {
        config.rules.min_volume_24h = v;
    }

    // Percent in the environment, fraction in the file.
    if let Some(pct) = parsed::<Decimal, _>(&lookup, MAX_SLIPPAGE)? {
        config.risk.max_slippage = pct / Decimal::ONE_HUNDRED;
    }
    if let Some(v) = parsed(&lookup, MAX_SINGLE_INVESTMENT_USD)? {
        config.risk.max_single_trade = v;
    }
    if let Some(v) = parsed(&lookup, MAX_DAILY_EXPOSURE_USD)? {
        config.risk.max_daily_exposure = v;
    }

    if let Some(v) = parsed(&lookup, NOTIFICATIONS_PER_HOUR)? {
        config.notifications.per_hour = v;
    }
    if let Some(v) = parsed(&lookup, PROVIDER_MAX_ATTEMPTS)? {
        config.retry.max_attempts = v;
    }
    if let Some(v) = parsed(&lookup, PROVIDER_BASE_BACKOFF_MS)? {
        config.retry.base_backoff_ms = v;
    }

    if let Some(url) = lookup(POOL_API_URL) {
        config.market.base_url = url;
    }
    if let Some(url) = lookup(SWAP_API_URL) {
        config.swap.base_url = Some(url);
    }

    config.telegram.bot_token = lookup(TELEGRAM_BOT_TOKEN);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::Error;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            env(&[
                (MONITORING_INTERVAL, "60"),
                (MIN_APY_THRESHOLD, "22.5"),
                (MAX_SLIPPAGE, "5"),
                (MAX_DAILY_EXPOSURE_USD, "2500"),
                (SIMULATION_MODE, "false"),
                (POOL_API_URL, "http://pools.local"),
            ]),
        )
        .unwrap();

        assert_eq!(config.agent.interval_secs, 60);
        assert!((config.rules.min_apy - 22.5).abs() < f64::EPSILON);
        assert_eq!(config.risk.max_slippage, dec!(0.05));
        assert_eq!(config.risk.max_daily_exposure, dec!(2500));
        assert!(!config.agent.simulation_mode);
        assert_eq!(config.market.base_url, "http://pools.local");
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, env(&[(DISPATCH_CONCURRENCY, "lots")])).unwrap_err();
        match err {
            Error::Config(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, DISPATCH_CONCURRENCY);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn token_only_comes_from_lookup() {
        let mut config = Config::default();
        apply_overrides(&mut config, env(&[(TELEGRAM_BOT_TOKEN, "123:abc")])).unwrap();
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
    }
}
