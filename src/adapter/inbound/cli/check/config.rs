use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Validate the configuration file without starting the agent.
///
/// # Errors
/// Returns the first configuration problem found.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;

    output::section("Configuration Check");
    output::field("Config", path.display());
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("Pool API", &config.market.base_url);
    output::field("Swap API", config.swap_base_url());
    output::field("Interval", format!("{}s", config.agent.interval_secs));
    output::field("Simulation", config.agent.simulation_mode);
    output::field(
        "Rules",
        format!(
            "apy >= {}, tvl >= {}, volume >= {}",
            config.rules.min_apy, config.rules.min_tvl, config.rules.min_volume_24h
        ),
    );
    output::field("Subscribers", config.subscriptions.len());

    if config.subscriptions.is_empty() {
        output::warning("No subscriptions configured, cycles will only log opportunities");
    }

    if config.telegram.enabled {
        if config.telegram.bot_token.is_some() {
            output::success("Telegram integration configured");
        } else {
            output::warning("Telegram enabled but environment variables are missing");
            output::field("Missing", "TELEGRAM_BOT_TOKEN");
        }
    } else {
        output::field("Telegram", "disabled");
    }

    output::success("Configuration check complete");

    Ok(())
}
