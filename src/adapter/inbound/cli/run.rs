//! Handler for the `run` command.

use std::path::Path;

use crate::adapter::inbound::cli::output::{self, Tone};
use crate::adapter::inbound::cli::load_and_init_logging;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::orchestration;

/// Run the agent in the foreground until Ctrl+C.
///
/// # Errors
/// Returns a configuration error, or a health error when the market data
/// source is down at startup.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_and_init_logging(config_path)?;
    print_startup(config_path, &config);
    orchestration::run(config).await
}

fn print_startup(path: &Path, config: &Config) {
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Config", path.display());
    output::field("Pool API", &config.market.base_url);
    output::field("Interval", format!("{}s", config.agent.interval_secs));
    output::field(
        "Mode",
        if config.agent.simulation_mode {
            output::paint("simulate", Tone::Accent)
        } else {
            output::paint("live", Tone::Bad)
        },
    );
    output::field(
        "Limits",
        format!(
            "${} per trade, ${} per day",
            config.risk.max_single_trade, config.risk.max_daily_exposure
        ),
    );
    output::field("Subscribers", config.subscriptions.len());
    output::field(
        "Database",
        if config.uses_memory_store() {
            output::paint("in-memory", Tone::Muted)
        } else {
            config.database.clone()
        },
    );
    if output::verbosity() > 0 {
        output::field("Deadline", format!("{}s", config.agent.deadline_secs));
        output::field("Workers", config.agent.concurrency);
        output::field("Msgs/hour", config.notifications.per_hour);
    }
    output::note("Press Ctrl+C to stop");
}
