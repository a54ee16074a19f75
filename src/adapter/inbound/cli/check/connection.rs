use std::path::Path;

use crate::adapter::inbound::cli::output::{self, Progress};
use crate::adapter::outbound::pool_api::PoolApiClient;
use crate::error::{Error, Result};
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::market::MarketDataSource;

/// Pool ids printed after a successful listing.
const SAMPLE: usize = 3;

/// Check the pool API health endpoint, then list pools.
///
/// # Errors
/// Returns a configuration error, a health error when the API does not
/// answer, or the market data error raised by the listing.
pub async fn execute_connection<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let config = Config::load(config_path.as_ref())?;
    let client = PoolApiClient::from_config(&config.market);
    check(&client).await
}

async fn check(market: &dyn MarketDataSource) -> Result<()> {
    output::section("Connection Check");
    output::field("Source", market.name());

    let progress = Progress::start("Checking health endpoint...");
    if market.health().await {
        progress.succeed("Health endpoint answered");
    } else {
        progress.fail("Health endpoint did not answer");
        return Err(Error::Health(format!("{} is not healthy", market.name())));
    }

    let progress = Progress::start("Listing pools...");
    let pools = match market.list_pools().await {
        Ok(pools) => {
            progress.succeed(&format!("Fetched {} pools", pools.len()));
            pools
        }
        Err(e) => {
            progress.fail("Pool listing failed");
            return Err(e.into());
        }
    };

    if pools.is_empty() {
        output::warning("No pools returned");
    } else {
        output::section("First pools");
        for (i, pool) in pools.iter().take(SAMPLE).enumerate() {
            output::field(&format!("{}.", i + 1), pool.pool_id());
        }
    }

    output::success("Connection checks passed");
    Ok(())
}
