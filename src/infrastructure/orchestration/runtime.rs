//! Agent runtime lifecycle.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::application::coordinator::{Coordinator, CycleReport};
use crate::error::{Error, Result};
use crate::infrastructure::bootstrap::{
    build_context, build_messaging, build_providers, build_stores, Collaborators,
};
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::manual::ManualInvestRequest;

/// Pending manual requests before the chat front-end has to wait.
const MANUAL_QUEUE: usize = 64;

/// A wired coordinator plus the optional chat bot feeding it.
pub struct Runtime {
    pub coordinator: Arc<Coordinator>,
    #[cfg(feature = "telegram")]
    bot: Option<teloxide::Bot>,
}

/// Wire every component from configuration.
///
/// # Errors
/// Returns an error if the stores cannot be opened or seeding fails.
pub fn build_runtime(config: &Config) -> Result<Runtime> {
    let stores = build_stores(config)?;
    let messaging = build_messaging(config);
    let (market, swap) = build_providers(config);
    let ctx = build_context(
        config,
        Collaborators {
            market,
            swap,
            messenger: messaging.messenger,
        },
        stores,
    )?;
    Ok(Runtime {
        coordinator: Arc::new(Coordinator::new(Arc::new(ctx))),
        #[cfg(feature = "telegram")]
        bot: messaging.bot,
    })
}

/// Refuse to start against a market data source that is not answering.
async fn startup_health_check(runtime: &Runtime) -> Result<()> {
    let market = &runtime.coordinator.context().market;
    if market.health().await {
        info!(source = market.name(), "Market data source healthy");
        Ok(())
    } else {
        Err(Error::Health(format!("{} did not answer its health check", market.name())))
    }
}

/// Run until Ctrl+C. In-flight dispatches finish before returning.
///
/// # Errors
/// Returns an error if the runtime cannot be built.
pub async fn run(config: Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, finishing in-flight work"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
        let _ = shutdown_tx.send(true);
    });
    run_with_shutdown(config, shutdown_rx).await
}

/// Run with an externally controlled shutdown signal.
///
/// # Errors
/// Returns an error if the runtime cannot be built or the market data
/// source fails its startup health check.
pub async fn run_with_shutdown(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    info!(
        interval_secs = config.agent.interval_secs,
        simulation = config.agent.simulation_mode,
        subscriptions = config.subscriptions.len(),
        "Starting poolsentry"
    );
    let runtime = build_runtime(&config)?;
    startup_health_check(&runtime).await?;
    let (manual_tx, manual_rx) = mpsc::channel::<ManualInvestRequest>(MANUAL_QUEUE);

    #[cfg(feature = "telegram")]
    let listener = runtime.bot.clone().map(|bot| {
        crate::adapter::outbound::notifier::telegram::spawn_callback_listener(bot, manual_tx.clone())
    });
    drop(manual_tx);

    Arc::clone(&runtime.coordinator).run(shutdown, manual_rx).await;

    #[cfg(feature = "telegram")]
    if let Some(handle) = listener {
        handle.abort();
    }

    let state = runtime.coordinator.state();
    info!(
        cycles = state.cycle_count,
        last_outcome = ?state.last_outcome,
        "Agent stopped"
    );
    Ok(())
}

/// Run a single cycle and return its report.
///
/// # Errors
/// Returns an error if the runtime cannot be built.
pub async fn run_once(config: &Config) -> Result<CycleReport> {
    let runtime = build_runtime(config)?;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let report = runtime.coordinator.run_cycle(&shutdown_rx).await;
    if !runtime.coordinator.is_healthy() {
        warn!("Market data source reported a permanent failure");
    }
    Ok(report)
}
