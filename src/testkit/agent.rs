//! A fully wired coordinator over scripted collaborators.

use std::sync::Arc;

use crate::application::coordinator::Coordinator;
use crate::infrastructure::bootstrap::{build_context, Collaborators, Stores};
use crate::infrastructure::config::settings::Config;

use super::market::ScriptedMarket;
use super::messenger::RecordingMessenger;
use super::swap::ScriptedSwap;

/// Handles to every collaborator behind one coordinator.
pub struct Harness {
    pub market: Arc<ScriptedMarket>,
    pub swap: Arc<ScriptedSwap>,
    pub messenger: Arc<RecordingMessenger>,
    pub stores: Stores,
    pub coordinator: Arc<Coordinator>,
}

impl Harness {
    /// Wire `config` the way the runtime does, with in-memory stores.
    ///
    /// # Panics
    /// Panics if `config` carries invalid seed subscriptions.
    pub fn new(config: &Config, market: ScriptedMarket, swap: ScriptedSwap) -> Self {
        Self::with_messenger(config, market, swap, RecordingMessenger::new())
    }

    /// # Panics
    /// Panics if `config` carries invalid seed subscriptions.
    pub fn with_messenger(
        config: &Config,
        market: ScriptedMarket,
        swap: ScriptedSwap,
        messenger: RecordingMessenger,
    ) -> Self {
        let market = Arc::new(market);
        let swap = Arc::new(swap);
        let messenger = Arc::new(messenger);
        let stores = Stores::in_memory();
        let ctx = build_context(
            config,
            Collaborators {
                market: market.clone(),
                swap: swap.clone(),
                messenger: messenger.clone(),
            },
            stores.clone(),
        )
        .expect("test config is valid");
        Self {
            market,
            swap,
            messenger,
            stores,
            coordinator: Arc::new(Coordinator::new(Arc::new(ctx))),
        }
    }
}
