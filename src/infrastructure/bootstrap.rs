//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::adapter::outbound::memory::{
    MemoryAgentStateStore, MemoryLedgerStore, MemorySubscriptionStore, MemoryTradeStore,
};
#[cfg(feature = "telegram")]
use crate::adapter::outbound::notifier::telegram::TelegramMessenger;
use crate::adapter::outbound::notifier::LogMessenger;
use crate::adapter::outbound::pool_api::{PoolApiClient, SwapApiClient};
use crate::adapter::outbound::sqlite::database::connection::open;
use crate::adapter::outbound::sqlite::{
    SqliteAgentStateStore, SqliteLedgerStore, SqliteSubscriptionStore, SqliteTradeStore,
};
use crate::application::context::AgentContext;
use crate::application::dispatch::Dispatcher;
use crate::application::evaluate::Evaluator;
use crate::application::risk::RiskGuard;
use crate::application::throttle::NotificationThrottler;
use crate::domain::sizing::PositionSizer;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::market::MarketDataSource;
use crate::port::outbound::messenger::Messenger;
use crate::port::outbound::store::{AgentStateStore, LedgerStore, SubscriptionStore, TradeStore};
use crate::port::outbound::swap::SwapProvider;

/// Persistence handles shared by the agent.
#[derive(Clone)]
pub struct Stores {
    pub trades: Arc<dyn TradeStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub agent_state: Arc<dyn AgentStateStore>,
}

impl Stores {
    /// Fresh in-memory stores. Nothing survives the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            trades: Arc::new(MemoryTradeStore::new()),
            subscriptions: Arc::new(MemorySubscriptionStore::new()),
            ledger: Arc::new(MemoryLedgerStore::new()),
            agent_state: Arc::new(MemoryAgentStateStore::new()),
        }
    }
}

/// External services the agent talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketDataSource>,
    pub swap: Arc<dyn SwapProvider>,
    pub messenger: Arc<dyn Messenger>,
}

/// Messenger selected from configuration, plus the bot handle when Telegram is live.
pub struct Messaging {
    pub messenger: Arc<dyn Messenger>,
    #[cfg(feature = "telegram")]
    pub bot: Option<teloxide::Bot>,
}

/// Open the configured stores, migrating SQLite when a file is configured.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated.
pub fn build_stores(config: &Config) -> Result<Stores> {
    if config.uses_memory_store() {
        info!("Using in-memory stores");
        return Ok(Stores::in_memory());
    }

    let pool = open(&config.database)?;
    info!(database = %config.database, "Database initialized");
    Ok(Stores {
        trades: Arc::new(SqliteTradeStore::new(pool.clone())),
        subscriptions: Arc::new(SqliteSubscriptionStore::new(pool.clone())),
        ledger: Arc::new(SqliteLedgerStore::new(pool.clone())),
        agent_state: Arc::new(SqliteAgentStateStore::new(pool)),
    })
}

/// Build the messenger from configuration.
#[cfg(feature = "telegram")]
#[must_use]
pub fn build_messaging(config: &Config) -> Messaging {
    if config.telegram.enabled {
        if let Some(token) = config.telegram.bot_token.as_deref() {
            let telegram = TelegramMessenger::new(token);
            info!("Telegram messenger enabled");
            return Messaging {
                bot: Some(telegram.bot()),
                messenger: Arc::new(telegram),
            };
        }
        warn!("Telegram enabled but TELEGRAM_BOT_TOKEN not set, messages go to the log");
    }
    Messaging {
        messenger: Arc::new(LogMessenger),
        bot: None,
    }
}

/// Build the messenger from configuration (non-telegram variant).
#[cfg(not(feature = "telegram"))]
#[must_use]
pub fn build_messaging(config: &Config) -> Messaging {
    if config.telegram.enabled {
        warn!("Telegram enabled but support is not compiled in, messages go to the log");
    }
    Messaging {
        messenger: Arc::new(LogMessenger),
    }
}

/// HTTP clients for the pool and swap APIs.
#[must_use]
pub fn build_providers(config: &Config) -> (Arc<dyn MarketDataSource>, Arc<dyn SwapProvider>) {
    let market = PoolApiClient::from_config(&config.market);
    let swap = SwapApiClient::new(config.swap_base_url(), &config.swap.http);
    info!(
        market = market.base_url(),
        swap = config.swap_base_url(),
        "Providers initialized"
    );
    (Arc::new(market), Arc::new(swap))
}

/// Assemble the agent context from configuration and collaborators.
///
/// Seed subscriptions are written to the subscription store and today's
/// committed exposure is restored into the risk guard.
///
/// # Errors
/// Returns an error if a seed subscription is invalid or cannot be stored.
pub fn build_context(
    config: &Config,
    collaborators: Collaborators,
    stores: Stores,
) -> Result<AgentContext> {
    for subscription in config.seed_subscriptions()? {
        stores.subscriptions.upsert(&subscription)?;
    }
    if !config.subscriptions.is_empty() {
        info!(count = config.subscriptions.len(), "Seed subscriptions stored");
    }

    let risk = RiskGuard::new(config.risk_limits()).with_ledger(Arc::clone(&stores.ledger));
    let today = Utc::now().date_naive();
    match stores.ledger.entries_for_day(today) {
        Ok(entries) => {
            let restored = entries.len();
            risk.restore(entries);
            if restored > 0 {
                info!(users = restored, "Restored committed exposure for today");
            }
        }
        Err(e) => warn!(error = %e, "Failed to read exposure ledger, starting from zero"),
    }
    let risk = Arc::new(risk);

    let throttler = Arc::new(NotificationThrottler::new(
        collaborators.messenger,
        config.notifications.per_hour,
        config.delivery_policy(),
    ));
    info!(
        messenger = throttler.messenger_name(),
        per_hour = config.notifications.per_hour,
        "Notifications initialized"
    );

    let dispatcher = Arc::new(Dispatcher::new(
        config.dispatch_config(),
        Arc::clone(&risk),
        collaborators.swap,
        Arc::clone(&stores.trades),
        Arc::clone(&throttler),
        config.retry_policy(),
    ));

    Ok(AgentContext {
        settings: config.agent.cycle_settings(&config.notifications),
        market: collaborators.market,
        fetch_retry: config.retry_policy(),
        evaluator: Evaluator::rule_based(config.rule_config()),
        sizer: PositionSizer::new(config.risk.max_single_trade),
        risk,
        dispatcher,
        throttler,
        subscriptions: stores.subscriptions,
        trades: stores.trades,
        agent_state: stores.agent_state,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::id::UserId;
    use crate::testkit;

    fn collaborators() -> Collaborators {
        Collaborators {
            market: Arc::new(testkit::market::ScriptedMarket::new()),
            swap: Arc::new(testkit::swap::ScriptedSwap::new()),
            messenger: Arc::new(testkit::messenger::RecordingMessenger::new()),
        }
    }

    #[test]
    fn memory_database_selects_memory_stores() {
        let config = testkit::config::config();
        assert!(config.uses_memory_store());
        assert!(build_stores(&config).is_ok());
    }

    #[test]
    fn file_database_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = testkit::config::config();
        config.database = dir.path().join("agent.db").display().to_string();
        let stores = build_stores(&config).unwrap();
        assert!(stores.agent_state.load().unwrap().is_none());
    }

    #[test]
    fn seed_subscriptions_are_stored() {
        let config = testkit::config::config_with_subscription(42, "pool-a");
        let stores = Stores::in_memory();
        let ctx = build_context(&config, collaborators(), stores).unwrap();
        let subs = ctx.subscriptions.active().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].user, UserId::new(42));
    }

    #[test]
    fn todays_exposure_is_restored() {
        let config = testkit::config::config();
        let stores = Stores::in_memory();
        let today = Utc::now().date_naive();
        stores.ledger.add(UserId::new(7), today, dec!(900)).unwrap();

        let ctx = build_context(&config, collaborators(), stores).unwrap();
        assert_eq!(ctx.risk.committed(UserId::new(7), today), dec!(900));
    }

    #[test]
    fn log_messenger_without_token() {
        let mut config = testkit::config::config();
        config.telegram.enabled = true;
        config.telegram.bot_token = None;
        let messaging = build_messaging(&config);
        assert_eq!(messaging.messenger.name(), "log");
    }
}
