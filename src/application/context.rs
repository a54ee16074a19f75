//! Explicit agent context.
//!
//! Everything a cycle needs is reachable from one [`AgentContext`] value
//! built by the composition root; nothing is read from globals.

use std::sync::Arc;
use std::time::Duration;

use super::dispatch::Dispatcher;
use super::evaluate::Evaluator;
use super::retry::RetryPolicy;
use super::risk::RiskGuard;
use super::throttle::NotificationThrottler;
use crate::domain::sizing::PositionSizer;
use crate::domain::subscription::TradeMode;
use crate::port::outbound::market::MarketDataSource;
use crate::port::outbound::store::{AgentStateStore, SubscriptionStore, TradeStore};

/// Cycle timing and fan-out.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub interval: Duration,
    /// Work not started by this point is abandoned for the cycle.
    pub deadline: Duration,
    /// Concurrent dispatches per cycle.
    pub concurrency: usize,
    /// Send opportunity alerts to subscribers.
    pub alerts: bool,
    pub daily_reports: bool,
    pub health_interval: Duration,
    pub report_interval: Duration,
    /// Mode for manual requests from users without a matching subscription.
    pub default_mode: TradeMode,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10_800),
            deadline: Duration::from_secs(300),
            concurrency: 10,
            alerts: true,
            daily_reports: true,
            health_interval: Duration::from_secs(3_600),
            report_interval: Duration::from_secs(86_400),
            default_mode: TradeMode::Simulate,
        }
    }
}

/// Configuration and collaborator handles shared by every component.
pub struct AgentContext {
    pub settings: CycleSettings,
    pub market: Arc<dyn MarketDataSource>,
    pub fetch_retry: RetryPolicy,
    pub evaluator: Evaluator,
    pub sizer: PositionSizer,
    pub risk: Arc<RiskGuard>,
    pub dispatcher: Arc<Dispatcher>,
    pub throttler: Arc<NotificationThrottler>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub trades: Arc<dyn TradeStore>,
    pub agent_state: Arc<dyn AgentStateStore>,
}
