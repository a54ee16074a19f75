//! Scripted market data source.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::id::PoolId;
use crate::domain::snapshot::PoolSnapshot;
use crate::error::SnapshotError;
use crate::port::outbound::market::MarketDataSource;

type Listing = Result<Vec<PoolSnapshot>, SnapshotError>;

/// Pops one scripted listing per `list_pools` call.
///
/// Once the script is exhausted every call returns the fallback, which
/// defaults to an empty listing.
pub struct ScriptedMarket {
    script: Mutex<VecDeque<Listing>>,
    fallback: Mutex<Listing>,
    healthy: AtomicBool,
    delay: Option<Duration>,
    calls: Arc<AtomicU32>,
}

impl ScriptedMarket {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(Vec::new())),
            healthy: AtomicBool::new(true),
            delay: None,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Queue a successful listing.
    pub fn then_pools(self, pools: Vec<PoolSnapshot>) -> Self {
        self.script.lock().push_back(Ok(pools));
        self
    }

    /// Queue a failed listing.
    pub fn then_err(self, err: SnapshotError) -> Self {
        self.script.lock().push_back(Err(err));
        self
    }

    /// Answer every unscripted call with `pools`.
    pub fn always_pools(self, pools: Vec<PoolSnapshot>) -> Self {
        *self.fallback.lock() = Ok(pools);
        self
    }

    /// Answer every unscripted call with `err`.
    pub fn always_err(self, err: SnapshotError) -> Self {
        *self.fallback.lock() = Err(err);
        self
    }

    /// Hold every `list_pools` call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    /// Number of `list_pools` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, for asserting after the market moved into a context.
    pub fn call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

impl Default for ScriptedMarket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for ScriptedMarket {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn list_pools(&self) -> Result<Vec<PoolSnapshot>, SnapshotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().clone())
    }

    async fn get_pool(&self, id: &PoolId) -> Result<PoolSnapshot, SnapshotError> {
        let fallback = self.fallback.lock().clone()?;
        fallback
            .into_iter()
            .find(|pool| pool.pool_id() == id)
            .ok_or_else(|| SnapshotError::Permanent(format!("unknown pool {id}")))
    }

    async fn health(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
