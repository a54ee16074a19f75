//! Scripted swap provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::id::PoolId;
use crate::domain::money::Amount;
use crate::error::SwapError;
use crate::port::outbound::swap::{Quote, SwapProvider, TxRef, TxStatus};

enum QuoteScript {
    /// Price with a different input amount than requested.
    AmountIn(Decimal),
    Fail(SwapError),
}

/// Swap provider with per-call scripts and call recording.
///
/// Unscripted calls succeed: quotes echo the requested amount and live for
/// a minute, executions return `tx-N`, status polls report `Confirmed`.
pub struct ScriptedSwap {
    quotes: Mutex<VecDeque<QuoteScript>>,
    executes: Mutex<VecDeque<Result<TxRef, SwapError>>>,
    statuses: Mutex<VecDeque<Result<TxStatus, SwapError>>>,
    execute_delay: Option<Duration>,
    quote_calls: AtomicU32,
    status_calls: AtomicU32,
    executed: Mutex<Vec<String>>,
}

impl ScriptedSwap {
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(VecDeque::new()),
            executes: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            execute_delay: None,
            quote_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn then_quote_err(self, err: SwapError) -> Self {
        self.quotes.lock().push_back(QuoteScript::Fail(err));
        self
    }

    pub fn then_quote_amount(self, amount_in: Decimal) -> Self {
        self.quotes.lock().push_back(QuoteScript::AmountIn(amount_in));
        self
    }

    pub fn then_execute(self, result: Result<TxRef, SwapError>) -> Self {
        self.executes.lock().push_back(result);
        self
    }

    /// The next execute call reports an expired quote.
    pub fn then_expired(self) -> Self {
        self.then_execute(Err(SwapError::QuoteExpired))
    }

    pub fn then_status(self, result: Result<TxStatus, SwapError>) -> Self {
        self.statuses.lock().push_back(result);
        self
    }

    /// Hold every execute call for `delay` before answering.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    pub fn quote_calls(&self) -> u32 {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Quote refs passed to `execute`, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl Default for ScriptedSwap {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwapProvider for ScriptedSwap {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn quote(
        &self,
        _pool: &PoolId,
        amount: Amount,
        _max_slippage: Decimal,
    ) -> Result<Quote, SwapError> {
        let n = self.quote_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let amount_in = match self.quotes.lock().pop_front() {
            Some(QuoteScript::Fail(err)) => return Err(err),
            Some(QuoteScript::AmountIn(value)) => value,
            None => amount.value(),
        };
        Ok(Quote {
            quote_ref: format!("q-{n}"),
            amount_in,
            expected_out: amount_in,
            expires_at: Utc::now() + chrono::Duration::seconds(60),
        })
    }

    async fn execute(&self, quote_ref: &str) -> Result<TxRef, SwapError> {
        let n = {
            let mut executed = self.executed.lock();
            executed.push(quote_ref.to_string());
            executed.len()
        };
        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.executes.lock().pop_front();
        next.unwrap_or_else(|| Ok(TxRef(format!("tx-{n}"))))
    }

    async fn status(&self, _tx: &TxRef) -> Result<TxStatus, SwapError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().pop_front();
        next.unwrap_or(Ok(TxStatus::Confirmed))
    }
}
