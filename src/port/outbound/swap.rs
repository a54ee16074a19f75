//! Swap provider port.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::id::PoolId;
use crate::domain::money::Amount;
use crate::error::SwapError;

/// A priced offer from the swap provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub quote_ref: String,
    /// Input amount the quote was priced for.
    pub amount_in: Decimal,
    pub expected_out: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// Opaque transaction reference returned by execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxRef(pub String);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-chain status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed(String),
}

/// Quote, execute and track swaps.
#[async_trait]
pub trait SwapProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Request a quote for swapping `amount` into `pool`.
    ///
    /// `max_slippage` is a fraction (0.05 = 5%).
    async fn quote(
        &self,
        pool: &PoolId,
        amount: Amount,
        max_slippage: Decimal,
    ) -> Result<Quote, SwapError>;

    /// Execute a previously obtained quote.
    async fn execute(&self, quote_ref: &str) -> Result<TxRef, SwapError>;

    /// Poll the status of a submitted transaction.
    async fn status(&self, tx: &TxRef) -> Result<TxStatus, SwapError>;
}
