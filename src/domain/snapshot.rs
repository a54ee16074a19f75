//! Pool snapshots sampled from the market data collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::PoolId;

/// Immutable sample of one pool's metrics.
///
/// APY is expressed in percent (15.0 means 15%), TVL and volume in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pool_id: PoolId,
    /// Human-readable pair label, e.g. `SOL/USDC`.
    label: String,
    apy: f64,
    tvl: f64,
    volume_24h: f64,
    sampled_at: DateTime<Utc>,
}

impl PoolSnapshot {
    #[must_use]
    pub fn new(
        pool_id: PoolId,
        label: impl Into<String>,
        apy: f64,
        tvl: f64,
        volume_24h: f64,
        sampled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pool_id,
            label: label.into(),
            apy,
            tvl,
            volume_24h,
            sampled_at,
        }
    }

    #[must_use]
    pub const fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn apy(&self) -> f64 {
        self.apy
    }

    #[must_use]
    pub const fn tvl(&self) -> f64 {
        self.tvl
    }

    #[must_use]
    pub const fn volume_24h(&self) -> f64 {
        self.volume_24h
    }

    #[must_use]
    pub const fn sampled_at(&self) -> DateTime<Utc> {
        self.sampled_at
    }

    /// 24h volume divided by TVL, or 0 when TVL is not positive.
    #[must_use]
    pub fn turnover(&self) -> f64 {
        if self.tvl > 0.0 {
            self.volume_24h / self.tvl
        } else {
            0.0
        }
    }
}
