//! Market data port.

use async_trait::async_trait;

use crate::domain::id::PoolId;
use crate::domain::snapshot::PoolSnapshot;
use crate::error::SnapshotError;

/// Source of pool snapshots.
///
/// Implementations classify every failure as transient or permanent; the
/// caller decides whether to retry.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Sample every pool the source knows about.
    async fn list_pools(&self) -> Result<Vec<PoolSnapshot>, SnapshotError>;

    /// Sample a single pool.
    async fn get_pool(&self, id: &PoolId) -> Result<PoolSnapshot, SnapshotError>;

    /// Cheap liveness check.
    async fn health(&self) -> bool;
}
