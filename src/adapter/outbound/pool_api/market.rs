//! Pool data API client.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::dto::{PoolDto, PoolResponse, PoolsResponse};
use super::http::{ApiFailure, JsonApi};
use crate::domain::id::PoolId;
use crate::domain::snapshot::PoolSnapshot;
use crate::error::SnapshotError;
use crate::infrastructure::config::market::MarketConfig;
use crate::port::outbound::market::MarketDataSource;

/// HTTP client for the pool data API.
pub struct PoolApiClient {
    api: JsonApi,
}

impl PoolApiClient {
    #[must_use]
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            api: JsonApi::new(&config.base_url, &config.http),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }
}

fn snapshot_error(failure: ApiFailure) -> SnapshotError {
    if failure.is_transient() {
        SnapshotError::Transient(failure.detail)
    } else {
        SnapshotError::Permanent(failure.detail)
    }
}

/// Convert raw pool entries, skipping ones that do not decode or lack metrics.
fn decode_pools(raw: Vec<serde_json::Value>) -> Vec<PoolSnapshot> {
    let sampled_at = Utc::now();
    let total = raw.len();
    let snapshots: Vec<PoolSnapshot> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<PoolDto>(value) {
            Ok(dto) => {
                let snap = dto.to_snapshot(sampled_at);
                if snap.is_none() {
                    debug!(pool = %dto.pool_id, "Skipping pool with missing metrics");
                }
                snap
            }
            Err(e) => {
                warn!(error = %e, "Skipping undecodable pool entry");
                None
            }
        })
        .collect();
    if snapshots.len() < total {
        debug!(kept = snapshots.len(), total, "Dropped unusable pool entries");
    }
    snapshots
}

#[async_trait]
impl MarketDataSource for PoolApiClient {
    fn name(&self) -> &'static str {
        "pool-api"
    }

    async fn list_pools(&self) -> Result<Vec<PoolSnapshot>, SnapshotError> {
        let response: PoolsResponse = self.api.get("/api/pools").await.map_err(snapshot_error)?;
        let pools = decode_pools(response.pools);
        info!(count = pools.len(), "Fetched pools");
        Ok(pools)
    }

    async fn get_pool(&self, id: &PoolId) -> Result<PoolSnapshot, SnapshotError> {
        let path = format!("/api/pools/{}", id.as_str());
        let response: PoolResponse = self.api.get(&path).await.map_err(snapshot_error)?;
        response
            .into_pool()
            .to_snapshot(Utc::now())
            .ok_or_else(|| SnapshotError::Permanent(format!("pool {id} is missing metrics")))
    }

    async fn health(&self) -> bool {
        match self.api.get::<serde_json::Value>("/api/health").await {
            Ok(_) => true,
            Err(failure) => {
                debug!(detail = %failure.detail, "Pool API health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapter::outbound::pool_api::http::FailureKind;

    #[test]
    fn decode_keeps_only_complete_pools() {
        let raw = vec![
            json!({"poolId": "a", "apy": 20.0, "tvl": 2_000_000.0, "volume24h": 300_000.0}),
            json!({"poolId": "b", "apy": 20.0}),
            json!({"tvl": 1.0}),
        ];
        let pools = decode_pools(raw);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].pool_id().as_str(), "a");
    }

    #[test]
    fn rejected_requests_are_permanent_snapshot_errors() {
        let failure = ApiFailure {
            kind: FailureKind::Rejected,
            status: Some(404),
            code: None,
            detail: "not found".into(),
        };
        assert_eq!(
            snapshot_error(failure),
            SnapshotError::Permanent("not found".into())
        );
    }
}
