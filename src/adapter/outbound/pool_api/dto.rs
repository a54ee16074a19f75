//! Wire types for the pool and swap APIs.
//!
//! Numeric fields arrive either as JSON numbers or as strings, depending on
//! the endpoint; both are accepted.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::id::PoolId;
use crate::domain::snapshot::PoolSnapshot;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

/// Error payload returned with 4xx/5xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
    pub code: Option<String>,
}

/// One pool as returned by `/api/pools`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDto {
    pub pool_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_symbol: Option<String>,
    #[serde(default)]
    pub quote_symbol: Option<String>,
    #[serde(default)]
    pub base_token_mint: Option<String>,
    #[serde(default)]
    pub quote_token_mint: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub apy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tvl: Option<f64>,
    #[serde(default, rename = "volume24h", deserialize_with = "lenient_f64")]
    pub volume_24h: Option<f64>,
}

impl PoolDto {
    /// Human-readable label: explicit name, then symbols, then the pool id.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match (&self.base_symbol, &self.quote_symbol) {
            (Some(base), Some(quote)) => format!("{base}/{quote}"),
            _ => short(&self.pool_id),
        }
    }

    /// Convert to a snapshot. Pools missing any metric are unusable.
    #[must_use]
    pub fn to_snapshot(&self, sampled_at: DateTime<Utc>) -> Option<PoolSnapshot> {
        let apy = self.apy.filter(|v| v.is_finite())?;
        let tvl = self.tvl.filter(|v| v.is_finite())?;
        let volume = self.volume_24h.filter(|v| v.is_finite())?;
        Some(PoolSnapshot::new(
            PoolId::from(self.pool_id.as_str()),
            self.label(),
            apy,
            tvl,
            volume,
            sampled_at,
        ))
    }
}

fn short(id: &str) -> String {
    if id.chars().count() <= 12 {
        id.to_string()
    } else {
        let head: String = id.chars().take(6).collect();
        let tail: String = id.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("{head}…{tail}")
    }
}

/// `/api/pools` envelope.
#[derive(Debug, Deserialize)]
pub struct PoolsResponse {
    #[serde(default)]
    pub pools: Vec<serde_json::Value>,
}

/// `/api/pools/{id}` returns either the bare pool or `{ "pool": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PoolResponse {
    Wrapped { pool: PoolDto },
    Bare(PoolDto),
}

impl PoolResponse {
    #[must_use]
    pub fn into_pool(self) -> PoolDto {
        match self {
            Self::Wrapped { pool } | Self::Bare(pool) => pool,
        }
    }
}

/// `POST /api/swap/quote` body. Slippage is in percent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub pool_id: String,
    pub amount: String,
    pub slippage: Decimal,
}

/// Quote response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default)]
    pub quote_id: Option<String>,
    #[serde(default)]
    pub input_amount: Option<Decimal>,
    pub output_amount: Decimal,
    #[serde(default)]
    pub min_output_amount: Option<Decimal>,
    #[serde(default)]
    pub price_impact: Option<Decimal>,
    #[serde(default)]
    pub expires_at: Option<Expiry>,
}

/// Quote expiry as RFC 3339 text or epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expiry {
    Millis(i64),
    Text(String),
}

impl Expiry {
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// `POST /api/swap/execute` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest<'a> {
    pub quote_id: &'a str,
}

/// Execution response; the transaction reference is called `signature` or
/// `txId` depending on the deployment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub tx_id: Option<String>,
}

impl ExecuteResponse {
    #[must_use]
    pub fn into_ref(self) -> Option<String> {
        self.signature.or(self.tx_id).filter(|s| !s.is_empty())
    }
}

/// `GET /api/swap/status/{tx}` response.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_accepts_numbers_and_strings() {
        let json = r#"{"poolId":"58oQ","apy":"24.5","tvl":1500000,"volume24h":"250000.75",
                       "baseSymbol":"SOL","quoteSymbol":"USDC"}"#;
        let dto: PoolDto = serde_json::from_str(json).unwrap();
        let snap = dto.to_snapshot(Utc::now()).unwrap();
        assert_eq!(snap.pool_id().as_str(), "58oQ");
        assert_eq!(snap.label(), "SOL/USDC");
        assert!((snap.apy() - 24.5).abs() < f64::EPSILON);
        assert!((snap.volume_24h() - 250_000.75).abs() < 1e-9);
    }

    #[test]
    fn pool_missing_a_metric_is_unusable() {
        let dto: PoolDto = serde_json::from_str(r#"{"poolId":"x","apy":10,"tvl":"n/a"}"#).unwrap();
        assert!(dto.to_snapshot(Utc::now()).is_none());
    }

    #[test]
    fn long_pool_ids_are_shortened_for_labels() {
        let dto: PoolDto =
            serde_json::from_str(r#"{"poolId":"58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2"}"#)
                .unwrap();
        assert_eq!(dto.label(), "58oQCh…YQo2");
    }

    #[test]
    fn single_pool_response_may_be_wrapped() {
        let bare: PoolResponse = serde_json::from_str(r#"{"poolId":"a","apy":1,"tvl":2,"volume24h":3}"#).unwrap();
        let wrapped: PoolResponse =
            serde_json::from_str(r#"{"pool":{"poolId":"b","apy":1,"tvl":2,"volume24h":3}}"#).unwrap();
        assert_eq!(bare.into_pool().pool_id, "a");
        assert_eq!(wrapped.into_pool().pool_id, "b");
    }

    #[test]
    fn expiry_parses_both_forms() {
        let millis = Expiry::Millis(1_700_000_000_000).to_datetime().unwrap();
        let text = Expiry::Text("2023-11-14T22:13:20Z".into()).to_datetime().unwrap();
        assert_eq!(millis, text);
    }
}
