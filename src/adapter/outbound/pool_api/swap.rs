//! Swap API client.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::dto::{ExecuteRequest, ExecuteResponse, QuoteRequest, QuoteResponse, StatusResponse};
use super::http::{ApiFailure, FailureKind, JsonApi};
use crate::domain::id::PoolId;
use crate::domain::money::Amount;
use crate::error::SwapError;
use crate::infrastructure::config::market::HttpConfig;
use crate::port::outbound::swap::{Quote, SwapProvider, TxRef, TxStatus};

/// Quotes without an explicit expiry are treated as valid this long.
const DEFAULT_QUOTE_TTL_SECS: i64 = 30;

const QUOTE_EXPIRED_CODE: &str = "QUOTE_EXPIRED";

/// HTTP client for the swap API.
pub struct SwapApiClient {
    api: JsonApi,
}

impl SwapApiClient {
    #[must_use]
    pub fn new(base_url: &str, http: &HttpConfig) -> Self {
        Self {
            api: JsonApi::new(base_url, http),
        }
    }
}

fn swap_error(failure: ApiFailure) -> SwapError {
    let expired = failure.status == Some(410)
        || failure
            .code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(QUOTE_EXPIRED_CODE));
    if expired {
        return SwapError::QuoteExpired;
    }
    match failure.kind {
        FailureKind::Transient => SwapError::Transient(failure.detail),
        FailureKind::Permanent => SwapError::Permanent(failure.detail),
        FailureKind::Rejected => SwapError::Rejected(failure.detail),
    }
}

fn to_quote(response: QuoteResponse, requested: Amount) -> Quote {
    let now = Utc::now();
    let expires_at = response
        .expires_at
        .as_ref()
        .and_then(|e| e.to_datetime())
        .unwrap_or_else(|| now + ChronoDuration::seconds(DEFAULT_QUOTE_TTL_SECS));
    Quote {
        quote_ref: response
            .quote_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        amount_in: response.input_amount.unwrap_or(requested.value()),
        expected_out: response.output_amount,
        expires_at,
    }
}

fn to_status(response: StatusResponse) -> Result<TxStatus, SwapError> {
    match response.status.to_ascii_lowercase().as_str() {
        "pending" | "submitted" | "processing" => Ok(TxStatus::Pending),
        "confirmed" | "finalized" | "success" => Ok(TxStatus::Confirmed),
        "failed" | "error" | "dropped" => Ok(TxStatus::Failed(
            response.error.unwrap_or_else(|| response.status.clone()),
        )),
        other => Err(SwapError::Permanent(format!("unknown transaction status '{other}'"))),
    }
}

#[async_trait]
impl SwapProvider for SwapApiClient {
    fn name(&self) -> &'static str {
        "swap-api"
    }

    async fn quote(
        &self,
        pool: &PoolId,
        amount: Amount,
        max_slippage: Decimal,
    ) -> Result<Quote, SwapError> {
        let request = QuoteRequest {
            pool_id: pool.as_str().to_string(),
            amount: amount.value().to_string(),
            slippage: max_slippage * Decimal::ONE_HUNDRED,
        };
        let response: QuoteResponse = self
            .api
            .post("/api/swap/quote", &request)
            .await
            .map_err(swap_error)?;
        let quote = to_quote(response, amount);
        debug!(%pool, quote_ref = %quote.quote_ref, expected_out = %quote.expected_out, "Got swap quote");
        Ok(quote)
    }

    async fn execute(&self, quote_ref: &str) -> Result<TxRef, SwapError> {
        let response: ExecuteResponse = self
            .api
            .post("/api/swap/execute", &ExecuteRequest { quote_id: quote_ref })
            .await
            .map_err(swap_error)?;
        let tx = response
            .into_ref()
            .ok_or_else(|| SwapError::Permanent("execution response without transaction reference".into()))?;
        info!(quote_ref, tx = %tx, "Swap submitted");
        Ok(TxRef(tx))
    }

    async fn status(&self, tx: &TxRef) -> Result<TxStatus, SwapError> {
        let path = format!("/api/swap/status/{tx}");
        let response: StatusResponse = self.api.get(&path).await.map_err(swap_error)?;
        to_status(response)
    }
}
