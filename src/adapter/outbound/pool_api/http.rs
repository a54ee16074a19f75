//! Shared JSON transport and failure classification.

use std::time::Duration;

use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::dto::ErrorBody;
use crate::infrastructure::config::market::HttpConfig;

/// How a failed call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying: timeouts, connection errors, 5xx, 408 and 429.
    Transient,
    /// Retrying will not help: malformed responses, auth failures.
    Permanent,
    /// The API understood the request and refused it (other 4xx).
    Rejected,
}

/// A classified transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub kind: FailureKind,
    pub status: Option<u16>,
    /// Machine-readable error code from the response body, if any.
    pub code: Option<String>,
    pub detail: String,
}

impl ApiFailure {
    fn transport(err: &reqwest::Error) -> Self {
        let kind = if should_retry(err) {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        };
        Self {
            kind,
            status: err.status().map(|s| s.as_u16()),
            code: None,
            detail: err.to_string(),
        }
    }

    fn decode(err: &reqwest::Error) -> Self {
        Self {
            kind: FailureKind::Permanent,
            status: None,
            code: None,
            detail: format!("malformed response: {err}"),
        }
    }

    /// Classify a non-success HTTP status with its (possibly empty) body.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        let message = parsed
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        let kind = if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            FailureKind::Transient
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            FailureKind::Permanent
        } else {
            FailureKind::Rejected
        };

        Self {
            kind,
            status: Some(status.as_u16()),
            code,
            detail: message,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

fn should_retry(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Thin JSON client bound to one base URL.
#[derive(Debug, Clone)]
pub struct JsonApi {
    http: HttpClient,
    base_url: String,
}

impl JsonApi {
    #[must_use]
    pub fn new(base_url: &str, config: &HttpConfig) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiFailure> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiFailure::transport(&e))?;
        Self::read(response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiFailure>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiFailure::transport(&e))?;
        Self::read(response).await
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ApiFailure> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::from_status(status, &body));
        }
        response.json::<T>().await.map_err(|e| {
            if should_retry(&e) {
                ApiFailure::transport(&e)
            } else {
                ApiFailure::decode(&e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        for code in [500, 502, 503, 504, 429, 408] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(ApiFailure::from_status(status, "").is_transient(), "{code}");
        }
    }

    #[test]
    fn auth_failures_are_permanent() {
        let failure = ApiFailure::from_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(failure.kind, FailureKind::Permanent);
        assert_eq!(failure.detail, "HTTP 401");
    }

    #[test]
    fn other_client_errors_are_rejections_with_body_details() {
        let failure = ApiFailure::from_status(
            StatusCode::GONE,
            r#"{"error":"quote is stale","code":"QUOTE_EXPIRED"}"#,
        );
        assert_eq!(failure.kind, FailureKind::Rejected);
        assert_eq!(failure.status, Some(410));
        assert_eq!(failure.code.as_deref(), Some("QUOTE_EXPIRED"));
        assert_eq!(failure.detail, "quote is stale");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = JsonApi::new("http://localhost:5000/", &HttpConfig::default());
        assert_eq!(api.url("/api/pools"), "http://localhost:5000/api/pools");
    }
}
