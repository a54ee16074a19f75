//! Market data and swap provider endpoints.

use serde::Deserialize;

/// HTTP timeouts shared by the provider clients.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (default: 10000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (default: 5000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// `[market]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketConfig {
    /// Pool data API base URL, e.g. `https://api.example.com`.
    #[serde(default)]
    pub base_url: String,
    #[serde(default, flatten)]
    pub http: HttpConfig,
}

/// `[swap]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    /// Swap API base URL. Falls back to the market base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, flatten)]
    pub http: HttpConfig,
    /// Re-quotes allowed after a quote expires (default: 2).
    #[serde(default = "default_max_requotes")]
    pub max_requotes: u32,
    /// Status poll interval in milliseconds (default: 2000).
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
    /// Confirmation timeout in seconds (default: 120).
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    /// Immediate retries after a trade store version conflict (default: 3).
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

const fn default_max_requotes() -> u32 {
    2
}

const fn default_confirm_poll_ms() -> u64 {
    2_000
}

const fn default_confirm_timeout_secs() -> u64 {
    120
}

const fn default_conflict_retries() -> u32 {
    3
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            http: HttpConfig::default(),
            max_requotes: default_max_requotes(),
            confirm_poll_ms: default_confirm_poll_ms(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            conflict_retries: default_conflict_retries(),
        }
    }
}
