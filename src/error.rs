use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Failures from the market data collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// Timeouts, connection resets, 5xx and 429 responses.
    #[error("transient market data failure: {0}")]
    Transient(String),

    /// Malformed responses and rejected credentials.
    #[error("permanent market data failure: {0}")]
    Permanent(String),
}

/// Failures from the swap collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("transient swap failure: {0}")]
    Transient(String),

    #[error("permanent swap failure: {0}")]
    Permanent(String),

    /// The provider signalled that the quote is no longer valid.
    #[error("quote expired")]
    QuoteExpired,

    #[error("swap rejected: {0}")]
    Rejected(String),
}

/// Failures from the messaging collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The recipient cannot be reached (blocked bot, unknown chat).
    #[error("message undeliverable: {0}")]
    Permanent(String),
}

/// Persistence errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic update collided with a concurrent writer.
    #[error("version conflict on {key}: expected {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("health check failed: {0}")]
    Health(String),

    #[error("database error: {0}")]
    Database(String),
}

impl Error {
    /// Process exit code for this error: 1 for configuration problems,
    /// 2 for collaborator failures.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Domain(_) | Self::Url(_) => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
