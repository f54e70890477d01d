use thiserror::Error;

/// Error taxonomy for the Pelagos client.
///
/// Transport-level failures (`Network`, `Timeout`, `RateLimited`, 5xx `Api`)
/// are retryable by the resilience policy; everything else surfaces to the
/// caller unchanged on first occurrence.
#[derive(Error, Debug)]
pub enum PelagosError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by venue (retry-after: {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid key material: {0}")]
    InvalidKeyFormat(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("no canonical encoding: {0}")]
    Encoding(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}
