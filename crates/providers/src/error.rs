use thiserror::Error;

/// Errors surfaced by provider adapters.
///
/// The poller only branches on two facts: whether the call was rate
/// limited (drives interval backoff) and whether the failure is worth
/// retrying on the next tick. Everything else is audit-log detail.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 or a semantic equivalent from the upstream
    #[error("rate limited by provider")]
    RateLimited,

    /// Non-2xx, non-429 response; fatal to the current call only
    #[error("provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated for logs
        body: String,
    },

    /// Transport-level failure (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response arrived but could not be interpreted
    #[error("malformed provider response: {0}")]
    Decode(String),

    /// Configured provider name has no adapter
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    /// Whether this failure signals upstream rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }

    /// Whether the next poll tick may reasonably succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Network(_) | ProviderError::Decode(_)
        )
    }
}
