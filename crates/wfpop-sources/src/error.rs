use thiserror::Error;

/// Errors raised inside a source adapter. None of these escape
/// [`crate::SourceAdapter::fetch`]; they are logged and mapped to an empty or
/// partial batch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or TLS failure from the underlying HTTP client. The request
    /// URL is stripped on conversion because it can carry an API key.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The upstream rejected the call for rate or quota reasons.
    #[error("rate limited by {url} (status {status})")]
    RateLimited { status: u16, url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.without_url())
    }
}

impl SourceError {
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}
