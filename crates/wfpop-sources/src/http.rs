//! Shared HTTP plumbing for the source adapters.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use wfpop_core::AppConfig;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;

const DEFAULT_USER_AGENT: &str = "n8n-popularity-harvester/1.0";

/// Google API `reason` codes that mean "slow down" rather than "forbidden".
const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: 2,
            retry_backoff_base_ms: 500,
        }
    }
}

impl HttpSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http_timeout_secs,
            user_agent: config.http_user_agent.clone(),
            max_retries: config.http_max_retries,
            retry_backoff_base_ms: config.http_retry_backoff_base_ms,
        }
    }
}

/// HTTP client plus the retry settings every adapter call shares.
#[derive(Debug, Clone)]
pub(crate) struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_backoff_base_ms: u64,
}

impl HttpFetcher {
    pub(crate) fn new(settings: &HttpSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            max_retries: settings.max_retries,
            retry_backoff_base_ms: settings.retry_backoff_base_ms,
        })
    }

    /// GET `url` and return the body text, retrying transient failures.
    pub(crate) async fn get_text(&self, url: &Url) -> Result<String, SourceError> {
        retry_with_backoff(self.max_retries, self.retry_backoff_base_ms, || async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.text().await?);
            }

            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, &body, url))
        })
        .await
    }

    /// GET `url` and deserialize the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        context: &str,
    ) -> Result<T, SourceError> {
        let body = self.get_text(url).await?;
        parse_json(&body, context)
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str, context: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

/// Map a non-2xx response to a [`SourceError`].
///
/// 429 is always a rate limit. 403 is a rate limit only when the body carries
/// one of the Google quota reasons.
pub(crate) fn classify_status(status: StatusCode, body: &str, url: &Url) -> SourceError {
    let url = redact_key(url);
    let quota_rejection =
        status == StatusCode::FORBIDDEN && QUOTA_REASONS.iter().any(|r| body.contains(r));

    if status == StatusCode::TOO_MANY_REQUESTS || quota_rejection {
        SourceError::RateLimited {
            status: status.as_u16(),
            url,
        }
    } else {
        SourceError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        }
    }
}

/// Parse a base URL and make sure it ends with exactly one `/`, so that
/// [`Url::join`] appends path segments instead of replacing the last one.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<Url, SourceError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl {
        base_url: base_url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, SourceError> {
    base.join(path).map_err(|e| SourceError::InvalidBaseUrl {
        base_url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Strip the `key` query parameter so API keys never reach logs or errors.
fn redact_key(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "key") {
        return url.to_string();
    }
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" {
                "[redacted]".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
