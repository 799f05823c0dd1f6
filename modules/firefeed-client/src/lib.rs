pub mod error;
pub mod types;

pub use error::{FetchError, Result};
pub use types::{FeedEnvelope, RawFeedResponse, RawMedia, RawPost, RawReference, RawUser};

use std::time::Duration;

use tracing::{info, warn};

const DEFAULT_BASE_URL: &str = "https://api.firefeed.io";

/// Legacy provider timestamp format, e.g. "Wed Oct 10 20:19:24 +0000 2018".
const LEGACY_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub struct FirefeedClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl FirefeedClient {
    pub fn new(token: String) -> Self {
        Self::with_timeout(token, Duration::from_secs(30))
    }

    pub fn with_timeout(token: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            max_retries: 5,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, base: Duration, cap: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Fetch up to `limit` recent posts for one tracked account, newest
    /// first, with author/media includes rebuilt into lookup maps.
    ///
    /// Transient failures (5xx, 429, timeout, network) retry up to the
    /// configured attempt count with exponential backoff; auth and
    /// malformed-request responses fail immediately, as does a 200 whose
    /// body does not decode.
    pub async fn fetch_posts(&self, account: &str, limit: u32) -> Result<FeedEnvelope> {
        if account.trim().is_empty() {
            return Err(FetchError::InvalidInput("account must be non-empty".into()));
        }
        if limit < 1 {
            return Err(FetchError::InvalidInput("limit must be >= 1".into()));
        }

        let url = format!("{}/v1/accounts/{}/posts", self.base_url, account);

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(&url, limit).await {
                Ok(envelope) => {
                    info!(account, posts = envelope.posts.len(), "Fetched posts");
                    return Ok(envelope);
                }
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        account,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Fetch failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(account, attempts = attempt + 1, error = %err, "Fetch failed");
                    return Err(err);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str, limit: u32) -> Result<FeedEnvelope> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        // A successful status with an undecodable body is a hard failure,
        // never retried.
        let raw: RawFeedResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut envelope = raw.into_envelope();
        normalize_dates(&mut envelope);
        Ok(envelope)
    }

    /// Delay before retry `attempt + 1`: base doubled per attempt, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base.saturating_mul(factor).min(self.backoff_cap)
    }
}

fn normalize_dates(envelope: &mut FeedEnvelope) {
    for post in envelope.posts.iter_mut() {
        if let Some(raw) = post.created_at.take() {
            post.created_at = Some(normalize_provider_date(&raw));
        }
    }
    for post in envelope.referenced.values_mut() {
        if let Some(raw) = post.created_at.take() {
            post.created_at = Some(normalize_provider_date(&raw));
        }
    }
}

/// Convert a provider date string to RFC 3339 UTC. The provider emits either
/// RFC 3339 or its legacy `Wed Oct 10 20:19:24 +0000 2018` format; anything
/// unrecognized passes through raw rather than being fabricated.
pub fn normalize_provider_date(raw: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&chrono::Utc).to_rfc3339();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_str(raw, LEGACY_DATE_FORMAT) {
        return dt.with_timezone(&chrono::Utc).to_rfc3339();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_rfc3339_to_utc() {
        let out = normalize_provider_date("2026-01-15T10:00:00+02:00");
        assert_eq!(out, "2026-01-15T08:00:00+00:00");
    }

    #[test]
    fn normalizes_legacy_format() {
        let out = normalize_provider_date("Wed Oct 10 20:19:24 +0000 2018");
        assert_eq!(out, "2018-10-10T20:19:24+00:00");
    }

    #[test]
    fn unparseable_date_passes_through() {
        assert_eq!(normalize_provider_date("yesterday-ish"), "yesterday-ish");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let client = FirefeedClient::new("t".into()).with_retry_policy(
            5,
            Duration::from_secs(1),
            Duration::from_secs(60),
        );
        assert_eq!(client.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(client.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(client.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(client.backoff_delay(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn rejects_empty_account() {
        let client = FirefeedClient::new("t".into());
        let err = client.fetch_posts("  ", 10).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rejects_zero_limit() {
        let client = FirefeedClient::new("t".into());
        let err = client.fetch_posts("acct", 0).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
    }
}
