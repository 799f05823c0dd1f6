//! Trait seam between the ingestion orchestrator and the upstream provider
//! client, so account ingestion is testable with a scripted fetcher: no
//! network, no retries, `cargo test` in seconds.

use async_trait::async_trait;

use firefeed_client::{error::Result, FeedEnvelope, FirefeedClient};

#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Fetch up to `limit` recent posts for one tracked account, newest first.
    async fn fetch_posts(&self, account: &str, limit: u32) -> Result<FeedEnvelope>;
}

#[async_trait]
impl PostFetcher for FirefeedClient {
    async fn fetch_posts(&self, account: &str, limit: u32) -> Result<FeedEnvelope> {
        FirefeedClient::fetch_posts(self, account, limit).await
    }
}
