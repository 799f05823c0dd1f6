use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use pulsefeed_common::{DuplicateGroup, Post, SummaryRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Persistence contract consumed by the pipeline. Posts are owned by the
/// store once saved; groups and summaries reference them by id only.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn post_exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Set semantics: the returned set of known ids does not depend on the
    /// order of the input.
    async fn batch_post_exists(&self, ids: &[String]) -> Result<HashSet<String>, StoreError>;

    async fn save_post(&self, post: &Post) -> Result<(), StoreError>;

    async fn post_by_id(&self, id: &str) -> Result<Option<Post>, StoreError>;

    async fn posts_by_ids(&self, ids: &[String]) -> Result<Vec<Post>, StoreError>;

    /// Persist a group and point every member post at it, atomically.
    async fn save_duplicate_group(&self, group: &DuplicateGroup) -> Result<(), StoreError>;

    async fn find_group_by_post(&self, post_id: &str)
        -> Result<Option<DuplicateGroup>, StoreError>;

    async fn save_summary_record(&self, record: &SummaryRecord) -> Result<(), StoreError>;

    /// Latest summary whose cache key matches, if any.
    async fn find_summary_by_content_hash(
        &self,
        hash: &str,
    ) -> Result<Option<SummaryRecord>, StoreError>;
}
