use std::sync::Arc;

use tracing::{debug, warn};

use pulsefeed_common::Post;

use crate::traits::{PostStore, StoreError};

/// Outcome of one incremental save pass over an account's feed. Newly saved
/// ids are kept so the caller can hand exactly those to deduplication.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub saved_ids: Vec<String>,
    pub skipped: u32,
    pub errors: u32,
}

impl SaveOutcome {
    pub fn saved(&self) -> u32 {
        self.saved_ids.len() as u32
    }
}

/// Incremental-ingestion repository. Feeds arrive newest-first, so a run of
/// already-known posts means the rest of the history was seen on a previous
/// pass; the early-stop threshold bounds how far we rescan.
pub struct PostRepository {
    store: Arc<dyn PostStore>,
}

impl PostRepository {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn PostStore> {
        self.store.clone()
    }

    /// Save posts in caller order (assumed reverse-chronological). A known
    /// id counts as skipped and extends the consecutive-seen run; a fresh id
    /// is persisted and resets the run. Once the run reaches
    /// `early_stop_threshold` (> 0 enables), every remaining post is marked
    /// skipped without further existence checks or writes. A failed write is
    /// counted and its siblings proceed.
    pub async fn save_batch(
        &self,
        posts: &[Post],
        early_stop_threshold: u32,
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut consecutive_seen: u32 = 0;

        for (idx, post) in posts.iter().enumerate() {
            if self.store.post_exists(&post.id).await? {
                outcome.skipped += 1;
                consecutive_seen += 1;

                if early_stop_threshold > 0 && consecutive_seen >= early_stop_threshold {
                    let remaining = (posts.len() - idx - 1) as u32;
                    outcome.skipped += remaining;
                    debug!(
                        consecutive_seen,
                        remaining, "Early stop: feed unchanged past this point"
                    );
                    break;
                }
                continue;
            }

            match self.store.save_post(post).await {
                Ok(()) => {
                    outcome.saved_ids.push(post.id.clone());
                }
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "Failed to save post");
                    outcome.errors += 1;
                }
            }
            consecutive_seen = 0;
        }

        Ok(outcome)
    }
}
