//! Deduplication orchestrator: loads candidate posts, skips anything a
//! previous run already grouped, batches detection, and persists the
//! groups. The representatives of new groups are returned so the job
//! worker can schedule summarization without coupling the two stages.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use pulsefeed_common::{DedupKind, Post, Settings};
use pulsefeed_store::PostStore;

use crate::detector;
use crate::tasks::TaskRegistry;

#[derive(Debug, Default, Clone, Serialize)]
pub struct DedupStats {
    /// Posts that entered detection after dropping already-grouped ids.
    pub posts_considered: u32,
    pub exact_groups: u32,
    pub similarity_groups: u32,
    /// Non-representative members across all new groups.
    pub affected: u32,
    /// considered − affected + number of groups.
    pub preserved: u32,
}

impl std::fmt::Display for DedupStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Deduplication Complete ===")?;
        writeln!(f, "Posts considered:  {}", self.posts_considered)?;
        writeln!(f, "Exact groups:      {}", self.exact_groups)?;
        writeln!(f, "Similarity groups: {}", self.similarity_groups)?;
        writeln!(f, "Posts affected:    {}", self.affected)?;
        writeln!(f, "Posts preserved:   {}", self.preserved)?;
        Ok(())
    }
}

/// Result of one deduplication call: the aggregate stats plus the
/// representative id of every group created by this run.
#[derive(Debug, Default, Clone)]
pub struct DedupOutcome {
    pub stats: DedupStats,
    pub representatives: Vec<String>,
}

pub struct Deduplicator {
    store: Arc<dyn PostStore>,
    registry: Arc<TaskRegistry>,
    settings: Settings,
}

impl Deduplicator {
    pub fn new(
        store: Arc<dyn PostStore>,
        registry: Arc<TaskRegistry>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Asynchronous entry point; stats land on the returned task.
    pub fn start(self: &Arc<Self>, post_ids: Vec<String>) -> Uuid {
        let metadata = HashMap::from([("posts".to_string(), post_ids.len().to_string())]);
        let task_id = self.registry.create("deduplicate", metadata);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.registry.mark_running(task_id);
            match this.deduplicate(&post_ids).await {
                Ok(outcome) => match serde_json::to_value(&outcome.stats) {
                    Ok(value) => this.registry.complete(task_id, value),
                    Err(e) => this.registry.fail(task_id, e.to_string()),
                },
                Err(e) => this.registry.fail(task_id, format!("{e:#}")),
            }
        });

        task_id
    }

    /// Direct entry point. Idempotent: re-running on the same ids finds
    /// every post already grouped and creates nothing.
    pub async fn deduplicate(&self, post_ids: &[String]) -> anyhow::Result<DedupOutcome> {
        let posts = self.store.posts_by_ids(post_ids).await?;

        let mut ungrouped: Vec<Post> = Vec::with_capacity(posts.len());
        for post in posts {
            if self.store.find_group_by_post(&post.id).await?.is_none() {
                ungrouped.push(post);
            }
        }

        let mut stats = DedupStats {
            posts_considered: ungrouped.len() as u32,
            ..Default::default()
        };
        let mut representatives: Vec<String> = Vec::new();

        for batch in ungrouped.chunks(self.settings.dedup_batch_size.max(1)) {
            // Exact detection always completes before similarity runs on
            // the residue.
            let exact = detector::detect_exact(batch);
            let claimed = detector::claimed_ids(&exact);
            let residue: Vec<Post> = batch
                .iter()
                .filter(|p| !claimed.contains(&p.id))
                .cloned()
                .collect();

            let similar = if self.settings.similarity_enabled {
                detector::detect_similar(&residue, self.settings.similarity_threshold)
            } else {
                Vec::new()
            };

            for group in exact.into_iter().chain(similar) {
                self.store.save_duplicate_group(&group).await?;
                match group.kind {
                    DedupKind::Exact => stats.exact_groups += 1,
                    DedupKind::Similar => stats.similarity_groups += 1,
                }
                stats.affected += (group.member_ids.len() - 1) as u32;
                representatives.push(group.representative_id.clone());
            }
        }

        let groups_total = stats.exact_groups + stats.similarity_groups;
        stats.preserved = stats.posts_considered - stats.affected + groups_total;

        info!(
            considered = stats.posts_considered,
            exact = stats.exact_groups,
            similar = stats.similarity_groups,
            "Deduplication complete"
        );

        Ok(DedupOutcome {
            stats,
            representatives,
        })
    }
}
