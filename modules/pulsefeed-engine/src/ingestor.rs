//! Ingestion orchestrator: drives Fetch→Parse→Validate→Save for many
//! tracked accounts in parallel, bounded by a fixed-size pool. One
//! account's failure never aborts the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use pulsefeed_common::Settings;
use pulsefeed_store::PostRepository;

use crate::jobs::{Job, JobQueue};
use crate::parser;
use crate::tasks::TaskRegistry;
use crate::traits::PostFetcher;
use crate::validator;

/// Aggregate outcome of one ingestion run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestStats {
    pub accounts_total: u32,
    pub accounts_succeeded: u32,
    pub accounts_failed: u32,
    pub posts_fetched: u32,
    pub posts_new: u32,
    pub posts_skipped: u32,
    pub posts_invalid: u32,
    pub posts_errored: u32,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Ingestion Run Complete ===")?;
        writeln!(
            f,
            "Accounts:      {} ({} ok, {} failed)",
            self.accounts_total, self.accounts_succeeded, self.accounts_failed
        )?;
        writeln!(f, "Posts fetched: {}", self.posts_fetched)?;
        writeln!(f, "Posts new:     {}", self.posts_new)?;
        writeln!(f, "Posts skipped: {}", self.posts_skipped)?;
        writeln!(f, "Posts invalid: {}", self.posts_invalid)?;
        writeln!(f, "Posts errored: {}", self.posts_errored)?;
        writeln!(f, "Elapsed:       {}ms", self.elapsed_ms)?;
        Ok(())
    }
}

struct AccountOutcome {
    fetched: u32,
    new: u32,
    skipped: u32,
    invalid: u32,
    errored: u32,
}

pub struct Ingestor {
    fetcher: Arc<dyn PostFetcher>,
    repo: Arc<PostRepository>,
    registry: Arc<TaskRegistry>,
    jobs: Option<JobQueue>,
    settings: Settings,
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn PostFetcher>,
        repo: Arc<PostRepository>,
        registry: Arc<TaskRegistry>,
        settings: Settings,
    ) -> Self {
        Self {
            fetcher,
            repo,
            registry,
            jobs: None,
            settings,
        }
    }

    /// Attach the background queue so successful saves trigger deduplication.
    pub fn with_job_queue(mut self, jobs: JobQueue) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Asynchronous entry point: create a task, run in the background,
    /// return the task id immediately. The aggregate stats land on the task
    /// record when the run finishes.
    pub fn start(self: &Arc<Self>, accounts: Vec<String>, limit: u32) -> Uuid {
        let metadata = HashMap::from([
            ("accounts".to_string(), accounts.len().to_string()),
            ("limit".to_string(), limit.to_string()),
        ]);
        let task_id = self.registry.create("scrape_accounts", metadata);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.registry.mark_running(task_id);
            let stats = this.run(&accounts, limit).await;
            match serde_json::to_value(&stats) {
                Ok(value) => this.registry.complete(task_id, value),
                Err(e) => this.registry.fail(task_id, e.to_string()),
            }
        });

        task_id
    }

    /// Direct entry point. Always returns a best-effort aggregate, even
    /// when every account fails.
    pub async fn run(&self, accounts: &[String], limit: u32) -> IngestStats {
        let started = Instant::now();
        let mut stats = IngestStats {
            accounts_total: accounts.len() as u32,
            ..Default::default()
        };

        let results: Vec<(String, anyhow::Result<AccountOutcome>)> =
            stream::iter(accounts.iter().cloned().map(|account| async move {
                let outcome = self.ingest_account(&account, limit).await;
                (account, outcome)
            }))
            .buffer_unordered(self.settings.ingest_concurrency.max(1))
            .collect()
            .await;

        for (account, result) in results {
            match result {
                Ok(outcome) => {
                    stats.accounts_succeeded += 1;
                    stats.posts_fetched += outcome.fetched;
                    stats.posts_new += outcome.new;
                    stats.posts_skipped += outcome.skipped;
                    stats.posts_invalid += outcome.invalid;
                    stats.posts_errored += outcome.errored;
                }
                Err(e) => {
                    warn!(account, error = %e, "Account ingestion failed");
                    stats.accounts_failed += 1;
                }
            }
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            accounts = stats.accounts_total,
            failed = stats.accounts_failed,
            new = stats.posts_new,
            skipped = stats.posts_skipped,
            "Ingestion run complete"
        );
        stats
    }

    /// One account, strictly sequential: fetch, parse, validate, save, then
    /// hand the newly-saved ids to deduplication.
    async fn ingest_account(&self, account: &str, limit: u32) -> anyhow::Result<AccountOutcome> {
        let envelope = self
            .fetcher
            .fetch_posts(account, limit)
            .await
            .with_context(|| format!("Fetching posts for {account}"))?;
        let fetched = envelope.posts.len() as u32;

        let parsed = parser::parse_envelope(&envelope);

        let mut valid = Vec::with_capacity(parsed.len());
        let mut invalid: u32 = 0;
        for post in parsed {
            match validator::validate_and_clean(post) {
                Ok(post) => valid.push(post),
                Err(e) => {
                    warn!(account, error = %e, "Dropping invalid post");
                    invalid += 1;
                }
            }
        }

        let outcome = self
            .repo
            .save_batch(&valid, self.settings.early_stop_threshold)
            .await
            .context("Saving posts")?;

        info!(
            account,
            fetched,
            new = outcome.saved(),
            skipped = outcome.skipped,
            "Account ingested"
        );

        // Fire-and-forget: a failure downstream must not fail this account.
        if !outcome.saved_ids.is_empty() {
            if let Some(jobs) = &self.jobs {
                let job = Job::Deduplicate {
                    post_ids: outcome.saved_ids.clone(),
                };
                if let Err(e) = jobs.enqueue(job).await {
                    warn!(account, error = %e, "Failed to enqueue deduplication job");
                }
            }
        }

        Ok(AccountOutcome {
            fetched,
            new: outcome.saved(),
            skipped: outcome.skipped,
            invalid,
            errored: outcome.errors,
        })
    }
}
