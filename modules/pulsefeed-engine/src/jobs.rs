//! Background job queue decoupling the orchestrators' failure domains.
//! Ingestion enqueues deduplication and returns as soon as the send
//! succeeds; a dedicated worker owns execution, chains summarization for
//! freshly created groups, and its failures never propagate back to the
//! component that triggered the job.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::deduplicator::Deduplicator;
use crate::summarizer::Summarizer;

#[derive(Debug, Clone)]
pub enum Job {
    Deduplicate { post_ids: Vec<String> },
    Summarize { post_ids: Vec<String> },
}

/// Cheap cloneable handle for producers. The worker exits once every
/// handle is dropped and the channel drains.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn enqueue(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow!("job worker has shut down"))
    }
}

/// Consume jobs until every queue handle is dropped. Job failures are
/// logged, never propagated.
pub fn spawn_worker(
    mut rx: mpsc::Receiver<Job>,
    deduplicator: Arc<Deduplicator>,
    summarizer: Option<Arc<Summarizer>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                Job::Deduplicate { post_ids } => {
                    info!(posts = post_ids.len(), "Running deduplication job");
                    match deduplicator.deduplicate(&post_ids).await {
                        Ok(outcome) => {
                            summarize(&summarizer, outcome.representatives).await;
                        }
                        Err(e) => error!(error = %e, "Deduplication job failed"),
                    }
                }
                Job::Summarize { post_ids } => {
                    summarize(&summarizer, post_ids).await;
                }
            }
        }
    })
}

async fn summarize(summarizer: &Option<Arc<Summarizer>>, post_ids: Vec<String>) {
    if post_ids.is_empty() {
        return;
    }
    match summarizer {
        Some(summarizer) => {
            info!(posts = post_ids.len(), "Running summarization job");
            if let Err(e) = summarizer.summarize(&post_ids, false).await {
                error!(error = %e, "Summarization job failed");
            }
        }
        None => {
            info!(posts = post_ids.len(), "No summarizer configured, dropping job");
        }
    }
}
