use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use firefeed_client::FirefeedClient;
use llm_client::{AnthropicProvider, LlmProvider, OpenAiProvider};
use pulsefeed_common::{Clock, Config, SystemClock};
use pulsefeed_engine::{
    jobs, Deduplicator, Ingestor, JobQueue, Summarizer, TaskRegistry,
};
use pulsefeed_store::{PgStore, PostRepository, PostStore};

#[derive(Parser)]
#[command(name = "pulsefeed", about = "Social post ingestion and enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest recent posts for tracked accounts
    Scrape {
        /// Comma-separated account handles
        #[arg(long, value_delimiter = ',', required = true)]
        accounts: Vec<String>,
        /// Max posts fetched per account
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Group duplicate and near-duplicate posts
    Dedupe {
        /// Comma-separated post ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },
    /// Summarize the groups the given posts belong to
    Summarize {
        /// Comma-separated post ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        /// Bypass the summary cache (still refreshes it on success)
        #[arg(long)]
        force_refresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsefeed=info".parse()?))
        .init();

    info!("PulseFeed starting...");

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();
    let settings = config.settings.clone();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;
    let store: Arc<dyn PostStore> = store;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(TaskRegistry::new(settings.task_ttl, clock.clone()));

    let providers = build_providers(&config);
    let summarizer = if providers.is_empty() {
        None
    } else {
        Some(Arc::new(Summarizer::new(
            store.clone(),
            providers,
            registry.clone(),
            clock.clone(),
            settings.clone(),
        )))
    };

    let deduplicator = Arc::new(Deduplicator::new(
        store.clone(),
        registry.clone(),
        settings.clone(),
    ));

    let (queue, rx) = JobQueue::bounded(64);
    let worker = jobs::spawn_worker(rx, deduplicator.clone(), summarizer.clone());

    match cli.command {
        Command::Scrape { accounts, limit } => {
            let fetcher = Arc::new(
                FirefeedClient::with_timeout(config.firefeed_api_key.clone(), settings.http_timeout)
                    .with_base_url(&config.firefeed_base_url)
                    .with_retry_policy(
                        settings.fetch_max_retries,
                        settings.fetch_backoff_base,
                        settings.fetch_backoff_cap,
                    ),
            );
            let repo = Arc::new(PostRepository::new(store.clone()));
            let ingestor = Ingestor::new(fetcher, repo, registry.clone(), settings.clone())
                .with_job_queue(queue.clone());

            let stats = ingestor.run(&accounts, limit).await;
            println!("{stats}");
        }
        Command::Dedupe { ids } => {
            let outcome = deduplicator.deduplicate(&ids).await?;
            println!("{}", outcome.stats);
            if !outcome.representatives.is_empty() {
                queue
                    .enqueue(pulsefeed_engine::Job::Summarize {
                        post_ids: outcome.representatives,
                    })
                    .await?;
            }
        }
        Command::Summarize { ids, force_refresh } => {
            let summarizer = summarizer.clone().ok_or_else(|| {
                anyhow!("no LLM provider configured (set ANTHROPIC_API_KEY or OPENAI_API_KEY)")
            })?;
            let stats = summarizer.summarize(&ids, force_refresh).await?;
            println!("{stats}");
        }
    }

    // Drop the last producer handle so the worker drains and exits.
    drop(queue);
    worker.await?;

    Ok(())
}

fn build_providers(config: &Config) -> Vec<Arc<dyn LlmProvider>> {
    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();
    if !config.anthropic_api_key.is_empty() {
        providers.push(Arc::new(AnthropicProvider::new(&config.anthropic_api_key)));
    }
    if !config.openai_api_key.is_empty() {
        providers.push(Arc::new(OpenAiProvider::new(&config.openai_api_key)));
    }
    providers
}
