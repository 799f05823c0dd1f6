//! Summarization orchestrator: per duplicate group, check the content-hash
//! cache, else walk an ordered provider chain with one same-provider retry
//! on temporary errors, persist the representative's record, and fan the
//! result out to every member. Groups run under a bounded semaphore; within
//! a group everything is strictly sequential.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use llm_client::util::strip_code_blocks;
use llm_client::{Completion, CompletionRequest, ErrorKind, LlmProvider};
use pulsefeed_common::{content_hash, Clock, Settings, SummaryRecord};
use pulsefeed_store::{PostStore, StoreError};

use crate::summary_cache::{CachedSummary, SummaryCache};
use crate::tasks::TaskRegistry;

/// Task-kind component of the cache key, so other enrichment kinds sharing
/// the cache can never collide with summaries.
const SUMMARY_TASK_KIND: &str = "summarize";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("all providers exhausted for every group in the request")]
    AllGroupsFailed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SummarizeStats {
    pub posts: u32,
    pub groups: u32,
    pub cache_hits: u32,
    pub cache_misses: u32,
    pub failed_groups: u32,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    /// Successful completions per configured provider; zero entries kept.
    pub providers_used: HashMap<String, u32>,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for SummarizeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Summarization Complete ===")?;
        writeln!(f, "Posts:        {}", self.posts)?;
        writeln!(f, "Groups:       {}", self.groups)?;
        writeln!(f, "Cache hits:   {}", self.cache_hits)?;
        writeln!(f, "Cache misses: {}", self.cache_misses)?;
        writeln!(f, "Failed:       {}", self.failed_groups)?;
        writeln!(f, "Tokens:       {}", self.total_tokens)?;
        writeln!(f, "Cost:         ${:.4}", self.total_cost_usd)?;
        let mut providers: Vec<_> = self.providers_used.iter().collect();
        providers.sort();
        for (provider, count) in providers {
            writeln!(f, "  {provider}: {count}")?;
        }
        writeln!(f, "Elapsed:      {}ms", self.elapsed_ms)?;
        Ok(())
    }
}

struct GroupOutcome {
    cache_hit: bool,
    tokens: u64,
    cost: f64,
    provider: Option<String>,
}

pub struct Summarizer {
    store: Arc<dyn PostStore>,
    providers: Vec<Arc<dyn LlmProvider>>,
    cache: SummaryCache,
    registry: Arc<TaskRegistry>,
    clock: Arc<dyn Clock>,
    settings: Settings,
}

impl Summarizer {
    pub fn new(
        store: Arc<dyn PostStore>,
        providers: Vec<Arc<dyn LlmProvider>>,
        registry: Arc<TaskRegistry>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        let cache = SummaryCache::new(settings.cache_ttl, clock.clone());
        Self {
            store,
            providers,
            cache,
            registry,
            clock,
            settings,
        }
    }

    /// Asynchronous entry point; stats land on the returned task.
    pub fn start(self: &Arc<Self>, post_ids: Vec<String>, force_refresh: bool) -> Uuid {
        let metadata = HashMap::from([("posts".to_string(), post_ids.len().to_string())]);
        let task_id = self.registry.create("summarize", metadata);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.registry.mark_running(task_id);
            match this.summarize(&post_ids, force_refresh).await {
                Ok(stats) => match serde_json::to_value(&stats) {
                    Ok(value) => this.registry.complete(task_id, value),
                    Err(e) => this.registry.fail(task_id, e.to_string()),
                },
                Err(e) => this.registry.fail(task_id, e.to_string()),
            }
        });

        task_id
    }

    /// Direct entry point. Partial failure is a partial result; the hard
    /// error surfaces only when every group exhausted the provider chain.
    pub async fn summarize(
        &self,
        post_ids: &[String],
        force_refresh: bool,
    ) -> Result<SummarizeStats, SummarizeError> {
        let started = Instant::now();

        // Resolve each input id to its group; a groupless id is treated as
        // a singleton group of itself.
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        let mut seen_groups: HashSet<Uuid> = HashSet::new();
        let mut seen_singletons: HashSet<String> = HashSet::new();
        for id in post_ids {
            match self.store.find_group_by_post(id).await? {
                Some(group) => {
                    if seen_groups.insert(group.id) {
                        groups.push((group.representative_id, group.member_ids));
                    }
                }
                None => {
                    if seen_singletons.insert(id.clone()) {
                        groups.push((id.clone(), vec![id.clone()]));
                    }
                }
            }
        }

        let mut stats = SummarizeStats {
            posts: post_ids.len() as u32,
            groups: groups.len() as u32,
            ..Default::default()
        };
        for provider in &self.providers {
            stats
                .providers_used
                .insert(provider.provider_name().to_string(), 0);
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.summarize_concurrency.max(1)));
        let outcomes =
            futures::future::join_all(groups.into_iter().map(|(rep_id, member_ids)| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| anyhow!("summarize semaphore closed"))?;
                    self.process_group(&rep_id, &member_ids, force_refresh).await
                }
            }))
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(group) => {
                    if group.cache_hit {
                        stats.cache_hits += 1;
                    } else {
                        stats.cache_misses += 1;
                    }
                    stats.total_tokens += group.tokens;
                    stats.total_cost_usd += group.cost;
                    if let Some(provider) = group.provider {
                        *stats.providers_used.entry(provider).or_insert(0) += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Group summarization failed");
                    stats.failed_groups += 1;
                }
            }
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        if stats.groups > 0 && stats.failed_groups == stats.groups {
            return Err(SummarizeError::AllGroupsFailed);
        }

        info!(
            groups = stats.groups,
            cache_hits = stats.cache_hits,
            failed = stats.failed_groups,
            tokens = stats.total_tokens,
            "Summarization complete"
        );
        Ok(stats)
    }

    /// One group, strictly sequential: cache check, load text, provider
    /// chain, persist, fan out.
    async fn process_group(
        &self,
        rep_id: &str,
        member_ids: &[String],
        force_refresh: bool,
    ) -> anyhow::Result<GroupOutcome> {
        let post = self
            .store
            .post_by_id(rep_id)
            .await?
            .ok_or_else(|| anyhow!("representative post {rep_id} not stored"))?;

        let hash = content_hash(&format!("{SUMMARY_TASK_KIND}:{}", post.text));

        if !force_refresh {
            if let Some(entry) = self.cache.get(&hash) {
                debug!(post_id = rep_id, "Summary cache hit");
                self.write_records(member_ids, rep_id, &entry, &hash, true, None)
                    .await?;
                return Ok(GroupOutcome {
                    cache_hit: true,
                    tokens: 0,
                    cost: 0.0,
                    provider: None,
                });
            }
        }

        // Too short to summarize: echo the original text, no LLM call.
        if post.text.chars().count() < self.settings.short_text_threshold {
            let entry = CachedSummary {
                summary: post.text.clone(),
                translation: None,
                provider: "none".to_string(),
                model: "none".to_string(),
                is_generated: false,
            };
            self.write_records(member_ids, rep_id, &entry, &hash, false, None)
                .await?;
            self.cache.insert(hash, entry);
            return Ok(GroupOutcome {
                cache_hit: false,
                tokens: 0,
                cost: 0.0,
                provider: None,
            });
        }

        let (completion, provider) = self.call_provider_chain(&post.text).await?;
        let (summary, translation) = parse_summary_payload(&completion.text);

        let entry = CachedSummary {
            summary,
            translation,
            provider: provider.clone(),
            model: completion.model.clone(),
            is_generated: true,
        };
        self.write_records(member_ids, rep_id, &entry, &hash, false, Some(&completion))
            .await?;
        self.cache.insert(hash, entry);

        Ok(GroupOutcome {
            cache_hit: false,
            tokens: completion.total_tokens() as u64,
            cost: completion.cost_usd,
            provider: Some(provider),
        })
    }

    /// Walk the provider chain in priority order. A temporary error earns
    /// exactly one same-provider retry; permanent and unknown errors move
    /// straight to the next provider.
    async fn call_provider_chain(&self, text: &str) -> anyhow::Result<(Completion, String)> {
        let request = CompletionRequest::new(build_prompt(text));
        let mut last_error: Option<llm_client::ProviderError> = None;

        for provider in &self.providers {
            let name = provider.provider_name().to_string();
            match provider.complete(&request).await {
                Ok(completion) => return Ok((completion, name)),
                Err(err) if err.kind == ErrorKind::Temporary => {
                    warn!(provider = %name, error = %err, "Temporary provider error, retrying once");
                    match provider.complete(&request).await {
                        Ok(completion) => return Ok((completion, name)),
                        Err(retry_err) => {
                            warn!(provider = %name, error = %retry_err, "Retry failed, falling back");
                            last_error = Some(retry_err);
                        }
                    }
                }
                Err(err) => {
                    warn!(provider = %name, error = %err, "Provider failed, falling back");
                    last_error = Some(err);
                }
            }
        }

        Err(match last_error {
            Some(err) => anyhow::Error::new(err).context("provider chain exhausted"),
            None => anyhow!("no providers configured"),
        })
    }

    /// One record per member. Tokens and cost land only on the
    /// representative's record of a fresh generation; fan-out copies and
    /// cache hits carry zeros and `cached = true`.
    async fn write_records(
        &self,
        member_ids: &[String],
        rep_id: &str,
        entry: &CachedSummary,
        hash: &str,
        from_cache: bool,
        completion: Option<&Completion>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        for member in member_ids {
            let is_rep = member == rep_id;
            let (prompt_tokens, completion_tokens, cost_usd) = match completion {
                Some(c) if is_rep && !from_cache => (c.prompt_tokens, c.completion_tokens, c.cost_usd),
                _ => (0, 0, 0.0),
            };
            let record = SummaryRecord {
                id: Uuid::new_v4(),
                post_id: member.clone(),
                summary: entry.summary.clone(),
                translation: entry.translation.clone(),
                provider: entry.provider.clone(),
                model: entry.model.clone(),
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
                cost_usd,
                cached: from_cache || !is_rep,
                is_generated: entry.is_generated,
                content_hash: hash.to_string(),
                created_at: now,
                updated_at: now,
            };
            self.store.save_summary_record(&record).await?;
        }
        Ok(())
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "Summarize the following social media post in one or two sentences, \
         and translate the summary to English if the post is in another \
         language. Respond as JSON: {{\"summary\": \"...\", \"translation\": \
         \"...\"}} with translation null when the post is already English.\n\n\
         Post:\n{text}"
    )
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
    #[serde(default)]
    translation: Option<String>,
}

/// Decode the model's JSON payload; a model that ignored the format keeps
/// its whole response as the summary.
fn parse_summary_payload(raw: &str) -> (String, Option<String>) {
    let stripped = strip_code_blocks(raw);
    match serde_json::from_str::<SummaryPayload>(stripped) {
        Ok(payload) => (payload.summary, payload.translation),
        Err(_) => (stripped.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_parses_json_with_translation() {
        let (summary, translation) =
            parse_summary_payload("{\"summary\": \"s\", \"translation\": \"t\"}");
        assert_eq!(summary, "s");
        assert_eq!(translation.as_deref(), Some("t"));
    }

    #[test]
    fn payload_parses_fenced_json() {
        let (summary, translation) =
            parse_summary_payload("```json\n{\"summary\": \"s\"}\n```");
        assert_eq!(summary, "s");
        assert!(translation.is_none());
    }

    #[test]
    fn non_json_response_kept_whole() {
        let (summary, translation) = parse_summary_payload("A plain sentence.");
        assert_eq!(summary, "A plain sentence.");
        assert!(translation.is_none());
    }
}
