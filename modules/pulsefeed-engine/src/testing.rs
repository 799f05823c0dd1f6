//! Scripted fakes and fixtures for the engine test suites: no network, no
//! database, deterministic outcomes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use firefeed_client::error::{FetchError, Result as FetchResult};
use firefeed_client::FeedEnvelope;
use llm_client::{Completion, CompletionRequest, ErrorKind, LlmProvider, ProviderError};
use pulsefeed_common::Post;

use crate::traits::PostFetcher;

/// A post with a deterministic creation hour, for ordering-sensitive tests.
pub fn fixture_post(id: &str, text: &str, hour: u32) -> Post {
    Post {
        id: id.to_string(),
        text: text.to_string(),
        author_handle: "acct".to_string(),
        author_name: "Account".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
        reference: None,
        media: Vec::new(),
    }
}

/// Fetcher serving canned envelopes per account; unknown accounts get the
/// provider's 404.
#[derive(Default)]
pub struct StaticFetcher {
    envelopes: Mutex<HashMap<String, FeedEnvelope>>,
    calls: AtomicU32,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account: &str, envelope: FeedEnvelope) -> Self {
        self.envelopes
            .lock()
            .expect("fetcher lock poisoned")
            .insert(account.to_string(), envelope);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostFetcher for StaticFetcher {
    async fn fetch_posts(&self, account: &str, _limit: u32) -> FetchResult<FeedEnvelope> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.envelopes
            .lock()
            .expect("fetcher lock poisoned")
            .get(account)
            .cloned()
            .ok_or(FetchError::Api {
                status: 404,
                message: format!("unknown account {account}"),
            })
    }
}

enum Behavior {
    Succeed { text: String },
    Fail { kind: ErrorKind },
}

/// Provider with a fixed scripted behavior and a call counter.
pub struct MockProvider {
    name: String,
    behavior: Behavior,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn succeeding(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: Behavior::Succeed {
                text: text.to_string(),
            },
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing_with(name: &str, kind: ErrorKind) -> Self {
        Self {
            name: name.to_string(),
            behavior: Behavior::Fail { kind },
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed { text } => Ok(Completion {
                text: text.clone(),
                model: "mock-model".to_string(),
                prompt_tokens: 100,
                completion_tokens: 20,
                cost_usd: 0.001,
            }),
            Behavior::Fail { kind } => Err(ProviderError {
                provider: self.name.clone(),
                kind: *kind,
                status: None,
                message: "scripted failure".to_string(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
