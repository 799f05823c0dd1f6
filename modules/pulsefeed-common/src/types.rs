use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on post text length after cleaning.
pub const MAX_POST_TEXT_CHARS: usize = 25_000;

// --- Posts ---

/// A normalized short-form post from the upstream provider. Platform-specific
/// wire shapes are converted into this before anything else touches them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Provider-assigned identifier, globally unique.
    pub id: String,
    pub text: String,
    pub author_handle: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    /// Set when this post reshares, quotes, or replies to another post.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<PostRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<Media>,
}

/// Reference to another post, with optional enrichment pulled from the
/// provider includes. Only the highest-priority reference survives parsing
/// (reshare > quote > reply).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRef {
    pub target_id: String,
    pub kind: RefKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Reshared,
    Quoted,
    Reply,
}

/// Media attached to a post. Owned by exactly one post (or one reference
/// payload); no independent lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

// --- Duplicate groups ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKind {
    Exact,
    Similar,
}

/// A set of posts judged to carry the same content. The representative is
/// the earliest-created member and carries the canonical summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: Uuid,
    pub representative_id: String,
    pub kind: DedupKind,
    /// Present only for `Similar` groups, in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Non-empty; always includes the representative.
    pub member_ids: Vec<String>,
}

// --- Summary records ---

/// One enrichment result row. Every member of a group gets its own record
/// sharing the representative's content hash; tokens and cost are counted
/// only on the representative's row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: Uuid,
    pub post_id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
    pub cached: bool,
    /// False when the text was too short to summarize and the original text
    /// was returned verbatim.
    pub is_generated: bool,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgress {
    pub current: u64,
    pub total: u64,
    pub percentage: f64,
}

impl TaskProgress {
    pub fn new(current: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            current as f64 / total as f64 * 100.0
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// Ephemeral, process-lifetime record of one orchestrator run. Never
/// persisted; swept from the registry after a TTL once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}
