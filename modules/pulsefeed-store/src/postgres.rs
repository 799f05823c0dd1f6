use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use pulsefeed_common::{DedupKind, DuplicateGroup, Post, SummaryRecord};

use crate::traits::{PostStore, StoreError};

/// Postgres-backed store. Each trait method runs in a single transaction
/// scope (implicit for single statements, explicit where a group write
/// touches two tables).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Idempotent schema setup.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                 id            TEXT PRIMARY KEY,
                 author_handle TEXT NOT NULL,
                 created_at    TIMESTAMPTZ NOT NULL,
                 group_id      UUID,
                 payload       JSONB NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS duplicate_groups (
                 id                UUID PRIMARY KEY,
                 representative_id TEXT NOT NULL,
                 kind              TEXT NOT NULL,
                 similarity        DOUBLE PRECISION,
                 member_ids        TEXT[] NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS summary_records (
                 id                UUID PRIMARY KEY,
                 post_id           TEXT NOT NULL,
                 summary           TEXT NOT NULL,
                 translation       TEXT,
                 provider          TEXT NOT NULL,
                 model             TEXT NOT NULL,
                 prompt_tokens     INTEGER NOT NULL,
                 completion_tokens INTEGER NOT NULL,
                 total_tokens      INTEGER NOT NULL,
                 cost_usd          DOUBLE PRECISION NOT NULL,
                 cached            BOOLEAN NOT NULL,
                 is_generated      BOOLEAN NOT NULL,
                 content_hash      TEXT NOT NULL,
                 created_at        TIMESTAMPTZ NOT NULL,
                 updated_at        TIMESTAMPTZ NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_summary_records_content_hash
             ON summary_records (content_hash, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_group(
    id: Uuid,
    representative_id: String,
    kind: String,
    similarity: Option<f64>,
    member_ids: Vec<String>,
) -> DuplicateGroup {
    let kind = match kind.as_str() {
        "similar" => DedupKind::Similar,
        _ => DedupKind::Exact,
    };
    DuplicateGroup {
        id,
        representative_id,
        kind,
        similarity,
        member_ids,
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn post_exists(&self, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn batch_post_exists(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query("SELECT id FROM posts WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("id")).collect())
    }

    async fn save_post(&self, post: &Post) -> Result<(), StoreError> {
        let payload = serde_json::to_value(post)?;
        sqlx::query(
            "INSERT INTO posts (id, author_handle, created_at, payload)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&post.id)
        .bind(&post.author_handle)
        .bind(post.created_at)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn post_by_id(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query("SELECT payload FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let payload: serde_json::Value = row.get("payload");
                Ok(Some(serde_json::from_value(payload)?))
            }
            None => Ok(None),
        }
    }

    async fn posts_by_ids(&self, ids: &[String]) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query("SELECT payload FROM posts WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            posts.push(serde_json::from_value(payload)?);
        }
        Ok(posts)
    }

    async fn save_duplicate_group(&self, group: &DuplicateGroup) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let kind = match group.kind {
            DedupKind::Exact => "exact",
            DedupKind::Similar => "similar",
        };
        sqlx::query(
            "INSERT INTO duplicate_groups (id, representative_id, kind, similarity, member_ids)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(group.id)
        .bind(&group.representative_id)
        .bind(kind)
        .bind(group.similarity)
        .bind(&group.member_ids)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET group_id = $1 WHERE id = ANY($2)")
            .bind(group.id)
            .bind(&group.member_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_group_by_post(
        &self,
        post_id: &str,
    ) -> Result<Option<DuplicateGroup>, StoreError> {
        let row = sqlx::query(
            "SELECT g.id, g.representative_id, g.kind, g.similarity, g.member_ids
             FROM duplicate_groups g
             JOIN posts p ON p.group_id = g.id
             WHERE p.id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            row_to_group(
                r.get("id"),
                r.get("representative_id"),
                r.get("kind"),
                r.get("similarity"),
                r.get("member_ids"),
            )
        }))
    }

    async fn save_summary_record(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO summary_records
                 (id, post_id, summary, translation, provider, model,
                  prompt_tokens, completion_tokens, total_tokens, cost_usd,
                  cached, is_generated, content_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(record.id)
        .bind(&record.post_id)
        .bind(&record.summary)
        .bind(&record.translation)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.prompt_tokens as i32)
        .bind(record.completion_tokens as i32)
        .bind(record.total_tokens as i32)
        .bind(record.cost_usd)
        .bind(record.cached)
        .bind(record.is_generated)
        .bind(&record.content_hash)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_summary_by_content_hash(
        &self,
        hash: &str,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, post_id, summary, translation, provider, model,
                    prompt_tokens, completion_tokens, total_tokens, cost_usd,
                    cached, is_generated, content_hash, created_at, updated_at
             FROM summary_records
             WHERE content_hash = $1
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SummaryRecord {
            id: r.get("id"),
            post_id: r.get("post_id"),
            summary: r.get("summary"),
            translation: r.get("translation"),
            provider: r.get("provider"),
            model: r.get("model"),
            prompt_tokens: r.get::<i32, _>("prompt_tokens") as u32,
            completion_tokens: r.get::<i32, _>("completion_tokens") as u32,
            total_tokens: r.get::<i32, _>("total_tokens") as u32,
            cost_usd: r.get("cost_usd"),
            cached: r.get("cached"),
            is_generated: r.get("is_generated"),
            content_hash: r.get("content_hash"),
            created_at: r.get::<DateTime<Utc>, _>("created_at"),
            updated_at: r.get::<DateTime<Utc>, _>("updated_at"),
        }))
    }
}
