//! In-memory store for tests: mutex'd maps plus instrumentation counters so
//! suites can assert how the pipeline actually touched persistence.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use pulsefeed_common::{DuplicateGroup, Post, SummaryRecord};

use crate::traits::{PostStore, StoreError};

#[derive(Default)]
struct Inner {
    posts: HashMap<String, Post>,
    group_of: HashMap<String, Uuid>,
    groups: HashMap<Uuid, DuplicateGroup>,
    summaries: Vec<SummaryRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    existence_checks: AtomicUsize,
    fail_saves: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a post directly, bypassing instrumentation.
    pub fn seed_post(&self, post: Post) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.posts.insert(post.id.clone(), post);
    }

    /// Make `save_post` fail for this id, to exercise per-item error counting.
    pub fn fail_save_of(&self, id: &str) {
        self.fail_saves
            .lock()
            .expect("store lock poisoned")
            .insert(id.to_string());
    }

    /// Number of single-id existence checks issued so far.
    pub fn existence_checks(&self) -> usize {
        self.existence_checks.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").posts.len()
    }

    pub fn group_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").groups.len()
    }

    pub fn summaries(&self) -> Vec<SummaryRecord> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .summaries
            .clone()
    }

    pub fn groups(&self) -> Vec<DuplicateGroup> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .groups
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn post_exists(&self, id: &str) -> Result<bool, StoreError> {
        self.existence_checks.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.posts.contains_key(id))
    }

    async fn batch_post_exists(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(ids
            .iter()
            .filter(|id| inner.posts.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn save_post(&self, post: &Post) -> Result<(), StoreError> {
        if self
            .fail_saves
            .lock()
            .expect("store lock poisoned")
            .contains(&post.id)
        {
            return Err(StoreError::Database(format!(
                "scripted failure for {}",
                post.id
            )));
        }
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn post_by_id(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.posts.get(id).cloned())
    }

    async fn posts_by_ids(&self, ids: &[String]) -> Result<Vec<Post>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(ids.iter().filter_map(|id| inner.posts.get(id).cloned()).collect())
    }

    async fn save_duplicate_group(&self, group: &DuplicateGroup) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        for member in &group.member_ids {
            inner.group_of.insert(member.clone(), group.id);
        }
        inner.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find_group_by_post(
        &self,
        post_id: &str,
    ) -> Result<Option<DuplicateGroup>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .group_of
            .get(post_id)
            .and_then(|gid| inner.groups.get(gid))
            .cloned())
    }

    async fn save_summary_record(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.summaries.push(record.clone());
        Ok(())
    }

    async fn find_summary_by_content_hash(
        &self,
        hash: &str,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .summaries
            .iter()
            .rev()
            .find(|s| s.content_hash == hash)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            text: format!("text of {id}"),
            author_handle: "acct".to_string(),
            author_name: "Account".to_string(),
            created_at: Utc::now(),
            reference: None,
            media: Vec::new(),
        }
    }

    #[tokio::test]
    async fn batch_exists_is_order_independent() {
        let store = MemoryStore::new();
        store.seed_post(post("a"));
        store.seed_post(post("c"));

        let forward = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let backward = vec!["c".to_string(), "b".to_string(), "a".to_string()];

        let one = store.batch_post_exists(&forward).await.unwrap();
        let two = store.batch_post_exists(&backward).await.unwrap();
        assert_eq!(one, two);
        assert_eq!(one.len(), 2);
    }

    #[tokio::test]
    async fn scripted_save_failure() {
        let store = MemoryStore::new();
        store.fail_save_of("bad");
        assert!(store.save_post(&post("bad")).await.is_err());
        assert!(store.save_post(&post("good")).await.is_ok());
        assert_eq!(store.post_count(), 1);
    }
}
