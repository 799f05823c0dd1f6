//! Ingestion and deduplication driven end-to-end against the in-memory
//! store and a scripted fetcher.

use std::sync::Arc;
use std::time::Duration;

use firefeed_client::RawFeedResponse;
use pulsefeed_common::{Settings, SystemClock, TaskStatus};
use pulsefeed_engine::testing::StaticFetcher;
use pulsefeed_engine::{jobs, Deduplicator, Ingestor, Job, JobQueue, TaskRegistry};
use pulsefeed_store::{MemoryStore, PostRepository};

fn envelope(json: &str) -> firefeed_client::FeedEnvelope {
    serde_json::from_str::<RawFeedResponse>(json)
        .unwrap()
        .into_envelope()
}

fn registry() -> Arc<TaskRegistry> {
    Arc::new(TaskRegistry::new(
        Duration::from_secs(3600),
        Arc::new(SystemClock),
    ))
}

fn good_account_envelope() -> firefeed_client::FeedEnvelope {
    envelope(
        r#"{
            "data": {
                "posts": [
                    {"id": "p1", "text": "fresh news about the launch", "authorId": "u1",
                     "createdAt": "2026-03-01T12:00:00Z"},
                    {"id": "p2", "text": "", "authorId": "u1",
                     "createdAt": "2026-03-01T11:00:00Z"},
                    {"id": "p3", "text": "an older update", "authorId": "u1",
                     "createdAt": "2026-03-01T10:00:00Z"}
                ],
                "users": [{"id": "u1", "username": "alice", "displayName": "Alice"}]
            }
        }"#,
    )
}

#[tokio::test]
async fn ingests_accounts_and_isolates_failures() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new().with_account("good", good_account_envelope()));
    let ingestor = Ingestor::new(
        fetcher,
        Arc::new(PostRepository::new(store.clone())),
        registry(),
        Settings::default(),
    );

    let stats = ingestor
        .run(&["good".to_string(), "unknown".to_string()], 10)
        .await;

    assert_eq!(stats.accounts_total, 2);
    assert_eq!(stats.accounts_succeeded, 1);
    assert_eq!(stats.accounts_failed, 1);
    assert_eq!(stats.posts_fetched, 3);
    // p2 has empty text and is dropped by validation.
    assert_eq!(stats.posts_invalid, 1);
    assert_eq!(stats.posts_new, 2);
    assert_eq!(store.post_count(), 2);
}

#[tokio::test]
async fn second_run_skips_known_posts() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new().with_account("good", good_account_envelope()));
    let ingestor = Ingestor::new(
        fetcher,
        Arc::new(PostRepository::new(store.clone())),
        registry(),
        Settings::default(),
    );

    ingestor.run(&["good".to_string()], 10).await;
    let stats = ingestor.run(&["good".to_string()], 10).await;

    assert_eq!(stats.posts_new, 0);
    assert_eq!(stats.posts_skipped, 2);
}

#[tokio::test]
async fn start_reports_through_task_registry() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new().with_account("good", good_account_envelope()));
    let registry = registry();
    let ingestor = Arc::new(Ingestor::new(
        fetcher,
        Arc::new(PostRepository::new(store.clone())),
        registry.clone(),
        Settings::default(),
    ));

    let task_id = ingestor.start(vec!["good".to_string()], 10);

    let mut task = registry.get(task_id).expect("task registered");
    for _ in 0..100 {
        if task.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        task = registry.get(task_id).expect("task registered");
    }

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.expect("stats recorded on task");
    assert_eq!(result["posts_new"], 2);
    assert_eq!(task.metadata["accounts"], "1");
}

#[tokio::test]
async fn ingestion_enqueues_dedup_which_groups_duplicates() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new().with_account(
        "acct",
        envelope(
            r#"{
                "posts": [
                    {"id": "a", "text": "identical content", "authorId": "u1",
                     "createdAt": "2026-03-01T12:00:00Z"},
                    {"id": "b", "text": "identical content", "authorId": "u1",
                     "createdAt": "2026-03-01T11:00:00Z"},
                    {"id": "c", "text": "something unrelated entirely", "authorId": "u1",
                     "createdAt": "2026-03-01T10:00:00Z"}
                ],
                "users": [{"id": "u1", "username": "alice"}]
            }"#,
        ),
    ));

    let registry = registry();
    let deduplicator = Arc::new(Deduplicator::new(
        store.clone(),
        registry.clone(),
        Settings::default(),
    ));

    let (queue, rx) = JobQueue::bounded(8);
    let worker = jobs::spawn_worker(rx, deduplicator, None);

    let ingestor = Ingestor::new(
        fetcher,
        Arc::new(PostRepository::new(store.clone())),
        registry,
        Settings::default(),
    )
    .with_job_queue(queue.clone());

    let stats = ingestor.run(&["acct".to_string()], 10).await;
    assert_eq!(stats.posts_new, 3);

    // Drop every producer so the worker drains and exits.
    drop(ingestor);
    drop(queue);
    worker.await.unwrap();

    assert_eq!(store.group_count(), 1);
    let group = store.groups().pop().unwrap();
    // Representative is the earliest-created member.
    assert_eq!(group.representative_id, "b");
    assert_eq!(group.member_ids.len(), 2);
}

#[tokio::test]
async fn deduplication_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    for (id, text, hour) in [
        ("a", "repeated body", 1),
        ("b", "repeated body", 2),
        ("c", "lone wolf message", 3),
    ] {
        store.seed_post(pulsefeed_engine::testing::fixture_post(id, text, hour));
    }
    let deduplicator = Deduplicator::new(store.clone(), registry(), Settings::default());

    let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

    let first = deduplicator.deduplicate(&ids).await.unwrap();
    assert_eq!(first.stats.exact_groups, 1);
    assert_eq!(first.stats.affected, 1);
    // considered − affected + groups
    assert_eq!(first.stats.preserved, 3);
    assert_eq!(first.representatives, vec!["a"]);

    let second = deduplicator.deduplicate(&ids).await.unwrap();
    assert_eq!(second.stats.exact_groups, 0);
    assert_eq!(second.stats.similarity_groups, 0);
    assert!(second.representatives.is_empty());
    assert_eq!(store.group_count(), 1);
}

#[tokio::test]
async fn similarity_disabled_reports_no_groups() {
    let store = Arc::new(MemoryStore::new());
    store.seed_post(pulsefeed_engine::testing::fixture_post(
        "a",
        "quarterly results exceeded expectations https://a.co",
        1,
    ));
    store.seed_post(pulsefeed_engine::testing::fixture_post(
        "b",
        "quarterly results exceeded expectations https://b.co",
        2,
    ));

    let settings = Settings {
        similarity_enabled: false,
        ..Settings::default()
    };
    let deduplicator = Deduplicator::new(store.clone(), registry(), settings);

    let outcome = deduplicator
        .deduplicate(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(outcome.stats.similarity_groups, 0);
    assert_eq!(store.group_count(), 0);
}

#[tokio::test]
async fn direct_summarize_job_without_summarizer_is_dropped() {
    let store = Arc::new(MemoryStore::new());
    let deduplicator = Arc::new(Deduplicator::new(
        store.clone(),
        registry(),
        Settings::default(),
    ));

    let (queue, rx) = JobQueue::bounded(8);
    let worker = jobs::spawn_worker(rx, deduplicator, None);
    queue
        .enqueue(Job::Summarize {
            post_ids: vec!["a".to_string()],
        })
        .await
        .unwrap();
    drop(queue);
    worker.await.unwrap();

    assert!(store.summaries().is_empty());
}
