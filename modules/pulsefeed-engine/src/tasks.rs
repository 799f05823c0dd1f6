//! Process-wide task registry. Constructed once at startup and handed to
//! every orchestrator; nothing here is persisted, and terminal tasks are
//! swept after a TTL so the map stays bounded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use pulsefeed_common::{Clock, Task, TaskProgress, TaskStatus};

pub struct TaskRegistry {
    tasks: Mutex<HashMap<Uuid, Task>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl TaskRegistry {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    pub fn create(&self, name: &str, metadata: HashMap<String, String>) -> Uuid {
        let id = Uuid::new_v4();
        let task = Task {
            id,
            name: name.to_string(),
            status: TaskStatus::Pending,
            created_at: self.clock.now(),
            started_at: None,
            completed_at: None,
            progress: None,
            result: None,
            error: None,
            metadata,
        };
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        sweep(&mut tasks, self.clock.now(), self.ttl);
        tasks.insert(id, task);
        id
    }

    pub fn mark_running(&self, id: Uuid) {
        self.update(id, |task, now| {
            task.status = TaskStatus::Running;
            task.started_at = Some(now);
        });
    }

    pub fn update_progress(&self, id: Uuid, current: u64, total: u64) {
        self.update(id, |task, _| {
            task.progress = Some(TaskProgress::new(current, total));
        });
    }

    pub fn complete(&self, id: Uuid, result: serde_json::Value) {
        self.update(id, |task, now| {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
            task.result = Some(result);
        });
    }

    pub fn fail(&self, id: Uuid, error: String) {
        self.update(id, |task, now| {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(now);
            task.error = Some(error);
        });
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn list(&self, status: Option<TaskStatus>) -> Vec<Task> {
        let tasks = self.tasks.lock().expect("task registry lock poisoned");
        let mut out: Vec<Task> = tasks
            .values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        out.sort_by_key(|t| t.created_at);
        out
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut Task, chrono::DateTime<chrono::Utc>)) {
        let now = self.clock.now();
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        if let Some(task) = tasks.get_mut(&id) {
            apply(task, now);
        }
        sweep(&mut tasks, now, self.ttl);
    }
}

/// Drop terminal tasks whose completion is older than the TTL.
fn sweep(tasks: &mut HashMap<Uuid, Task>, now: chrono::DateTime<chrono::Utc>, ttl: chrono::Duration) {
    tasks.retain(|_, task| {
        if !task.status.is_terminal() {
            return true;
        }
        match task.completed_at {
            Some(done) => now - done <= ttl,
            None => true,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulsefeed_common::clock::ManualClock;

    fn registry(clock: Arc<ManualClock>) -> TaskRegistry {
        TaskRegistry::new(Duration::from_secs(3600), clock)
    }

    #[test]
    fn lifecycle_pending_running_completed() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let reg = registry(clock.clone());

        let id = reg.create("scrape_accounts", HashMap::new());
        assert_eq!(reg.get(id).unwrap().status, TaskStatus::Pending);

        reg.mark_running(id);
        let task = reg.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.started_at.is_some());

        reg.complete(id, serde_json::json!({"posts_new": 3}));
        let task = reg.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.unwrap()["posts_new"], 3);
    }

    #[test]
    fn progress_updates_are_recorded() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let reg = registry(clock);

        let id = reg.create("summarize", HashMap::new());
        reg.mark_running(id);
        reg.update_progress(id, 3, 12);

        let progress = reg.get(id).unwrap().progress.unwrap();
        assert_eq!(progress.current, 3);
        assert_eq!(progress.total, 12);
        assert!((progress.percentage - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failure_records_error() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let reg = registry(clock);

        let id = reg.create("dedupe", HashMap::new());
        reg.fail(id, "store unreachable".to_string());
        let task = reg.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("store unreachable"));
    }

    #[test]
    fn list_filters_by_status() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let reg = registry(clock);

        let a = reg.create("a", HashMap::new());
        let _b = reg.create("b", HashMap::new());
        reg.mark_running(a);

        assert_eq!(reg.list(Some(TaskStatus::Running)).len(), 1);
        assert_eq!(reg.list(Some(TaskStatus::Pending)).len(), 1);
        assert_eq!(reg.list(None).len(), 2);
    }

    #[test]
    fn terminal_tasks_swept_after_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let reg = registry(clock.clone());

        let done = reg.create("done", HashMap::new());
        reg.complete(done, serde_json::Value::Null);
        let running = reg.create("running", HashMap::new());
        reg.mark_running(running);

        clock.advance(chrono::Duration::hours(2));
        // Any mutation triggers the sweep.
        let _ = reg.create("fresh", HashMap::new());

        assert!(reg.get(done).is_none(), "terminal task should be swept");
        assert!(reg.get(running).is_some(), "running task survives TTL");
    }
}
