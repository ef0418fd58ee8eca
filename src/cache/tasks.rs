use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStorage, TASKS_KEY_PREFIX};
use crate::utils::Clock;

use super::notifier::Subscription;
use super::store::{CacheStore, CachedRecord};

pub const DEFAULT_USER_KEY: &str = "local";
pub const DEFAULT_TASK_TITLE: &str = "Yeni Görev";
pub const DEFAULT_CATEGORY: &str = "Genel";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: i64,
}

impl CachedRecord for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Fields a caller may supply when creating a task; everything else is
/// defaulted.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Partial update. `date`/`time` use a nested option so they can be cleared.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub date: Option<Option<String>>,
    pub time: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            let title = title.trim();
            // A blank title would break the non-empty invariant; keep the old one.
            if !title.is_empty() {
                task.title = title.to_string();
            }
        }
        if let Some(desc) = self.desc {
            task.desc = desc;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(time) = self.time {
            task.time = time;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Millisecond timestamp followed by five random base-36 characters.
fn generate_task_id(now_ms: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|c| (c as char).to_ascii_lowercase())
        .take(5)
        .collect();
    format!("{now_ms}{suffix}")
}

/// The device-local task list for one user key.
pub struct TaskStore {
    inner: CacheStore<Task>,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self::for_user(storage, clock, DEFAULT_USER_KEY)
    }

    pub fn for_user(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>, user_key: &str) -> Self {
        Self {
            inner: CacheStore::new("tasks", format!("{TASKS_KEY_PREFIX}{user_key}"), storage),
            clock,
        }
    }

    pub async fn get_all(&self) -> Vec<Task> {
        self.inner.get_all().await
    }

    pub async fn add(&self, payload: NewTask) -> Task {
        let now_ms = self.clock.now_ms();
        self.inner
            .add_with(|existing| {
                let mut id = generate_task_id(now_ms);
                while existing.iter().any(|task| task.id == id) {
                    id = generate_task_id(now_ms);
                }
                Task {
                    id,
                    title: payload
                        .title
                        .as_deref()
                        .map(str::trim)
                        .filter(|title| !title.is_empty())
                        .unwrap_or(DEFAULT_TASK_TITLE)
                        .to_string(),
                    desc: payload.desc.unwrap_or_default(),
                    category: non_blank(payload.category)
                        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                    priority: payload.priority.unwrap_or_default(),
                    date: non_blank(payload.date),
                    time: non_blank(payload.time),
                    status: TaskStatus::Active,
                    created_at: now_ms,
                }
            })
            .await
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> bool {
        self.inner.update_with(id, |task| patch.apply(task)).await
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.inner.delete(id).await
    }

    pub async fn seed_demo(&self) {
        let now_ms = self.clock.now_ms();
        let demo = [
            ("Sabah planını yap", "Planlama", Priority::High),
            ("25 dakika kitap oku", "Kişisel", Priority::Medium),
            ("E-postaları temizle", DEFAULT_CATEGORY, Priority::Low),
        ];
        let tasks = demo
            .into_iter()
            .enumerate()
            .map(|(idx, (title, category, priority))| Task {
                id: format!("demo{}", idx + 1),
                title: title.to_string(),
                desc: String::new(),
                category: category.to_string(),
                priority,
                date: None,
                time: None,
                status: TaskStatus::Active,
                created_at: now_ms - idx as i64,
            })
            .collect();
        self.inner.replace_all(tasks).await;
    }

    /// Best-effort wipe used by the dev reset.
    pub async fn clear(&self) -> usize {
        self.inner.clear().await
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::utils::ManualClock;
    use chrono::DateTime;
    use std::collections::HashSet;

    fn task_store() -> (Arc<MemoryStorage>, TaskStore) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()));
        let store = TaskStore::new(storage.clone(), clock);
        (storage, store)
    }

    #[tokio::test]
    async fn add_fills_in_defaults() {
        let (_, store) = task_store();
        let task = store
            .add(NewTask {
                title: Some("   ".into()),
                category: Some(String::new()),
                ..NewTask::default()
            })
            .await;

        assert_eq!(task.title, DEFAULT_TASK_TITLE);
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.date, None);
        assert_eq!(task.created_at, 1_700_000_000_000);
        assert!(task.id.starts_with("1700000000000"));
        assert_eq!(task.id.len(), "1700000000000".len() + 5);
    }

    #[tokio::test]
    async fn title_is_trimmed() {
        let (_, store) = task_store();
        let task = store.add(NewTask::titled("  Rapor yaz  ")).await;
        assert_eq!(task.title, "Rapor yaz");
    }

    #[tokio::test]
    async fn ids_stay_unique_within_one_millisecond() {
        let (_, store) = task_store();
        for _ in 0..50 {
            store.add(NewTask::default()).await;
        }
        let ids: HashSet<String> = store.get_all().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn update_applies_patch_and_reports_missing_ids() {
        let (_, store) = task_store();
        let task = store.add(NewTask::titled("Oku")).await;

        let changed = store
            .update(
                &task.id,
                TaskPatch {
                    title: Some("  ".into()),
                    date: Some(Some("2024-05-01".into())),
                    status: Some(TaskStatus::Completed),
                    ..TaskPatch::default()
                },
            )
            .await;
        assert!(changed);

        let stored = &store.get_all().await[0];
        assert_eq!(stored.title, "Oku");
        assert_eq!(stored.date.as_deref(), Some("2024-05-01"));
        assert_eq!(stored.status, TaskStatus::Completed);

        assert!(!store.update("missing", TaskPatch::status(TaskStatus::Active)).await);
    }

    #[tokio::test]
    async fn blob_uses_per_user_key() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(0, 0).unwrap()));
        let store = TaskStore::for_user(storage.clone(), clock, "u42");
        store.add(NewTask::titled("x")).await;

        assert!(storage.raw("odaki_tasks_v1_u42").is_some());
        assert!(storage.raw("odaki_tasks_v1_local").is_none());
    }

    #[tokio::test]
    async fn legacy_records_without_optional_fields_still_load() {
        let (storage, _) = task_store();
        storage
            .set_item(
                "odaki_tasks_v1_local",
                r#"[{"id":"1","title":"Eski","createdAt":5}]"#,
            )
            .unwrap();
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(0, 0).unwrap()));
        let store = TaskStore::new(storage, clock);

        let tasks = store.get_all().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert_eq!(tasks[0].status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn clear_empties_the_list() {
        let (_, store) = task_store();
        store.seed_demo().await;
        assert_eq!(store.clear().await, 3);
        assert!(store.get_all().await.is_empty());
    }
}
