use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::storage::KeyValueStorage;
use crate::{log_info, log_warn};

use super::notifier::{ChangeNotifier, Subscription};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "cache";

/// A record kept in a [`CacheStore`].
pub trait CachedRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
}

struct CacheState<R> {
    records: Vec<R>,
    initialized: bool,
}

/// Newest-first list of records mirrored to one storage key.
///
/// The key is read at most once per store instance. Every mutation rewrites
/// the whole list and then notifies subscribers. Storage faults are logged and
/// never surface to callers; the in-memory list stays authoritative.
pub struct CacheStore<R> {
    name: &'static str,
    key: String,
    storage: Arc<dyn KeyValueStorage>,
    state: Mutex<CacheState<R>>,
    notifier: ChangeNotifier,
}

impl<R: CachedRecord> CacheStore<R> {
    pub fn new(name: &'static str, key: impl Into<String>, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            name,
            key: key.into(),
            storage,
            state: Mutex::new(CacheState {
                records: Vec::new(),
                initialized: false,
            }),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn get_all(&self) -> Vec<R> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state);
        state.records.clone()
    }

    pub async fn get(&self, id: &str) -> Option<R> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state);
        state.records.iter().find(|record| record.id() == id).cloned()
    }

    /// Builds a record with the current list in view (for id generation) and
    /// puts it at the front.
    pub async fn add_with<F>(&self, build: F) -> R
    where
        F: FnOnce(&[R]) -> R,
    {
        let record = {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state);
            let record = build(&state.records);
            state.records.insert(0, record.clone());
            self.persist(&state.records);
            record
        };
        self.notifier.notify();
        record
    }

    /// Applies `apply` to the record with `id`. Returns `false` and leaves
    /// storage and subscribers untouched when no such record exists.
    pub async fn update_with<F>(&self, id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut R),
    {
        {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state);
            let Some(record) = state.records.iter_mut().find(|record| record.id() == id) else {
                return false;
            };
            apply(record);
            self.persist(&state.records);
        }
        self.notifier.notify();
        true
    }

    pub async fn delete(&self, id: &str) -> bool {
        {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state);
            let before = state.records.len();
            state.records.retain(|record| record.id() != id);
            if state.records.len() == before {
                return false;
            }
            self.persist(&state.records);
        }
        self.notifier.notify();
        true
    }

    /// Runs a bulk edit. Persists and notifies only when `edit` reports a
    /// change.
    pub async fn modify_all<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut Vec<R>) -> bool,
    {
        {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state);
            if !edit(&mut state.records) {
                return false;
            }
            self.persist(&state.records);
        }
        self.notifier.notify();
        true
    }

    pub async fn replace_all(&self, records: Vec<R>) {
        {
            let mut state = self.state.lock().await;
            state.records = records;
            state.initialized = true;
            self.persist(&state.records);
        }
        self.notifier.notify();
    }

    /// Drops every record. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let removed = {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state);
            let removed = state.records.len();
            state.records.clear();
            if let Err(err) = self.storage.remove_item(&self.key) {
                log_warn!("{} clear failed: {err:#}", self.name);
            }
            removed
        };
        self.notifier.notify();
        removed
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    fn ensure_loaded(&self, state: &mut CacheState<R>) {
        if state.initialized {
            return;
        }
        state.records = self.read_persisted();
        state.initialized = true;
        log_info!("{} loaded {} record(s)", self.name, state.records.len());
    }

    fn read_persisted(&self) -> Vec<R> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                log_warn!("{} read failed, starting empty: {err:#}", self.name);
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            log_warn!("{} blob is corrupt, starting empty: {err}", self.name);
            Vec::new()
        })
    }

    fn persist(&self, records: &[R]) {
        let serialized = match serde_json::to_string(records) {
            Ok(serialized) => serialized,
            Err(err) => {
                log_warn!("{} serialize failed: {err}", self.name);
                return;
            }
        };
        if let Err(err) = self.storage.set_item(&self.key, &serialized) {
            log_warn!("{} write failed: {err:#}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl CachedRecord for Note {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str) -> Note {
        Note {
            id: id.into(),
            body: format!("body {id}"),
        }
    }

    fn store(storage: &Arc<MemoryStorage>) -> CacheStore<Note> {
        CacheStore::new("notes", "notes_key", storage.clone() as Arc<dyn KeyValueStorage>)
    }

    #[tokio::test]
    async fn newest_record_comes_first() {
        let storage = Arc::new(MemoryStorage::new());
        let notes = store(&storage);

        notes.add_with(|_| note("a")).await;
        notes.add_with(|_| note("b")).await;

        let ids: Vec<String> = notes.get_all().await.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[tokio::test]
    async fn storage_is_read_only_once() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item("notes_key", &serde_json::to_string(&[note("x")]).unwrap())
            .unwrap();
        let notes = store(&storage);

        assert_eq!(notes.get_all().await.len(), 1);
        storage.set_item("notes_key", "[]").unwrap();
        assert_eq!(notes.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn failing_read_yields_empty_list() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_fail_reads(true);
        assert!(store(&storage).get_all().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_blob_yields_empty_list() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("notes_key", "{{{").unwrap();
        assert!(store(&storage).get_all().await.is_empty());
    }

    #[tokio::test]
    async fn failing_write_keeps_memory_and_still_notifies() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_fail_writes(true);
        let notes = store(&storage);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let _sub = notes.subscribe(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        notes.add_with(|_| note("a")).await;

        assert_eq!(notes.get_all().await, vec![note("a")]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(storage.raw("notes_key"), None);
    }

    #[tokio::test]
    async fn persisted_before_subscribers_hear_about_it() {
        let storage = Arc::new(MemoryStorage::new());
        let notes = store(&storage);
        let observed = Arc::new(std::sync::Mutex::new(None));
        let probe = storage.clone();
        let sink = observed.clone();
        let _sub = notes.subscribe(move || {
            *sink.lock().unwrap() = probe.raw("notes_key");
        });

        notes.add_with(|_| note("a")).await;

        let blob = observed.lock().unwrap().clone().expect("listener saw a blob");
        let persisted: Vec<Note> = serde_json::from_str(&blob).unwrap();
        assert_eq!(persisted, vec![note("a")]);
    }

    #[tokio::test]
    async fn missing_ids_are_reported_without_notifying() {
        let storage = Arc::new(MemoryStorage::new());
        let notes = store(&storage);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let _sub = notes.subscribe(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!notes.update_with("ghost", |n| n.body.clear()).await);
        assert!(!notes.delete("ghost").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_instance_sees_what_the_last_one_wrote() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let notes = store(&storage);
            notes.add_with(|_| note("a")).await;
            notes.update_with("a", |n| n.body = "edited".into()).await;
        }

        let reopened = store(&storage);
        assert_eq!(reopened.get("a").await.unwrap().body, "edited");
    }
}
