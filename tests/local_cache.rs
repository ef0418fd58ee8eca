use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use odaki_lib::{
    cache::{AchievementStore, NewTask, OnboardingStore, Priority, TaskPatch, TaskStatus, TaskStore},
    storage::{FileStorage, KeyValueStorage, MemoryStorage, ONBOARDING_KEY},
    utils::SystemClock,
};
use tempfile::tempdir;

fn file_storage(dir: &std::path::Path) -> Arc<dyn KeyValueStorage> {
    Arc::new(FileStorage::new(dir.to_path_buf()).unwrap())
}

#[tokio::test]
async fn tasks_survive_a_restart() {
    let dir = tempdir().unwrap();
    let first = TaskStore::new(file_storage(dir.path()), Arc::new(SystemClock));
    let added = first
        .add(NewTask {
            title: Some("  Sunum hazırla ".into()),
            priority: Some(Priority::High),
            date: Some("2024-06-01".into()),
            ..NewTask::default()
        })
        .await;
    assert_eq!(added.title, "Sunum hazırla");

    let reopened = TaskStore::new(file_storage(dir.path()), Arc::new(SystemClock));
    assert_eq!(reopened.get_all().await, vec![added]);
}

#[tokio::test]
async fn newest_first_with_distinct_ids() {
    let store = TaskStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
    let a = store.add(NewTask::titled("A")).await;
    let b = store.add(NewTask::titled("B")).await;
    assert_eq!(store.get_all().await[..2], [b, a]);

    for i in 0..50 {
        store.add(NewTask::titled(format!("t{i}"))).await;
    }
    let ids: HashSet<String> = store.get_all().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids.len(), 52);
}

#[tokio::test]
async fn unreadable_storage_reads_as_empty() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_fail_reads(true);
    let store = TaskStore::new(storage.clone(), Arc::new(SystemClock));
    assert!(store.get_all().await.is_empty());

    storage.set_fail_writes(true);
    let task = store.add(NewTask::titled("yine de")).await;
    assert_eq!(store.get_all().await, vec![task]);
}

#[tokio::test]
async fn panicking_subscriber_does_not_starve_the_others() {
    let store = TaskStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
    let calls = Arc::new(AtomicUsize::new(0));

    let _bad = store.subscribe(|| panic!("listener bug"));
    let counter = calls.clone();
    let good = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let task = store.add(NewTask::titled("x")).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    good.unsubscribe();
    store.update(&task.id, TaskPatch::status(TaskStatus::Completed)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_all().await[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn remaining_subscribers_still_hear_changes() {
    let store = TaskStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));

    let counter = a_calls.clone();
    let a = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = b_calls.clone();
    let _b = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let task = store.add(NewTask::titled("ilk")).await;
    a.unsubscribe();
    store.update(&task.id, TaskPatch::status(TaskStatus::Completed)).await;
    store.delete(&task.id).await;

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_ids_change_nothing() {
    let store = TaskStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let _sub = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!store.update("nope", TaskPatch::status(TaskStatus::Completed)).await);
    assert!(!store.delete("nope").await);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn achievements_unlock_once() {
    let store = AchievementStore::new(Arc::new(MemoryStorage::new()));
    store.seed_demo().await;
    let locked = store
        .get_all()
        .await
        .into_iter()
        .find(|a| a.locked)
        .unwrap();

    assert!(store.unlock(&locked.id).await);
    assert!(!store.unlock(&locked.id).await);
    store.unlock_all().await;
    assert!(!store.unlock_all().await);
    assert_eq!(store.percent_unlocked().await, 100);
}

#[tokio::test]
async fn onboarding_flag_round_trips() {
    let storage = Arc::new(MemoryStorage::new());
    let store = OnboardingStore::new(storage.clone());
    assert!(store.state().loading);

    store.init().await;
    assert!(!store.state().loading);
    assert!(!store.state().done);

    store.set_done(true).await;
    assert_eq!(storage.raw(ONBOARDING_KEY).as_deref(), Some("true"));

    let reloaded = OnboardingStore::new(storage);
    reloaded.init().await;
    assert!(reloaded.state().done);
}
