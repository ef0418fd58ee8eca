use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use odaki_lib::{
    db::{CompletionOutcome, Database, FlowerStage, SessionStatus},
    utils::ManualClock,
};

fn local(day: u32, hour: u32) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(2024, 6, day, hour, 0, 0)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

fn setup(start: DateTime<Utc>) -> (Database, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    let db = Database::in_memory(clock.clone()).unwrap();
    (db, clock)
}

async fn run_session(db: &Database, user: &str, minutes: u32) -> CompletionOutcome {
    let session = db.create_focus_session(user, minutes).await.unwrap();
    let stage = FlowerStage::for_minutes(minutes);
    db.complete_focus_session(&session.id, user, stage.label(), Some(stage.emoji()), minutes)
        .await
        .unwrap()
}

fn streak_of(outcome: CompletionOutcome) -> u32 {
    match outcome {
        CompletionOutcome::Applied(stats) => stats.streak,
        other => panic!("expected an applied completion, got {other:?}"),
    }
}

#[tokio::test]
async fn completing_twice_counts_once() {
    let (db, _) = setup(local(10, 10));
    db.ensure_user("u1", Some("a@b.c")).await.unwrap();
    let session = db.create_focus_session("u1", 25).await.unwrap();
    assert_eq!(session.status, SessionStatus::Running);

    let first = db
        .complete_focus_session(&session.id, "u1", "Filiz", Some("🌿"), 25)
        .await
        .unwrap();
    let second = db
        .complete_focus_session(&session.id, "u1", "Filiz", Some("🌿"), 25)
        .await
        .unwrap();

    assert!(first.was_applied());
    assert_eq!(second, CompletionOutcome::AlreadyFinished(SessionStatus::Completed));
    let stats = db.get_user_stats("u1").await;
    assert_eq!(stats.total_focus_minutes, 25);
    assert_eq!(stats.streak, 1);

    let stored = db.get_focus_session(&session.id).await.unwrap();
    assert_eq!(stored.stage_label.as_deref(), Some("Filiz"));
    assert_eq!(stored.stage_emoji.as_deref(), Some("🌿"));
    assert!(stored.ended_at.is_some());
}

#[tokio::test]
async fn streak_follows_the_local_calendar() {
    let (db, clock) = setup(local(10, 10));
    db.ensure_user("u1", None).await.unwrap();

    assert_eq!(streak_of(run_session(&db, "u1", 25).await), 1);

    clock.set(local(11, 9));
    assert_eq!(streak_of(run_session(&db, "u1", 25).await), 2);

    clock.set(local(11, 23));
    assert_eq!(streak_of(run_session(&db, "u1", 25).await), 2);

    clock.set(local(13, 8));
    assert_eq!(streak_of(run_session(&db, "u1", 25).await), 1);

    assert_eq!(db.get_user_stats("u1").await.total_focus_minutes, 100);
}

#[tokio::test]
async fn flowers_are_a_set() {
    let (db, _) = setup(local(10, 10));
    db.ensure_user("u1", None).await.unwrap();

    run_session(&db, "u1", 10).await;
    run_session(&db, "u1", 10).await;
    run_session(&db, "u1", 60).await;

    let user = db.get_user("u1").await.unwrap();
    assert_eq!(user.flowers_unlocked, vec!["Tohum", "Çiçek"]);
}

#[tokio::test]
async fn cancelled_sessions_earn_nothing() {
    let (db, _) = setup(local(10, 10));
    db.ensure_user("u1", None).await.unwrap();
    let session = db.create_focus_session("u1", 45).await.unwrap();

    assert!(db.cancel_focus_session(&session.id).await.unwrap());
    assert!(!db.cancel_focus_session(&session.id).await.unwrap());

    let late = db
        .complete_focus_session(&session.id, "u1", "Tomurcuk", None, 45)
        .await
        .unwrap();
    assert_eq!(late, CompletionOutcome::AlreadyFinished(SessionStatus::Cancelled));
    assert_eq!(db.get_user_stats("u1").await.total_focus_minutes, 0);
}

#[tokio::test]
async fn premium_flag_is_snapshotted_on_the_session() {
    let (db, _) = setup(local(10, 10));
    db.ensure_user("u1", None).await.unwrap();
    db.set_premium("u1", true).await.unwrap();

    let session = db.create_focus_session("u1", 120).await.unwrap();
    db.set_premium("u1", false).await.unwrap();

    assert!(db.get_focus_session(&session.id).await.unwrap().is_premium_at_time);
    assert!(!db.get_user_premium("u1").await);
}

#[tokio::test]
async fn recent_sessions_are_newest_first() {
    let (db, clock) = setup(local(10, 10));
    db.ensure_user("u1", None).await.unwrap();
    for hour in [11, 12, 13] {
        clock.set(local(10, hour));
        run_session(&db, "u1", 25).await;
    }
    run_session(&db, "u2", 25).await;

    let recent = db.list_recent_sessions("u1", 2).await;
    assert_eq!(recent.len(), 2);
    assert!(recent[0].ended_at > recent[1].ended_at);
    assert!(recent.iter().all(|s| s.user_id == "u1"));
}

#[tokio::test]
async fn completing_an_unknown_session_fails() {
    let (db, _) = setup(local(10, 10));
    assert!(db
        .complete_focus_session("missing", "u1", "Tohum", None, 5)
        .await
        .is_err());
}
