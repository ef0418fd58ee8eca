use std::{
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};

use crate::db::{CompletionOutcome, Database, FlowerStage, FocusSession, RemoteError};
use crate::{log_error, log_info};

use super::{TimerState, TimerStatus};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "timer";

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("a focus session is already running")]
    AlreadyRunning,
    #[error("focus duration must be at least one minute")]
    InvalidDuration,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone, Default)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining_ms: u64,
    /// Result of the most recent automatic completion.
    pub last_completion: Option<CompletionOutcome>,
    pub last_error: Option<String>,
}

struct TimerInner {
    state: Arc<Mutex<TimerState>>,
    db: Database,
    ticker: StdMutex<Option<JoinHandle<()>>>,
    snapshots: Arc<watch::Sender<TimerSnapshot>>,
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        let mut guard = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}

/// Countdown for one focus session at a time. Reaching zero completes the
/// remote session with the stage earned for the planned minutes.
#[derive(Clone)]
pub struct FocusTimer {
    inner: Arc<TimerInner>,
}

impl FocusTimer {
    pub fn new(db: Database) -> Self {
        let (snapshots, _) = watch::channel(TimerSnapshot::default());
        Self {
            inner: Arc::new(TimerInner {
                state: Arc::new(Mutex::new(TimerState::new())),
                db,
                ticker: StdMutex::new(None),
                snapshots: Arc::new(snapshots),
            }),
        }
    }

    pub async fn get_state(&self) -> TimerState {
        self.inner.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub async fn start(&self, user_id: &str, minutes: u32) -> Result<FocusSession, TimerError> {
        if minutes == 0 {
            return Err(TimerError::InvalidDuration);
        }
        if self.inner.state.lock().await.status == TimerStatus::Running {
            return Err(TimerError::AlreadyRunning);
        }

        let session = self.inner.db.create_focus_session(user_id, minutes).await?;

        {
            let mut state = self.inner.state.lock().await;
            if state.status == TimerStatus::Running {
                drop(state);
                // Lost a race with another start; do not leave the new session dangling.
                if let Err(err) = self.inner.db.cancel_focus_session(&session.id).await {
                    log_error!("failed to cancel duplicate session {}: {err}", session.id);
                }
                return Err(TimerError::AlreadyRunning);
            }
            state.begin_session(
                session.id.clone(),
                user_id.to_string(),
                minutes,
                session.is_premium_at_time,
                Instant::now(),
            );
            publish(&self.inner.snapshots, &state, None);
        }

        self.spawn_ticker();
        log_info!("started {minutes} min countdown for session {}", session.id);
        Ok(session)
    }

    /// Stops the countdown and cancels the remote session. Returns `false`
    /// when nothing was running.
    pub async fn cancel(&self) -> Result<bool, TimerError> {
        let session_id = {
            let mut state = self.inner.state.lock().await;
            if state.status != TimerStatus::Running {
                return Ok(false);
            }
            let session_id = state.session_id.clone();
            state.cancel();
            publish(&self.inner.snapshots, &state, None);
            session_id
        };

        self.cancel_ticker();

        let Some(session_id) = session_id else {
            return Ok(false);
        };
        let cancelled = self.inner.db.cancel_focus_session(&session_id).await?;
        log_info!("cancelled session {session_id}");
        Ok(cancelled)
    }

    fn spawn_ticker(&self) {
        let mut ticker_guard = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = Arc::clone(&self.inner.state);
        let db = self.inner.db.clone();
        let snapshots = Arc::clone(&self.inner.snapshots);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;

                let finished = {
                    let mut guard = state.lock().await;
                    if guard.status != TimerStatus::Running {
                        break;
                    }
                    if guard.remaining_ms() > 0 {
                        publish(&snapshots, &guard, None);
                        continue;
                    }
                    guard.finish();
                    guard.clone()
                };

                complete(&db, &snapshots, finished).await;
                break;
            }
        });

        *ticker_guard = Some(handle);
    }

    fn cancel_ticker(&self) {
        let handle = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

async fn complete(db: &Database, snapshots: &watch::Sender<TimerSnapshot>, state: TimerState) {
    let (Some(session_id), Some(user_id)) = (state.session_id.as_deref(), state.user_id.as_deref())
    else {
        return;
    };

    let stage = FlowerStage::for_minutes(state.minutes).for_plan(state.is_premium_at_time);
    let result = db
        .complete_focus_session(
            session_id,
            user_id,
            stage.label(),
            Some(stage.emoji()),
            state.minutes,
        )
        .await;

    match result {
        Ok(outcome) => {
            log_info!("session {session_id} finished with {}", stage.label());
            publish(snapshots, &state, Some(Ok(outcome)));
        }
        Err(err) => {
            log_error!("completing session {session_id} failed: {err}");
            publish(snapshots, &state, Some(Err(err.to_string())));
        }
    }
}

fn publish(
    snapshots: &watch::Sender<TimerSnapshot>,
    state: &TimerState,
    completion: Option<Result<CompletionOutcome, String>>,
) {
    snapshots.send_modify(|snapshot| {
        snapshot.state = state.clone();
        snapshot.remaining_ms = state.remaining_ms();
        match completion {
            Some(Ok(outcome)) => {
                snapshot.last_completion = Some(outcome);
                snapshot.last_error = None;
            }
            Some(Err(err)) => snapshot.last_error = Some(err),
            None => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SessionStatus;
    use crate::utils::SystemClock;

    fn timer() -> (FocusTimer, Database) {
        let db = Database::in_memory(Arc::new(SystemClock)).unwrap();
        (FocusTimer::new(db.clone()), db)
    }

    #[tokio::test]
    async fn rejects_zero_minutes_and_double_start() {
        let (timer, _db) = timer();
        assert!(matches!(timer.start("u1", 0).await, Err(TimerError::InvalidDuration)));

        timer.start("u1", 25).await.unwrap();
        assert!(matches!(timer.start("u1", 25).await, Err(TimerError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn cancel_marks_session_cancelled() {
        let (timer, db) = timer();
        let session = timer.start("u1", 25).await.unwrap();

        assert!(timer.cancel().await.unwrap());
        assert!(!timer.cancel().await.unwrap());

        let stored = db.get_focus_session(&session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::Cancelled);
        assert_eq!(timer.get_state().await.status, TimerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_completes_session_with_earned_stage() {
        let (timer, db) = timer();
        db.ensure_user("u1", None).await.unwrap();
        let mut snapshots = timer.subscribe();
        let session = timer.start("u1", 25).await.unwrap();

        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.last_completion.is_some())
            .await
            .unwrap()
            .clone();

        assert!(snapshot.last_completion.unwrap().was_applied());
        assert_eq!(snapshot.state.status, TimerStatus::Finished);

        let stored = db.get_focus_session(&session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.stage_label.as_deref(), Some("Filiz"));
        assert_eq!(db.get_user_stats("u1").await.total_focus_minutes, 25);
    }
}
