use chrono::Local;

use crate::db::{
    connection::Database,
    documents::{Direction, DocPath, Query, SetMode},
    error::RemoteError,
    models::{next_streak, CompletionOutcome, FocusSession, SessionStatus, User},
    FOCUS_SESSIONS, USERS,
};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "focus_sessions";

pub const DEFAULT_RECENT_SESSIONS: usize = 10;

impl Database {
    /// Starts a session in the running state, recording whether the user was
    /// premium at that moment.
    pub async fn create_focus_session(
        &self,
        user_id: &str,
        minutes_planned: u32,
    ) -> Result<FocusSession, RemoteError> {
        let user_path = DocPath::new(USERS, user_id)?;
        let user_id = user_id.to_string();

        let session = self
            .transaction(move |tx| {
                let is_premium = tx
                    .get(&user_path)?
                    .map(|doc| User::from_document(&user_id, &doc.data).is_premium)
                    .unwrap_or(false);
                let now = tx.now_ms();
                let fields = crate::fields! {
                    "userId" => user_id.as_str(),
                    "minutesPlanned" => minutes_planned,
                    "startedAt" => now,
                    "endedAt" => serde_json::Value::Null,
                    "completed" => false,
                    "status" => SessionStatus::Running.as_str(),
                    "stageLabel" => serde_json::Value::Null,
                    "stageEmoji" => serde_json::Value::Null,
                    "isPremiumAtTime" => is_premium,
                };
                let doc = tx.create(FOCUS_SESSIONS, fields)?;
                Ok(FocusSession::from_document(doc.id(), &doc.data))
            })
            .await
            .inspect_err(|err| log_error!("create_focus_session failed: {err}"))?;

        log_info!("session {} started ({} min)", session.id, minutes_planned);
        Ok(session)
    }

    pub async fn get_focus_session(&self, session_id: &str) -> Option<FocusSession> {
        let path = DocPath::new(FOCUS_SESSIONS, session_id).ok()?;
        match self.transaction(move |tx| tx.get(&path)).await {
            Ok(doc) => doc.map(|doc| FocusSession::from_document(doc.id(), &doc.data)),
            Err(err) => {
                log_error!("get_focus_session failed: {err}");
                None
            }
        }
    }

    /// Completes a running session and folds it into the user's totals in one
    /// transaction. A session that already finished (completed or cancelled)
    /// is left alone and reported as such; a missing one is `NotFound`.
    pub async fn complete_focus_session(
        &self,
        session_id: &str,
        user_id: &str,
        stage_label: &str,
        stage_emoji: Option<&str>,
        minutes_planned: u32,
    ) -> Result<CompletionOutcome, RemoteError> {
        let session_path = DocPath::new(FOCUS_SESSIONS, session_id)?;
        let user_path = DocPath::new(USERS, user_id)?;
        let user_id = user_id.to_string();
        let stage_label = stage_label.trim().to_string();
        let stage_emoji = stage_emoji.map(str::to_string);

        let outcome = self
            .transaction(move |tx| {
                let session = tx
                    .get(&session_path)?
                    .ok_or_else(|| RemoteError::NotFound(session_path.to_string()))?;
                let status = SessionStatus::of(&session.data);
                if status.is_terminal() {
                    return Ok(CompletionOutcome::AlreadyFinished(status));
                }

                let now = tx.now();
                let now_ms = tx.now_ms();
                tx.update(
                    &session_path,
                    crate::fields! {
                        "endedAt" => now_ms,
                        "completed" => true,
                        "status" => SessionStatus::Completed.as_str(),
                        "stageLabel" => stage_label.as_str(),
                        "stageEmoji" => stage_emoji.as_deref(),
                    },
                )?;

                let previous = tx
                    .get(&user_path)?
                    .map(|doc| User::from_document(&user_id, &doc.data))
                    .unwrap_or_else(|| User::provisional(&user_id, None, now_ms));

                let mut flowers = previous.flowers_unlocked.clone();
                if !stage_label.is_empty() && !flowers.contains(&stage_label) {
                    flowers.push(stage_label.clone());
                }
                let streak = next_streak(previous.streak, previous.last_completed_at, now, &Local);
                let total = previous
                    .total_focus_minutes
                    .saturating_add(u64::from(minutes_planned));

                let updated = tx.set(
                    &user_path,
                    crate::fields! {
                        "totalFocusMinutes" => total,
                        "lastCompletedAt" => now_ms,
                        "streak" => streak,
                        "flowersUnlocked" => flowers,
                    },
                    SetMode::Merge,
                )?;
                Ok(CompletionOutcome::Applied(
                    User::from_document(&user_id, &updated.data).stats(),
                ))
            })
            .await
            .inspect_err(|err| log_error!("complete_focus_session failed: {err}"))?;

        match &outcome {
            CompletionOutcome::Applied(stats) => log_info!(
                "session {session_id} completed: total={} streak={}",
                stats.total_focus_minutes,
                stats.streak
            ),
            CompletionOutcome::AlreadyFinished(status) => {
                log_info!("session {session_id} already {}", status.as_str())
            }
        }
        Ok(outcome)
    }

    /// Marks a running session cancelled. No reward, no effect on the user.
    /// Returns `false` when the session had already finished.
    pub async fn cancel_focus_session(&self, session_id: &str) -> Result<bool, RemoteError> {
        let path = DocPath::new(FOCUS_SESSIONS, session_id)?;
        let cancelled = self
            .transaction(move |tx| {
                let session = tx
                    .get(&path)?
                    .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
                if SessionStatus::of(&session.data).is_terminal() {
                    return Ok(false);
                }
                let now = tx.now_ms();
                tx.update(
                    &path,
                    crate::fields! {
                        "endedAt" => now,
                        "completed" => false,
                        "status" => SessionStatus::Cancelled.as_str(),
                    },
                )?;
                Ok(true)
            })
            .await
            .inspect_err(|err| log_error!("cancel_focus_session failed: {err}"))?;

        if cancelled {
            log_info!("session {session_id} cancelled");
        }
        Ok(cancelled)
    }

    /// Most recently ended sessions first; running sessions sort last.
    pub async fn list_recent_sessions(&self, user_id: &str, limit: usize) -> Vec<FocusSession> {
        let query = Query::collection(FOCUS_SESSIONS)
            .where_eq("userId", user_id)
            .order_by("endedAt", Direction::Desc)
            .limit(limit);
        match self.transaction(move |tx| tx.query(&query)).await {
            Ok(docs) => docs
                .iter()
                .map(|doc| FocusSession::from_document(doc.id(), &doc.data))
                .collect(),
            Err(err) => {
                log_error!("list_recent_sessions failed: {err}");
                Vec::new()
            }
        }
    }
}
