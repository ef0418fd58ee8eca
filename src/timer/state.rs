use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    /// Countdown reached zero; the session is being (or has been) completed.
    Finished,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub minutes: u32,
    pub target_ms: u64,
    pub is_premium_at_time: bool,
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        match (self.status, self.running_anchor) {
            (TimerStatus::Running, Some(anchor)) => {
                u64::try_from(anchor.elapsed().as_millis()).unwrap_or(u64::MAX)
            }
            (TimerStatus::Finished, _) => self.target_ms,
            _ => 0,
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        match self.status {
            TimerStatus::Running => self.target_ms.saturating_sub(self.elapsed_ms()),
            TimerStatus::Idle | TimerStatus::Finished => 0,
        }
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        user_id: String,
        minutes: u32,
        is_premium_at_time: bool,
        now: Instant,
    ) {
        *self = Self {
            status: TimerStatus::Running,
            session_id: Some(session_id),
            user_id: Some(user_id),
            minutes,
            target_ms: u64::from(minutes) * 60_000,
            is_premium_at_time,
            running_anchor: Some(now),
        };
    }

    pub fn finish(&mut self) {
        self.status = TimerStatus::Finished;
        self.running_anchor = None;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}
