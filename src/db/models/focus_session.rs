use serde::{Deserialize, Serialize};

use crate::db::helpers::{field_bool, field_str, field_timestamp, field_u32};
use crate::db::Fields;

use super::user::UserStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }

    /// The `completed` flag wins over the `status` string.
    pub(crate) fn of(data: &Fields) -> Self {
        if field_bool(data, "completed") {
            return SessionStatus::Completed;
        }
        match field_str(data, "status").as_deref() {
            Some("cancelled") => SessionStatus::Cancelled,
            Some("completed") => SessionStatus::Completed,
            _ => SessionStatus::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub user_id: String,
    pub minutes_planned: u32,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub status: SessionStatus,
    pub stage_label: Option<String>,
    pub stage_emoji: Option<String>,
    pub is_premium_at_time: bool,
}

impl FocusSession {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        Self {
            id: id.to_string(),
            user_id: field_str(data, "userId").unwrap_or_default(),
            minutes_planned: field_u32(data, "minutesPlanned"),
            started_at: field_timestamp(data, "startedAt"),
            ended_at: field_timestamp(data, "endedAt"),
            status: SessionStatus::of(data),
            stage_label: field_str(data, "stageLabel"),
            stage_emoji: field_str(data, "stageEmoji"),
            is_premium_at_time: field_bool(data, "isPremiumAtTime"),
        }
    }
}

/// Result of `complete_focus_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The session was completed and the user aggregate now reads as given.
    Applied(UserStats),
    /// The session had already reached a terminal state; nothing changed.
    AlreadyFinished(SessionStatus),
}

impl CompletionOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, CompletionOutcome::Applied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn completed_flag_wins_over_status_string() {
        assert_eq!(
            SessionStatus::of(&fields(json!({ "completed": true, "status": "cancelled" }))),
            SessionStatus::Completed
        );
        assert_eq!(
            SessionStatus::of(&fields(json!({ "completed": false, "status": "cancelled" }))),
            SessionStatus::Cancelled
        );
        assert_eq!(SessionStatus::of(&fields(json!({}))), SessionStatus::Running);
    }
}
