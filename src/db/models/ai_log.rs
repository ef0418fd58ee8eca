use serde::{Deserialize, Serialize};

use crate::db::helpers::{field_bool, field_enum, field_str, field_timestamp, field_u32};
use crate::db::Fields;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiLogKind {
    #[default]
    Chat,
    ChatError,
    Suggestion,
    Advice,
}

impl AiLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiLogKind::Chat => "chat",
            AiLogKind::ChatError => "chat_error",
            AiLogKind::Suggestion => "suggestion",
            AiLogKind::Advice => "advice",
        }
    }
}

/// Who produced a piece of assistant text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    #[default]
    Fallback,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::Fallback => "fallback",
        }
    }
}

/// One `ai_logs` document, whatever its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiLog {
    pub id: String,
    pub user_id: String,
    pub kind: AiLogKind,
    pub prompt: Option<String>,
    pub response: Option<String>,
    pub provider: Option<String>,
    pub error_code: Option<String>,
    pub focus_session_id: Option<String>,
    pub stage_label: Option<String>,
    pub minutes: Option<u32>,
    pub is_premium_at_time: bool,
    pub created_at: Option<i64>,
}

impl AiLog {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        Self {
            id: id.to_string(),
            user_id: field_str(data, "userId").unwrap_or_default(),
            kind: field_enum(data, "type"),
            prompt: field_str(data, "prompt"),
            response: field_str(data, "response"),
            provider: field_str(data, "provider"),
            error_code: field_str(data, "errorCode"),
            focus_session_id: field_str(data, "focusSessionId"),
            stage_label: field_str(data, "stageLabel"),
            minutes: data.contains_key("minutes").then(|| field_u32(data, "minutes")),
            is_premium_at_time: field_bool(data, "isPremiumAtTime"),
            created_at: field_timestamp(data, "createdAt"),
        }
    }
}

/// A suggestion shown to the user, optionally tied to a focus session.
#[derive(Debug, Clone, PartialEq)]
pub struct AiSuggestionLog {
    pub user_id: String,
    pub focus_session_id: Option<String>,
    pub prompt: String,
    pub response: String,
    pub provider: String,
}

/// Post-session advice.
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceLog {
    pub session_id: String,
    pub minutes: u32,
    pub completed_seconds: u64,
    pub stage_label: String,
    pub is_premium_at_time: bool,
    pub advice_text: String,
    pub provider: AiProvider,
}
