use crate::db::{
    connection::Database,
    documents::{Direction, Query},
    error::RemoteError,
    helpers::start_of_local_day,
    models::{AdviceLog, AiLog, AiLogKind, AiProvider, AiSuggestionLog},
    Fields, AI_LOGS,
};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "ai_logs";

impl Database {
    async fn insert_ai_log(&self, mut fields: Fields) -> Result<String, RemoteError> {
        self.transaction(move |tx| {
            fields.insert("createdAt".into(), tx.now_ms().into());
            Ok(tx.create(AI_LOGS, fields.clone())?.id().to_string())
        })
        .await
        .inspect_err(|err| log_error!("writing ai log failed: {err}"))
    }

    /// Records one successful chat exchange.
    pub async fn add_ai_log(
        &self,
        user_id: &str,
        prompt: &str,
        response: &str,
        provider: AiProvider,
    ) -> Result<String, RemoteError> {
        self.insert_ai_log(crate::fields! {
            "userId" => user_id,
            "type" => AiLogKind::Chat.as_str(),
            "prompt" => prompt,
            "response" => response,
            "provider" => provider.as_str(),
        })
        .await
    }

    /// Records a chat call that fell back; `response` is the text shown
    /// instead.
    pub async fn add_chat_error_log(
        &self,
        user_id: &str,
        prompt: &str,
        response: &str,
        error_code: &str,
    ) -> Result<String, RemoteError> {
        self.insert_ai_log(crate::fields! {
            "userId" => user_id,
            "type" => AiLogKind::ChatError.as_str(),
            "prompt" => prompt,
            "response" => response,
            "provider" => AiProvider::Fallback.as_str(),
            "errorCode" => error_code,
        })
        .await
    }

    pub async fn log_ai_suggestion(&self, log: AiSuggestionLog) -> Result<String, RemoteError> {
        self.insert_ai_log(crate::fields! {
            "userId" => log.user_id,
            "type" => AiLogKind::Suggestion.as_str(),
            "focusSessionId" => log.focus_session_id,
            "prompt" => log.prompt,
            "response" => log.response,
            "provider" => log.provider,
        })
        .await
    }

    pub async fn save_ai_advice(&self, user_id: &str, advice: AdviceLog) -> Result<String, RemoteError> {
        let id = self
            .insert_ai_log(crate::fields! {
                "userId" => user_id,
                "type" => AiLogKind::Advice.as_str(),
                "focusSessionId" => advice.session_id,
                "minutes" => advice.minutes,
                "completedSeconds" => advice.completed_seconds,
                "stageLabel" => advice.stage_label,
                "isPremiumAtTime" => advice.is_premium_at_time,
                "response" => advice.advice_text,
                "provider" => advice.provider.as_str(),
            })
            .await?;
        log_info!("saved advice {id}");
        Ok(id)
    }

    /// How many logs of any kind the user wrote since local midnight.
    /// Zero when the count cannot be read.
    pub async fn get_daily_ai_usage_count(&self, user_id: &str) -> u64 {
        let since = start_of_local_day(self.clock().now());
        let query = Query::collection(AI_LOGS)
            .where_eq("userId", user_id)
            .where_gte("createdAt", since);
        match self.transaction(move |tx| tx.count(&query)).await {
            Ok(count) => count,
            Err(err) => {
                log_error!("daily usage count failed: {err}");
                0
            }
        }
    }

    pub async fn get_latest_ai_advice(&self, user_id: &str) -> Option<AiLog> {
        let query = Query::collection(AI_LOGS)
            .where_eq("userId", user_id)
            .where_eq("type", AiLogKind::Advice.as_str())
            .order_by("createdAt", Direction::Desc)
            .limit(1);
        match self.transaction(move |tx| tx.query(&query)).await {
            Ok(docs) => docs
                .first()
                .map(|doc| AiLog::from_document(doc.id(), &doc.data)),
            Err(err) => {
                log_error!("get_latest_ai_advice failed: {err}");
                None
            }
        }
    }
}
