//! AI assistant: a single-attempt text generator behind a cooldown gate, with
//! Turkish fallbacks for every failure and best-effort logging to `ai_logs`.

pub mod fallback;
pub mod gemini;
pub mod quota;

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::db::{AdviceLog, AiProvider, AiSuggestionLog, Database};
use crate::settings::AiSettings;
use crate::{log_error, log_info, log_warn};

pub use gemini::{GeminiClient, GenerateError, TextGenerator};
pub use quota::{QuotaGate, QuotaStatus, QUOTA_COOLDOWN_MS};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "ai";

/// Free users get this many AI requests per local day.
pub const FREE_DAILY_LIMIT: u64 = 3;

/// Why a reply came from the fallback set instead of the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiFault {
    EmptyPrompt,
    NotConfigured,
    /// Provider said 429 just now, or the cooldown from an earlier 429 is
    /// still running.
    QuotaExceeded { seconds_left: u64 },
    DailyLimitReached,
    Provider(GenerateError),
}

impl AiFault {
    pub fn code(&self) -> String {
        match self {
            AiFault::EmptyPrompt => "EMPTY_PROMPT".into(),
            AiFault::NotConfigured => "NO_API_KEY".into(),
            AiFault::QuotaExceeded { .. } => "QUOTA_EXCEEDED".into(),
            AiFault::DailyLimitReached => "DAILY_LIMIT".into(),
            AiFault::Provider(err) => err.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReply {
    pub text: String,
    pub provider: AiProvider,
    pub fault: Option<AiFault>,
}

impl AiReply {
    fn generated(text: String) -> Self {
        Self {
            text,
            provider: AiProvider::Gemini,
            fault: None,
        }
    }

    fn fallback(text: impl Into<String>, fault: AiFault) -> Self {
        Self {
            text: text.into(),
            provider: AiProvider::Fallback,
            fault: Some(fault),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdviceInput {
    pub minutes: u32,
    pub completed_seconds: u64,
    pub stage_label: String,
    pub streak: Option<u32>,
    pub is_premium: bool,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipsInput {
    pub minutes: u32,
    pub stage_label: String,
    pub is_premium: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipsReply {
    pub tips: Vec<String>,
    pub provider: AiProvider,
    pub fault: Option<AiFault>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuota {
    pub used: u64,
    /// `None` for premium users.
    pub limit: Option<u64>,
    pub exhausted: bool,
}

/// Enforced on the client only; the store does not check it.
pub fn daily_quota_for(used: u64, is_premium: bool) -> DailyQuota {
    if is_premium {
        return DailyQuota {
            used,
            limit: None,
            exhausted: false,
        };
    }
    DailyQuota {
        used,
        limit: Some(FREE_DAILY_LIMIT),
        exhausted: used >= FREE_DAILY_LIMIT,
    }
}

pub struct AiService<G> {
    generator: Option<G>,
    db: Database,
    quota: Arc<QuotaGate>,
}

impl AiService<GeminiClient> {
    /// Gemini-backed service, or an unconfigured one when the settings do
    /// not select Gemini with a key.
    pub fn from_settings(settings: &AiSettings, db: Database, quota: Arc<QuotaGate>) -> Result<Self> {
        let generator = settings
            .gemini_key()
            .map(|key| GeminiClient::new(key, settings.gemini_model.as_str()))
            .transpose()?;
        if generator.is_none() {
            log_info!("no AI provider configured; using local fallbacks");
        }
        Ok(Self::new(generator, db, quota))
    }
}

impl<G: TextGenerator> AiService<G> {
    pub fn new(generator: Option<G>, db: Database, quota: Arc<QuotaGate>) -> Self {
        Self {
            generator,
            db,
            quota,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn quota_status(&self) -> QuotaStatus {
        self.quota.status()
    }

    /// Chat: one prompt, one reply, always logged.
    pub async fn send_prompt(&self, user_id: &str, prompt: &str) -> AiReply {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return AiReply::fallback(fallback::EMPTY_PROMPT_TEXT, AiFault::EmptyPrompt);
        }

        let reply = self.generate(prompt, fallback::text_for_prompt).await;
        let logged = match &reply.fault {
            None => self.db.add_ai_log(user_id, prompt, &reply.text, reply.provider).await,
            Some(fault) => {
                self.db
                    .add_chat_error_log(user_id, prompt, &reply.text, &fault.code())
                    .await
            }
        };
        if let Err(err) = logged {
            log_error!("could not log chat for {user_id}: {err}");
        }
        reply
    }

    /// Short advice after a session. Saved as an `advice` log when the input
    /// names its session.
    pub async fn generate_focus_advice(&self, user_id: &str, input: &AdviceInput) -> AiReply {
        let prompt = format!(
            "Kullanıcı oturum bilgileri:\n\
             - Planlanan dakika: {}\n\
             - Gerçekleşen saniye: {}\n\
             - Evre: {}\n\
             Kısa, net ve Türkçe 2-3 cümle odak önerisi ver.",
            input.minutes, input.completed_seconds, input.stage_label
        );
        let reply = self
            .generate(&prompt, || fallback::local_advice(input))
            .await;

        if let Some(session_id) = &input.session_id {
            let advice = AdviceLog {
                session_id: session_id.clone(),
                minutes: input.minutes,
                completed_seconds: input.completed_seconds,
                stage_label: input.stage_label.clone(),
                is_premium_at_time: input.is_premium,
                advice_text: reply.text.clone(),
                provider: reply.provider,
            };
            if let Err(err) = self.db.save_ai_advice(user_id, advice).await {
                log_error!("could not save advice for {session_id}: {err}");
            }
        }
        reply
    }

    /// Three short tips, logged as a suggestion.
    pub async fn focus_tips(&self, user_id: &str, input: &TipsInput) -> TipsReply {
        let tips = self.tips_for(input).await;

        let log = AiSuggestionLog {
            user_id: user_id.to_string(),
            focus_session_id: None,
            prompt: format!(
                "minutes={}; stage={}; premium={}",
                input.minutes, input.stage_label, input.is_premium
            ),
            response: tips.tips.join("\n"),
            provider: tips.provider.as_str().to_string(),
        };
        if let Err(err) = self.db.log_ai_suggestion(log).await {
            log_error!("could not log tips for {user_id}: {err}");
        }
        tips
    }

    /// Answers a free-form focus question, subject to the daily free cap.
    pub async fn focus_tip(&self, user_id: &str, prompt: &str, is_premium: bool) -> AiReply {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return AiReply::fallback(fallback::TIP_PROMPT_REQUIRED_TEXT, AiFault::EmptyPrompt);
        }
        if self.daily_quota(user_id, is_premium).await.exhausted {
            return AiReply::fallback(fallback::DAILY_LIMIT_TEXT, AiFault::DailyLimitReached);
        }

        let reply = self.generate(prompt, fallback::text_for_prompt).await;
        if let Err(err) = self
            .db
            .add_ai_log(user_id, prompt, &reply.text, reply.provider)
            .await
        {
            log_error!("could not log tip for {user_id}: {err}");
        }
        reply
    }

    /// Paragraphs of the provider's answer, or the canned responses.
    pub async fn ask(&self, prompt: &str) -> Vec<String> {
        if self.generator.is_some() && !prompt.trim().is_empty() {
            let reply = self.generate(prompt.trim(), String::new).await;
            if reply.fault.is_none() {
                let paragraphs = split_paragraphs(&reply.text);
                return if paragraphs.is_empty() {
                    vec![reply.text]
                } else {
                    paragraphs
                };
            }
        }
        fallback::owned(&fallback::FALLBACK_RESPONSES)
    }

    pub async fn daily_quota(&self, user_id: &str, is_premium: bool) -> DailyQuota {
        let used = self.db.get_daily_ai_usage_count(user_id).await;
        daily_quota_for(used, is_premium)
    }

    async fn tips_for(&self, input: &TipsInput) -> TipsReply {
        if self.generator.is_none() {
            return TipsReply {
                tips: fallback::owned(&fallback::DEFAULT_TIPS),
                provider: AiProvider::Fallback,
                fault: Some(AiFault::NotConfigured),
            };
        }

        let prompt = format!(
            "Kısa ve pratik odak önerileri üret. Kullanıcı bilgileri: Planlanan dakika: {}, \
             Evre: {}, Premium: {}. 3 maddelik, kısa Türkçe öneriler ver.",
            input.minutes,
            input.stage_label,
            if input.is_premium { "evet" } else { "hayır" }
        );
        let reply = self.generate(&prompt, String::new).await;
        if let Some(fault) = reply.fault {
            return TipsReply {
                tips: fallback::owned(&fallback::LOCAL_TIPS),
                provider: AiProvider::Fallback,
                fault: Some(fault),
            };
        }

        match split_tips(&reply.text) {
            Some(tips) => TipsReply {
                tips,
                provider: reply.provider,
                fault: None,
            },
            None => {
                log_warn!("could not split provider answer into three tips");
                TipsReply {
                    tips: fallback::owned(&fallback::LOCAL_TIPS),
                    provider: AiProvider::Fallback,
                    fault: Some(AiFault::Provider(GenerateError::EmptyOutput)),
                }
            }
        }
    }

    /// One provider attempt, unless the provider is missing or cooling down.
    /// `fallback_text` supplies the reply text on every failure except a
    /// missing provider.
    async fn generate(&self, prompt: &str, fallback_text: impl FnOnce() -> String) -> AiReply {
        let Some(generator) = &self.generator else {
            return AiReply::fallback(fallback::MISSING_KEY_TEXT, AiFault::NotConfigured);
        };

        let status = self.quota.status();
        if status.active {
            log_warn!("cooling down, {}s left; request not sent", status.seconds_left);
            return AiReply::fallback(
                fallback_text(),
                AiFault::QuotaExceeded {
                    seconds_left: status.seconds_left,
                },
            );
        }

        match generator.generate(prompt).await {
            Ok(text) => AiReply::generated(text),
            Err(GenerateError::RateLimited) => {
                self.quota.record_rate_limited();
                AiReply::fallback(
                    fallback_text(),
                    AiFault::QuotaExceeded {
                        seconds_left: self.quota.status().seconds_left,
                    },
                )
            }
            Err(err) => {
                log_warn!("provider failed: {err}");
                AiReply::fallback(fallback_text(), AiFault::Provider(err))
            }
        }
    }
}

/// First three non-empty lines, else first three sentences.
fn split_tips(text: &str) -> Option<Vec<String>> {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if lines.len() >= 3 {
        return Some(lines.into_iter().take(3).collect());
    }

    let sentences = split_sentences(text);
    if sentences.len() >= 3 {
        return Some(
            sentences
                .into_iter()
                .take(3)
                .map(|s| if s.ends_with('.') { s } else { format!("{s}.") })
                .collect(),
        );
    }
    None
}

/// Splits after `.`, `?` or `!` followed by whitespace; the terminator is
/// dropped.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let at_boundary = matches!(c, '.' | '?' | '!')
            && chars.peek().is_some_and(|next| next.is_whitespace());
        if at_boundary {
            sentences.push(std::mem::take(&mut current));
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
        } else {
            current.push(c);
        }
    }
    sentences.push(current);
    sentences
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SystemClock;
    use std::sync::Mutex;

    /// Plays back canned results, one per call.
    struct Scripted {
        replies: Mutex<Vec<Result<String, GenerateError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerateError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl TextGenerator for Arc<Scripted> {
        fn generate(
            &self,
            prompt: &str,
        ) -> impl std::future::Future<Output = Result<String, GenerateError>> + Send {
            self.calls.lock().unwrap().push(prompt.to_string());
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    Err(GenerateError::EmptyOutput)
                } else {
                    replies.remove(0)
                }
            };
            async move { reply }
        }
    }

    fn service(
        replies: Vec<Result<String, GenerateError>>,
    ) -> (AiService<Arc<Scripted>>, Arc<Scripted>, Database) {
        let db = Database::in_memory(Arc::new(SystemClock)).unwrap();
        let scripted = Arc::new(Scripted::new(replies));
        let quota = Arc::new(QuotaGate::new(Arc::new(SystemClock)));
        (
            AiService::new(Some(Arc::clone(&scripted)), db.clone(), quota),
            scripted,
            db,
        )
    }

    #[tokio::test]
    async fn rate_limit_starts_cooldown_and_blocks_next_request() {
        let (service, scripted, db) = service(vec![Err(GenerateError::RateLimited)]);

        let first = service.send_prompt("u1", "odaklanamıyorum").await;
        assert_eq!(first.provider, AiProvider::Fallback);
        assert_eq!(first.fault, Some(AiFault::QuotaExceeded { seconds_left: 60 }));
        assert!(service.quota_status().active);

        let second = service.send_prompt("u1", "tekrar").await;
        assert!(matches!(second.fault, Some(AiFault::QuotaExceeded { .. })));
        assert_eq!(scripted.call_count(), 1);

        assert_eq!(db.get_daily_ai_usage_count("u1").await, 2);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_logging() {
        let (service, scripted, db) = service(vec![]);
        let reply = service.send_prompt("u1", "   ").await;
        assert_eq!(reply.fault, Some(AiFault::EmptyPrompt));
        assert_eq!(reply.text, fallback::EMPTY_PROMPT_TEXT);
        assert_eq!(scripted.call_count(), 0);
        assert_eq!(db.get_daily_ai_usage_count("u1").await, 0);
    }

    #[tokio::test]
    async fn unconfigured_service_says_so() {
        let db = Database::in_memory(Arc::new(SystemClock)).unwrap();
        let quota = Arc::new(QuotaGate::new(Arc::new(SystemClock)));
        let service: AiService<Arc<Scripted>> = AiService::new(None, db, quota);

        let reply = service.send_prompt("u1", "merhaba").await;
        assert_eq!(reply.fault, Some(AiFault::NotConfigured));
        assert_eq!(reply.text, fallback::MISSING_KEY_TEXT);

        let tips = service
            .focus_tips(
                "u1",
                &TipsInput {
                    minutes: 25,
                    stage_label: "Filiz".into(),
                    is_premium: false,
                },
            )
            .await;
        assert_eq!(tips.tips, fallback::owned(&fallback::DEFAULT_TIPS));
        assert_eq!(service.ask("merhaba").await, fallback::owned(&fallback::FALLBACK_RESPONSES));
    }

    #[tokio::test]
    async fn tips_split_lines_then_sentences() {
        let (service, _, _) = service(vec![
            Ok("1. Su iç\n\n2. Yürü\n3. Nefes al\n4. Fazla".into()),
            Ok("Telefonu kapat. Masanı topla! Hedef yaz? Sonra".into()),
            Ok("Tek cümle.".into()),
        ]);
        let input = TipsInput {
            minutes: 25,
            stage_label: "Filiz".into(),
            is_premium: true,
        };

        let by_lines = service.focus_tips("u1", &input).await;
        assert_eq!(by_lines.tips, vec!["1. Su iç", "2. Yürü", "3. Nefes al"]);
        assert_eq!(by_lines.provider, AiProvider::Gemini);

        let by_sentences = service.focus_tips("u1", &input).await;
        assert_eq!(
            by_sentences.tips,
            vec!["Telefonu kapat.", "Masanı topla.", "Hedef yaz."]
        );

        let unsplittable = service.focus_tips("u1", &input).await;
        assert_eq!(unsplittable.tips, fallback::owned(&fallback::LOCAL_TIPS));
        assert_eq!(unsplittable.provider, AiProvider::Fallback);
    }

    #[tokio::test]
    async fn free_users_are_capped_per_day() {
        let (service, scripted, _) = service(vec![
            Ok("a".into()),
            Ok("b".into()),
            Ok("c".into()),
            Ok("d".into()),
        ]);
        for _ in 0..3 {
            assert_eq!(service.focus_tip("u1", "nasıl?", false).await.fault, None);
        }
        let capped = service.focus_tip("u1", "nasıl?", false).await;
        assert_eq!(capped.fault, Some(AiFault::DailyLimitReached));
        assert_eq!(scripted.call_count(), 3);

        assert_eq!(service.focus_tip("u1", "nasıl?", true).await.text, "d");
        let quota = service.daily_quota("u1", false).await;
        assert_eq!(quota.used, 4);
        assert!(quota.exhausted);
    }

    #[tokio::test]
    async fn advice_falls_back_locally_and_is_saved() {
        let (service, _, db) = service(vec![Err(GenerateError::Timeout)]);
        let input = AdviceInput {
            minutes: 25,
            completed_seconds: 1500,
            stage_label: "Filiz".into(),
            session_id: Some("s1".into()),
            ..AdviceInput::default()
        };

        let reply = service.generate_focus_advice("u1", &input).await;
        assert_eq!(reply.fault, Some(AiFault::Provider(GenerateError::Timeout)));
        assert!(reply.text.starts_with("Tebrikler!"));

        let saved = db.get_latest_ai_advice("u1").await.unwrap();
        assert_eq!(saved.response, Some(reply.text));
        assert_eq!(saved.provider.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn ask_splits_paragraphs() {
        let (service, _, _) = service(vec![Ok("Birinci.\r\n\r\nİkinci.".into())]);
        assert_eq!(service.ask("?").await, vec!["Birinci.", "İkinci."]);
    }

    #[test]
    fn premium_has_no_cap() {
        assert_eq!(daily_quota_for(10, true).limit, None);
        assert!(!daily_quota_for(2, false).exhausted);
        assert!(daily_quota_for(3, false).exhausted);
    }
}
