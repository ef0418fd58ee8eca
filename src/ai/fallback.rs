//! Canned Turkish texts used whenever the provider is unavailable.

use super::AdviceInput;

pub const MISSING_KEY_TEXT: &str =
    "AI anahtarınız yapılandırılmamış. Lütfen ayarlarınızı kontrol edin.";
pub const EMPTY_PROMPT_TEXT: &str = "Boş prompt gönderilemez";
pub const TIP_PROMPT_REQUIRED_TEXT: &str = "Lütfen bir soru veya hedef girin.";
pub const DAILY_LIMIT_TEXT: &str =
    "Günlük ücretsiz istek hakkınızı doldurdunuz. Premium ile sınırsız.";

/// Tips when no provider is configured.
pub const DEFAULT_TIPS: [&str; 3] = [
    "Kısa bir hedef belirle, 15-25 dk ile başla.",
    "Bildirimleri kapat ve telefonu uzak tut.",
    "Pomodoro: 25dk odak, 5dk mola.",
];

/// Tips when the provider answered with something we could not split.
pub const LOCAL_TIPS: [&str; 3] = [
    "Bildirimleri kapat.",
    "Kısa hedef: 15-25 dk.",
    "Ara ver ve nefes al.",
];

pub const FALLBACK_RESPONSES: [&str; 3] = [
    "Merhaba! Nasıl yardımcı olabilirim?",
    "Öneri: 25 dk odak + 5 dk mola. Bunu deneyin.",
    "Yeni bir görev oluşturup öncelik atayabilirsiniz.",
];

const PROMPT_SUGGESTIONS: [&str; 3] = [
    "Kısa bir hedef belirle: 15-25 dk arasında bir oturum planla.",
    "Telefonunu uzaklaştır ve bildirimleri kapat.",
    "İlk 5 dk içinde en önemli 1 işi tamamlamaya odaklan.",
];

pub fn quota_cooldown_text(seconds_left: u64) -> String {
    format!("Kotanız doldu. {seconds_left}s sonra tekrar deneyin.")
}

/// Stand-in answer for a prompt the provider could not handle.
pub fn text_for_prompt() -> String {
    format!(
        "Kotanız dolu veya servis geçici olarak kullanılamıyor. \
         Şu an AI kotası dolu veya servis erişilemiyor. {}",
        PROMPT_SUGGESTIONS.join(" ")
    )
}

/// Advice derived from the session numbers alone.
pub fn local_advice(input: &AdviceInput) -> String {
    let mut parts = Vec::new();
    if input.completed_seconds < u64::from(input.minutes) * 60 {
        parts.push("Hedefin altında kaldın, daha kısa hedefle başlayabilirsin.");
    }
    if input.minutes >= 45 {
        parts.push("Uzun oturum; bitişte kısa bir yürüyüş yap.");
    }
    if input.stage_label.to_lowercase().contains("tohum") {
        parts.push("Telefonu uzak tut ve bildirimleri kapat.");
    }

    if parts.is_empty() {
        let completed_minutes = (input.completed_seconds + 30) / 60;
        format!("Tebrikler! {completed_minutes} dakika odaklandın, bu rutini sürdür.")
    } else {
        parts.join(" ")
    }
}

pub fn owned(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|text| text.to_string()).collect()
}
