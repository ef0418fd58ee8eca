use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::helpers::{
    field_bool, field_str, field_string_set, field_timestamp, field_u32, field_u64, local_date,
};
use crate::db::Fields;

/// Profile picture: a picked image URI or a single emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Avatar {
    Emoji(String),
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub created_at: i64,
    pub is_premium: bool,
    pub premium_since: Option<i64>,
    pub total_focus_minutes: u64,
    pub streak: u32,
    pub last_completed_at: Option<i64>,
    pub flowers_unlocked: Vec<String>,
    pub avatar: Option<Avatar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_focus_minutes: u64,
    pub streak: u32,
    pub last_completed_at: Option<i64>,
}

impl User {
    /// Decodes a `users/{id}` document. Missing or mistyped fields take their
    /// zero value.
    pub fn from_document(id: &str, data: &Fields) -> Self {
        let avatar = field_str(data, "avatarEmoji")
            .map(Avatar::Emoji)
            .or_else(|| field_str(data, "avatar").map(Avatar::Image));
        Self {
            id: id.to_string(),
            email: field_str(data, "email"),
            created_at: field_timestamp(data, "createdAt").unwrap_or_default(),
            is_premium: field_bool(data, "isPremium"),
            premium_since: field_timestamp(data, "premiumSince"),
            total_focus_minutes: field_u64(data, "totalFocusMinutes"),
            streak: field_u32(data, "streak"),
            last_completed_at: field_timestamp(data, "lastCompletedAt"),
            flowers_unlocked: field_string_set(data, "flowersUnlocked"),
            avatar,
        }
    }

    /// What a brand-new user looks like before the first snapshot arrives.
    pub fn provisional(id: &str, email: Option<&str>, now_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            email: email.map(str::to_string),
            created_at: now_ms,
            is_premium: false,
            premium_since: None,
            total_focus_minutes: 0,
            streak: 0,
            last_completed_at: None,
            flowers_unlocked: Vec::new(),
            avatar: None,
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            total_focus_minutes: self.total_focus_minutes,
            streak: self.streak,
            last_completed_at: self.last_completed_at,
        }
    }
}

/// Default shape written by `ensure_user`.
pub(crate) fn initial_user_fields(id: &str, email: Option<&str>, now_ms: i64) -> Fields {
    crate::fields! {
        "userId" => id,
        "email" => email,
        "createdAt" => now_ms,
        "isPremium" => false,
        "premiumSince" => Value::Null,
        "totalFocusMinutes" => 0,
        "streak" => 0,
        "lastCompletedAt" => Value::Null,
        "flowersUnlocked" => json!([]),
    }
}

/// Daily streak after a completion at `now`, judged by calendar days in `tz`.
///
/// Same day as the last completion keeps the streak (at least 1), the day
/// after extends it, anything else starts over at 1.
pub fn next_streak<Tz: TimeZone>(
    previous: u32,
    last_completed_ms: Option<i64>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> u32 {
    let Some(last_ms) = last_completed_ms else {
        return 1;
    };
    let today = now.with_timezone(tz).date_naive();
    let last_day = local_date(last_ms, tz);

    if last_day == today {
        previous.max(1)
    } else if Some(last_day) == today.pred_opt() {
        previous.saturating_add(1)
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;

    fn at(tz: &FixedOffset, y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        tz.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn streak_follows_calendar_days() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = at(&tz, 2024, 3, 10, 12);

        let yesterday = at(&tz, 2024, 3, 9, 10).timestamp_millis();
        assert_eq!(next_streak(4, Some(yesterday), now, &tz), 5);

        let two_days_ago = at(&tz, 2024, 3, 8, 10).timestamp_millis();
        assert_eq!(next_streak(4, Some(two_days_ago), now, &tz), 1);

        let earlier_today = at(&tz, 2024, 3, 10, 8).timestamp_millis();
        assert_eq!(next_streak(4, Some(earlier_today), now, &tz), 4);
        assert_eq!(next_streak(0, Some(earlier_today), now, &tz), 1);

        assert_eq!(next_streak(9, None, now, &tz), 1);
    }

    #[test]
    fn late_evening_yesterday_counts_even_under_24h() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2024, 3, 10, 0);
        let last = at(&tz, 2024, 3, 9, 23).timestamp_millis();
        assert_eq!(next_streak(2, Some(last), now, &tz), 3);
    }

    #[test]
    fn decodes_with_zero_defaults() {
        let data = json!({
            "email": "a@b.c",
            "isPremium": 1,
            "streak": 3,
            "flowersUnlocked": ["Tohum", "Tohum"],
            "avatarEmoji": "🌻"
        })
        .as_object()
        .cloned()
        .unwrap();
        let user = User::from_document("u1", &data);

        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert!(!user.is_premium);
        assert_eq!(user.streak, 3);
        assert_eq!(user.total_focus_minutes, 0);
        assert_eq!(user.flowers_unlocked, ["Tohum"]);
        assert_eq!(user.avatar, Some(Avatar::Emoji("🌻".into())));
    }
}
