use serde::{Deserialize, Serialize};

use crate::db::helpers::{field_str, field_timestamp};
use crate::db::Fields;

/// Free users may allow this many apps during focus.
pub const FREE_ALLOWED_APPS_LIMIT: usize = 3;

/// One entry of the `allowedApps` or `blockedApps` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusApp {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: Option<i64>,
}

impl FocusApp {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        Self {
            id: id.to_string(),
            user_id: field_str(data, "userId").unwrap_or_default(),
            name: field_str(data, "name").unwrap_or_default(),
            created_at: field_timestamp(data, "createdAt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAllowance {
    pub allowed: usize,
    /// `None` for premium users.
    pub limit: Option<usize>,
    pub limit_reached: bool,
}

/// Enforced on the client only; the store accepts any number of entries
/// written directly.
pub fn app_allowance_for(allowed: usize, is_premium: bool) -> AppAllowance {
    if is_premium {
        return AppAllowance {
            allowed,
            limit: None,
            limit_reached: false,
        };
    }
    AppAllowance {
        allowed,
        limit: Some(FREE_ALLOWED_APPS_LIMIT),
        limit_reached: allowed >= FREE_ALLOWED_APPS_LIMIT,
    }
}

/// Result of `add_allowed_app`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowAppOutcome {
    Added(String),
    /// The app was already on the list; carries the existing id.
    AlreadyAllowed(String),
    /// Free plan cap hit; nothing was written.
    LimitReached(AppAllowance),
}
