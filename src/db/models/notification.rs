use serde::{Deserialize, Serialize};

use crate::db::helpers::{field_bool, field_str, field_timestamp};
use crate::db::Fields;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub kind: Option<String>,
    pub created_at: Option<i64>,
}

impl Notification {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        Self {
            id: id.to_string(),
            user_id: field_str(data, "userId").unwrap_or_default(),
            title: field_str(data, "title").unwrap_or_default(),
            body: field_str(data, "body").unwrap_or_default(),
            read: field_bool(data, "read"),
            kind: field_str(data, "type"),
            created_at: field_timestamp(data, "createdAt"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub title: String,
    pub body: String,
    pub kind: Option<String>,
}
