//! Remote task documents: the flat `tasks` collection (owned, shareable) and
//! the lighter `users/{id}/tasks` subcollection. They are deliberately kept as
//! separate schemas from the device-local task list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{Priority, TaskStatus};
use crate::db::helpers::{field_enum, field_str, field_string_set, field_timestamp};
use crate::db::Fields;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub desc: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: TaskStatus,
    pub shared_with: Vec<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl RemoteTask {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        Self {
            id: id.to_string(),
            owner_id: field_str(data, "ownerId").unwrap_or_default(),
            title: field_str(data, "title").unwrap_or_default(),
            desc: field_str(data, "desc").unwrap_or_default(),
            category: field_str(data, "category"),
            priority: field_enum(data, "priority"),
            date: field_str(data, "date"),
            time: field_str(data, "time"),
            status: field_enum(data, "status"),
            shared_with: field_string_set(data, "sharedWith"),
            created_at: field_timestamp(data, "createdAt"),
            updated_at: field_timestamp(data, "updatedAt"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewRemoteTask {
    pub title: String,
    pub desc: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<TaskStatus>,
    pub shared_with: Vec<String>,
}

impl NewRemoteTask {
    pub(crate) fn into_fields(self, owner_id: &str, now_ms: i64) -> Fields {
        let mut fields = crate::fields! {
            "title" => self.title,
            "ownerId" => owner_id,
            "status" => self.status.unwrap_or_default(),
            "sharedWith" => self.shared_with,
            "createdAt" => now_ms,
            "updatedAt" => now_ms,
        };
        insert_some(&mut fields, "desc", self.desc);
        insert_some(&mut fields, "category", self.category);
        insert_some(&mut fields, "priority", self.priority.map(|p| p.as_str().to_string()));
        insert_some(&mut fields, "date", self.date);
        insert_some(&mut fields, "time", self.time);
        fields
    }
}

/// Partial update of a flat task. `date`/`time` can be cleared with
/// `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct RemoteTaskPatch {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub date: Option<Option<String>>,
    pub time: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

impl RemoteTaskPatch {
    pub(crate) fn into_fields(self, now_ms: i64) -> Fields {
        let mut fields = crate::fields! { "updatedAt" => now_ms };
        insert_some(&mut fields, "title", self.title);
        insert_some(&mut fields, "desc", self.desc);
        insert_some(&mut fields, "category", self.category);
        insert_some(&mut fields, "priority", self.priority.map(|p| p.as_str().to_string()));
        if let Some(date) = self.date {
            fields.insert("date".into(), date.map(Value::String).unwrap_or(Value::Null));
        }
        if let Some(time) = self.time {
            fields.insert("time".into(), time.map(Value::String).unwrap_or(Value::Null));
        }
        if let Some(status) = self.status {
            fields.insert("status".into(), serde_json::json!(status));
        }
        fields
    }
}

fn insert_some(fields: &mut Fields, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::String(value));
    }
}

/// Entry of the `users/{id}/tasks` subcollection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTaskItem {
    pub id: String,
    pub title: String,
    pub created_at: Option<i64>,
}

impl UserTaskItem {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        Self {
            id: id.to_string(),
            title: field_str(data, "title").unwrap_or_default(),
            created_at: field_timestamp(data, "createdAt"),
        }
    }
}
