//! Document store standing in for the hosted backend: users, focus sessions,
//! tasks, AI logs, notifications and app lists as JSON documents in SQLite,
//! with atomic multi-document transactions and per-document watches.

mod connection;
mod documents;
mod error;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;
mod watch;

pub use connection::Database;
pub use documents::{Direction, DocPath, DocTransaction, Document, Fields, Query, SetMode};
pub use error::RemoteError;
pub use models::*;
pub use repositories::{focus_sessions::DEFAULT_RECENT_SESSIONS, users::UserWatch};
pub use watch::{DocSnapshot, DocumentWatch, WatchClosed};

pub const USERS: &str = "users";
pub const FOCUS_SESSIONS: &str = "focusSessions";
pub const TASKS: &str = "tasks";
pub const AI_LOGS: &str = "ai_logs";
pub const NOTIFICATIONS: &str = "notifications";
pub const ALLOWED_APPS: &str = "allowedApps";
pub const BLOCKED_APPS: &str = "blockedApps";
/// Subcollection under `users/{id}`.
pub const USER_TASKS: &str = "tasks";
