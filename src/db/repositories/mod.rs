pub mod ai_logs;
pub mod allowed_apps;
pub mod focus_sessions;
pub mod notifications;
pub mod tasks;
pub mod users;
