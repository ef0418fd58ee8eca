pub mod ai_log;
pub mod app;
pub mod focus_session;
pub mod notification;
pub mod stage;
pub mod task;
pub mod user;

pub use ai_log::{AdviceLog, AiLog, AiLogKind, AiProvider, AiSuggestionLog};
pub use app::{app_allowance_for, AllowAppOutcome, AppAllowance, FocusApp, FREE_ALLOWED_APPS_LIMIT};
pub use focus_session::{CompletionOutcome, FocusSession, SessionStatus};
pub use notification::{NewNotification, Notification};
pub use stage::FlowerStage;
pub use task::{NewRemoteTask, RemoteTask, RemoteTaskPatch, UserTaskItem};
pub use user::{next_streak, Avatar, User, UserStats};
