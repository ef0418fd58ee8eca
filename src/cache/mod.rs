//! Device-local stores: each keeps a list (or flag) in memory, mirrors it to
//! key-value storage and tells subscribers when it changes.

mod achievements;
mod friends;
mod notifier;
mod onboarding;
mod store;
mod tasks;

pub use achievements::{Achievement, AchievementStore};
pub use friends::{Friend, FriendStatus, FriendStore};
pub use notifier::{ChangeNotifier, Subscription};
pub use onboarding::{OnboardingState, OnboardingStore};
pub use store::{CacheStore, CachedRecord};
pub use tasks::{
    NewTask, Priority, Task, TaskPatch, TaskStatus, TaskStore, DEFAULT_CATEGORY,
    DEFAULT_TASK_TITLE, DEFAULT_USER_KEY,
};
