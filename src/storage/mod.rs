//! Device-local key-value persistence backing the cache stores.

mod device;
mod file;
mod memory;

use anyhow::Result;

pub use device::device_user_id;
pub use file::FileStorage;
pub use memory::MemoryStorage;

pub const TASKS_KEY_PREFIX: &str = "odaki_tasks_v1_";
pub const ACHIEVEMENTS_KEY: &str = "odaki_achievements_v1";
pub const FRIENDS_KEY: &str = "odaki_friends_v1";
pub const ONBOARDING_KEY: &str = "odaki_onboarding_done";
pub const DEVICE_USER_ID_KEY: &str = "odaki_user_id";

/// String blobs addressed by key. Implementations report faults; callers
/// decide whether to swallow them.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}
