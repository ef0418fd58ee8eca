use anyhow::Result;
use uuid::Uuid;

use super::{KeyValueStorage, DEVICE_USER_ID_KEY};

/// Stable per-install identifier, generated on first use.
pub fn device_user_id(storage: &dyn KeyValueStorage) -> Result<String> {
    if let Some(existing) = storage.get_item(DEVICE_USER_ID_KEY)? {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let id = Uuid::new_v4().to_string();
    storage.set_item(DEVICE_USER_ID_KEY, &id)?;
    Ok(id)
}
