use serde_json::Value;

use crate::db::{
    connection::Database,
    documents::{DocPath, SetMode},
    error::RemoteError,
    models::{user::initial_user_fields, Avatar, User, UserStats},
    watch::{DocumentWatch, WatchClosed},
    USERS,
};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "users";

/// Live view of one user document.
pub struct UserWatch {
    user_id: String,
    inner: DocumentWatch,
}

impl UserWatch {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next decoded snapshot; `None` while the document does not exist.
    pub async fn next(&mut self) -> Result<Option<User>, WatchClosed> {
        let snapshot = self.inner.next().await?;
        Ok(snapshot
            .document
            .map(|doc| User::from_document(&self.user_id, &doc.data)))
    }
}

impl Database {
    /// Creates `users/{id}` with the default shape if it does not exist yet.
    /// An existing document is left untouched.
    pub async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> Result<(), RemoteError> {
        let path = DocPath::new(USERS, user_id)?;
        let user_id = user_id.to_string();
        let email = email.map(str::to_string);

        let created = self
            .transaction(move |tx| {
                if tx.get(&path)?.is_some() {
                    return Ok(false);
                }
                let fields = initial_user_fields(&user_id, email.as_deref(), tx.now_ms());
                tx.set(&path, fields, SetMode::Merge)?;
                Ok(true)
            })
            .await
            .inspect_err(|err| log_error!("ensure_user failed: {err}"))?;

        if created {
            log_info!("created user document");
        }
        Ok(())
    }

    /// `None` when the user does not exist or the store is unavailable.
    pub async fn get_user(&self, user_id: &str) -> Option<User> {
        let path = match DocPath::new(USERS, user_id) {
            Ok(path) => path,
            Err(err) => {
                log_error!("get_user: {err}");
                return None;
            }
        };
        let id = user_id.to_string();
        match self.transaction(move |tx| tx.get(&path)).await {
            Ok(doc) => doc.map(|doc| User::from_document(&id, &doc.data)),
            Err(err) => {
                log_error!("get_user failed: {err}");
                None
            }
        }
    }

    pub async fn get_user_premium(&self, user_id: &str) -> bool {
        self.get_user(user_id)
            .await
            .map(|user| user.is_premium)
            .unwrap_or(false)
    }

    /// Flips the premium flag, stamping `premiumSince` when granted and
    /// clearing it when revoked.
    pub async fn set_premium(&self, user_id: &str, is_premium: bool) -> Result<(), RemoteError> {
        let path = DocPath::new(USERS, user_id)?;
        self.transaction(move |tx| {
            let now = tx.now_ms();
            let since = if is_premium { Value::from(now) } else { Value::Null };
            tx.update(
                &path,
                crate::fields! {
                    "isPremium" => is_premium,
                    "premiumSince" => since,
                    "updatedAt" => now,
                },
            )?;
            Ok(())
        })
        .await
        .inspect_err(|err| log_error!("set_premium failed: {err}"))?;

        log_info!("premium set to {is_premium}");
        Ok(())
    }

    /// Stores the chosen avatar and clears the other kind.
    pub async fn set_avatar(&self, user_id: &str, avatar: Avatar) -> Result<(), RemoteError> {
        let path = DocPath::new(USERS, user_id)?;
        let (image, emoji) = match avatar {
            Avatar::Image(uri) => (Value::String(uri), Value::Null),
            Avatar::Emoji(emoji) => (Value::Null, Value::String(emoji)),
        };
        self.transaction(move |tx| {
            tx.set(
                &path,
                crate::fields! { "avatar" => image.clone(), "avatarEmoji" => emoji.clone() },
                SetMode::Merge,
            )?;
            Ok(())
        })
        .await
        .inspect_err(|err| log_error!("set_avatar failed: {err}"))
    }

    /// Dashboard numbers; zeroes when the user is missing or unreadable.
    pub async fn get_user_stats(&self, user_id: &str) -> UserStats {
        self.get_user(user_id)
            .await
            .map(|user| user.stats())
            .unwrap_or_default()
    }

    pub async fn watch_user(&self, user_id: &str) -> Result<UserWatch, RemoteError> {
        let path = DocPath::new(USERS, user_id)?;
        let inner = self.watch_document(&path).await?;
        Ok(UserWatch {
            user_id: user_id.to_string(),
            inner,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{models::Avatar, Database};
    use crate::utils::SystemClock;
    use std::sync::Arc;

    fn db() -> Database {
        Database::in_memory(Arc::new(SystemClock)).unwrap()
    }

    #[tokio::test]
    async fn ensure_user_does_not_overwrite_existing_fields() {
        let db = db();
        db.ensure_user("u1", Some("a@b.c")).await.unwrap();
        db.set_premium("u1", true).await.unwrap();
        db.ensure_user("u1", None).await.unwrap();

        let user = db.get_user("u1").await.unwrap();
        assert!(user.is_premium);
        assert!(user.premium_since.is_some());
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
    }

    #[tokio::test]
    async fn revoking_premium_clears_since() {
        let db = db();
        db.ensure_user("u1", None).await.unwrap();
        db.set_premium("u1", true).await.unwrap();
        db.set_premium("u1", false).await.unwrap();

        let user = db.get_user("u1").await.unwrap();
        assert!(!user.is_premium);
        assert_eq!(user.premium_since, None);
    }

    #[tokio::test]
    async fn set_premium_on_missing_user_is_an_error() {
        let db = db();
        assert!(db.set_premium("ghost", true).await.is_err());
        assert!(!db.get_user_premium("ghost").await);
    }

    #[tokio::test]
    async fn avatar_kinds_replace_each_other() {
        let db = db();
        db.ensure_user("u1", None).await.unwrap();
        db.set_avatar("u1", Avatar::Image("file:///a.png".into()))
            .await
            .unwrap();
        db.set_avatar("u1", Avatar::Emoji("🦊".into())).await.unwrap();

        let user = db.get_user("u1").await.unwrap();
        assert_eq!(user.avatar, Some(Avatar::Emoji("🦊".into())));
    }

    #[tokio::test]
    async fn missing_user_reads_as_zero_stats() {
        let db = db();
        assert_eq!(db.get_user_stats("nobody").await, Default::default());
        assert!(db.get_user("nobody").await.is_none());
    }
}
