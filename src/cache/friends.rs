use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStorage, FRIENDS_KEY};

use super::notifier::Subscription;
use super::store::{CacheStore, CachedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FriendStatus {
    Friend,
    Online,
    RequestIn,
    RequestOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub id: String,
    pub name: String,
    pub status: FriendStatus,
}

impl CachedRecord for Friend {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct FriendStore {
    inner: CacheStore<Friend>,
}

impl FriendStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            inner: CacheStore::new("friends", FRIENDS_KEY, storage),
        }
    }

    pub async fn get_all(&self) -> Vec<Friend> {
        self.inner.get_all().await
    }

    pub async fn add(&self, friend: Friend) {
        self.inner.add_with(|_| friend).await;
    }

    pub async fn seed_demo(&self) {
        let demo = [
            ("u1", "Ayşe Y.", FriendStatus::Online),
            ("u2", "Mehmet K.", FriendStatus::Friend),
            ("r1", "Gelen İstek - Ali", FriendStatus::RequestIn),
        ];
        let friends = demo
            .into_iter()
            .map(|(id, name, status)| Friend {
                id: id.into(),
                name: name.into(),
                status,
            })
            .collect();
        self.inner.replace_all(friends).await;
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn status_uses_kebab_case_on_disk() {
        let storage = Arc::new(MemoryStorage::new());
        let friends = FriendStore::new(storage.clone());
        friends.seed_demo().await;
        friends
            .add(Friend {
                id: "o1".into(),
                name: "Giden".into(),
                status: FriendStatus::RequestOut,
            })
            .await;

        let blob = storage.raw(FRIENDS_KEY).unwrap();
        assert!(blob.contains("\"request-in\""));
        assert!(blob.contains("\"request-out\""));
        assert_eq!(friends.get_all().await[0].id, "o1");
    }
}
