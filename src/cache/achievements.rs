use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStorage, ACHIEVEMENTS_KEY};

use super::notifier::Subscription;
use super::store::{CacheStore, CachedRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub progress: u32,
    pub total: u32,
    pub rarity: String,
    #[serde(default)]
    pub locked: bool,
}

impl Achievement {
    /// Progress as a whole percent, clamped to 0..=100. A zero total reads as 0.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let ratio = f64::from(self.progress) / f64::from(self.total);
        (ratio * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

impl CachedRecord for Achievement {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Achievements only ever move from locked to unlocked.
pub struct AchievementStore {
    inner: CacheStore<Achievement>,
}

impl AchievementStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            inner: CacheStore::new("achievements", ACHIEVEMENTS_KEY, storage),
        }
    }

    pub async fn get_all(&self) -> Vec<Achievement> {
        self.inner.get_all().await
    }

    pub async fn add(&self, achievement: Achievement) {
        self.inner.add_with(|_| achievement).await;
    }

    /// Unlocks one achievement. Returns whether anything changed.
    pub async fn unlock(&self, id: &str) -> bool {
        self.inner
            .modify_all(|items| match items.iter_mut().find(|a| a.id == id) {
                Some(achievement) if achievement.locked => {
                    achievement.locked = false;
                    true
                }
                _ => false,
            })
            .await
    }

    pub async fn unlock_all(&self) -> bool {
        self.inner
            .modify_all(|items| {
                let mut changed = false;
                for achievement in items.iter_mut().filter(|a| a.locked) {
                    achievement.locked = false;
                    changed = true;
                }
                changed
            })
            .await
    }

    /// Share of unlocked achievements, rounded to a whole percent.
    pub async fn percent_unlocked(&self) -> u32 {
        let items = self.inner.get_all().await;
        if items.is_empty() {
            return 0;
        }
        let unlocked = items.iter().filter(|a| !a.locked).count();
        ((unlocked as f64 / items.len() as f64) * 100.0).round() as u32
    }

    pub async fn seed_demo(&self) {
        let demo = [
            ("a1", "İlk Görev", 1, 1, "Yaygın", false),
            ("a2", "5 Gün Seri", 3, 5, "Nadir", true),
            ("a3", "10 Görev Tamamla", 7, 10, "Epik", true),
        ];
        let items = demo
            .into_iter()
            .map(|(id, title, progress, total, rarity, locked)| Achievement {
                id: id.into(),
                title: title.into(),
                progress,
                total,
                rarity: rarity.into(),
                locked,
            })
            .collect();
        self.inner.replace_all(items).await;
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }
}
