use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::storage::{KeyValueStorage, ONBOARDING_KEY};
use crate::log_warn;

use super::notifier::{ChangeNotifier, Subscription};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "onboarding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    pub done: bool,
    pub loading: bool,
}

/// Persisted "has the user finished onboarding" flag.
///
/// Starts out loading; [`OnboardingStore::init`] or the first
/// [`OnboardingStore::set_done`] resolves it.
pub struct OnboardingStore {
    storage: Arc<dyn KeyValueStorage>,
    state: Mutex<OnboardingState>,
    notifier: ChangeNotifier,
}

impl OnboardingStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            state: Mutex::new(OnboardingState {
                done: false,
                loading: true,
            }),
            notifier: ChangeNotifier::new(),
        }
    }

    pub async fn init(&self) {
        let done = match self.storage.get_item(ONBOARDING_KEY) {
            Ok(raw) => raw.as_deref() == Some("true"),
            Err(err) => {
                log_warn!("read failed: {err:#}");
                false
            }
        };
        self.replace(OnboardingState {
            done,
            loading: false,
        });
    }

    pub fn state(&self) -> OnboardingState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persists and publishes the flag. A failed write still updates memory.
    pub async fn set_done(&self, done: bool) {
        let raw = if done { "true" } else { "false" };
        if let Err(err) = self.storage.set_item(ONBOARDING_KEY, raw) {
            log_warn!("write failed: {err:#}");
        }
        self.replace(OnboardingState {
            done,
            loading: false,
        });
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    fn replace(&self, next: OnboardingState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        self.notifier.notify();
    }
}
