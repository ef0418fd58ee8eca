use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::log_info;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "identity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("identity provider failed: {0}")]
    Provider(String),
}

/// `Ok(None)` means signed out.
pub type AuthEvent = Result<Option<Identity>, AuthError>;

/// Source of auth-state changes. Each subscriber gets its own stream; a
/// provider that already knows the current identity delivers it first.
pub trait IdentityProvider: Send + Sync {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthEvent>;
    fn sign_out(&self);
}

#[derive(Default)]
struct ProviderState {
    /// `None` until the provider has resolved once.
    current: Option<Option<Identity>>,
    listeners: Vec<mpsc::UnboundedSender<AuthEvent>>,
}

/// In-process identity provider. Starts unresolved, like a hosted auth SDK
/// that has not restored its session yet.
#[derive(Default)]
pub struct LocalIdentityProvider {
    state: Mutex<ProviderState>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that resolves immediately to `identity` for every subscriber.
    pub fn restored(identity: Option<Identity>) -> Self {
        let provider = Self::new();
        provider.lock().current = Some(identity);
        provider
    }

    pub fn sign_in(&self, identity: Identity) {
        log_info!("signed in as {}", identity.uid);
        self.emit(Ok(Some(identity)));
    }

    /// Reports a provider fault to every subscriber.
    pub fn fail(&self, message: impl Into<String>) {
        self.broadcast(Err(AuthError::Provider(message.into())));
    }

    pub fn current(&self) -> Option<Identity> {
        self.lock().current.clone().flatten()
    }

    fn emit(&self, event: AuthEvent) {
        if let Ok(identity) = &event {
            self.lock().current = Some(identity.clone());
        }
        self.broadcast(event);
    }

    fn broadcast(&self, event: AuthEvent) {
        self.lock()
            .listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if let Some(current) = &state.current {
            let _ = tx.send(Ok(current.clone()));
        }
        state.listeners.push(tx);
        rx
    }

    fn sign_out(&self) {
        log_info!("signed out");
        self.emit(Ok(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_subscribers_get_current_identity_first() {
        let provider = LocalIdentityProvider::new();
        let mut early = provider.subscribe();
        assert!(early.try_recv().is_err());

        provider.sign_in(Identity::anonymous("u1"));
        assert_eq!(early.recv().await, Some(Ok(Some(Identity::anonymous("u1")))));

        let mut late = provider.subscribe();
        assert_eq!(late.recv().await, Some(Ok(Some(Identity::anonymous("u1")))));

        provider.sign_out();
        assert_eq!(early.recv().await, Some(Ok(None)));
        assert_eq!(provider.current(), None);
    }

    #[tokio::test]
    async fn faults_do_not_change_current_identity() {
        let provider = LocalIdentityProvider::restored(Some(Identity::anonymous("u1")));
        let mut rx = provider.subscribe();
        rx.recv().await;

        provider.fail("token expired");
        assert!(matches!(rx.recv().await, Some(Err(AuthError::Provider(_)))));
        assert_eq!(provider.current().map(|i| i.uid), Some("u1".into()));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let provider = LocalIdentityProvider::new();
        drop(provider.subscribe());
        provider.sign_out();
        assert!(provider.lock().listeners.is_empty());
    }
}
