use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::cache::{OnboardingStore, Subscription, TaskStore};
use crate::db::{Database, RemoteError};
use crate::{log_error, log_info, log_warn};

use super::{
    auth_loop::auth_loop,
    identity::IdentityProvider,
    state::{SessionState, SessionView},
};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "session";

/// Upper bound on how long the session may sit unresolved.
pub const AUTH_FALLBACK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no user is signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Collaborators the controller reads from and writes to.
#[derive(Clone)]
pub struct SessionDeps {
    pub db: Database,
    pub identity: Arc<dyn IdentityProvider>,
    pub onboarding: Arc<OnboardingStore>,
    pub tasks: Arc<TaskStore>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub auth_timeout: Duration,
    /// Run the development reset once during start.
    pub dev_reset: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auth_timeout: AUTH_FALLBACK_TIMEOUT,
            dev_reset: false,
        }
    }
}

/// Reconciles the identity provider with the live user document and the
/// onboarding flag into one [`SessionView`].
pub struct SessionController {
    deps: SessionDeps,
    state: Mutex<SessionState>,
    view_tx: watch::Sender<SessionView>,
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    onboarding_sub: Mutex<Option<Subscription>>,
    dev_reset_done: AtomicBool,
}

impl SessionController {
    pub async fn start(deps: SessionDeps, options: SessionOptions) -> Arc<Self> {
        let state = SessionState::new(deps.onboarding.state());
        let (view_tx, _) = watch::channel(state.view());

        let controller = Arc::new(Self {
            deps,
            state: Mutex::new(state),
            view_tx,
            cancel_token: CancellationToken::new(),
            handle: Mutex::new(None),
            onboarding_sub: Mutex::new(None),
            dev_reset_done: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&controller);
        let subscription = controller.deps.onboarding.subscribe(move || {
            if let Some(controller) = weak.upgrade() {
                controller.refresh_onboarding();
            }
        });
        *lock(&controller.onboarding_sub) = Some(subscription);

        let events = controller.deps.identity.subscribe();

        if controller.deps.onboarding.state().loading {
            controller.deps.onboarding.init().await;
        }
        if options.dev_reset {
            controller.run_dev_reset().await;
        }

        let handle = tokio::spawn(auth_loop(
            Arc::clone(&controller),
            events,
            options.auth_timeout,
            controller.cancel_token.clone(),
        ));
        *lock(&controller.handle) = Some(handle);

        controller
    }

    pub fn view(&self) -> SessionView {
        self.view_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    pub fn user_id(&self) -> Option<String> {
        lock(&self.state).user_id().map(str::to_string)
    }

    pub async fn set_onboarding_done(&self, done: bool) {
        self.deps.onboarding.set_done(done).await;
    }

    /// Writes the premium flag of the signed-in user. The live subscription
    /// brings the change back into the view.
    pub async fn set_premium(&self, is_premium: bool) -> Result<(), SessionError> {
        let user_id = self.user_id().ok_or(SessionError::NotAuthenticated)?;
        self.deps.db.set_premium(&user_id, is_premium).await?;
        log_info!("premium set to {is_premium} for {user_id}");
        Ok(())
    }

    /// Development reset: onboarding off, sign out, wipe local tasks. Runs
    /// at most once per controller; returns whether this call ran it.
    pub async fn run_dev_reset(&self) -> bool {
        if self
            .dev_reset_done
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        log_warn!("development reset: clearing onboarding, identity and local tasks");
        self.deps.onboarding.set_done(false).await;
        self.deps.identity.sign_out();
        let removed = self.deps.tasks.clear().await;
        log_info!("development reset removed {removed} local tasks");
        true
    }

    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        lock(&self.onboarding_sub).take();
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                log_error!("session loop failed to join: {err}");
            }
        }
    }

    pub(super) fn db(&self) -> &Database {
        &self.deps.db
    }

    /// Applies `change` and publishes the resulting view.
    pub(super) fn update<R>(&self, change: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = lock(&self.state);
        let result = change(&mut state);
        self.view_tx.send_replace(state.view());
        result
    }

    fn refresh_onboarding(&self) {
        let onboarding = self.deps.onboarding.state();
        self.update(|state| state.set_onboarding(onboarding));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
