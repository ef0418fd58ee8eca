use serde::Serialize;

use crate::cache::OnboardingState;
use crate::db::User;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    #[default]
    Initializing,
    AuthenticatedLoading,
    AuthenticatedReady,
    Unauthenticated,
}

impl SessionPhase {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            SessionPhase::AuthenticatedReady | SessionPhase::Unauthenticated
        )
    }
}

/// What the UI sees of the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: SessionPhase,
    pub user_id: Option<String>,
    pub user: Option<User>,
    /// Auth still resolving, or the onboarding flag still loading.
    pub loading: bool,
    pub onboarding_done: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    phase: SessionPhase,
    user_id: Option<String>,
    user: Option<User>,
    onboarding: OnboardingState,
}

impl SessionState {
    pub fn new(onboarding: OnboardingState) -> Self {
        Self {
            phase: SessionPhase::Initializing,
            user_id: None,
            user: None,
            onboarding,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            user_id: self.user_id.clone(),
            user: self.user.clone(),
            loading: !self.phase.is_resolved() || self.onboarding.loading,
            onboarding_done: self.onboarding.done,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn begin_identity(&mut self, user_id: &str) {
        self.phase = SessionPhase::AuthenticatedLoading;
        self.user_id = Some(user_id.to_string());
        self.user = None;
    }

    /// First (or later) snapshot of the signed-in user's document. Ignored
    /// when nobody is signed in any more.
    pub fn apply_user_snapshot(&mut self, user: Option<User>) {
        if self.user_id.is_none() {
            return;
        }
        self.user = user;
        self.phase = SessionPhase::AuthenticatedReady;
    }

    /// The live subscription broke; keep whatever user data we have.
    pub fn user_watch_failed(&mut self) {
        if self.phase == SessionPhase::AuthenticatedLoading {
            self.phase = SessionPhase::AuthenticatedReady;
        }
    }

    pub fn sign_out(&mut self) {
        self.phase = SessionPhase::Unauthenticated;
        self.user_id = None;
        self.user = None;
    }

    /// Liveness fallback. Returns `true` when it changed anything.
    pub fn force_auth_resolved(&mut self) -> bool {
        match self.phase {
            SessionPhase::Initializing => {
                self.phase = SessionPhase::Unauthenticated;
                true
            }
            SessionPhase::AuthenticatedLoading => {
                self.phase = SessionPhase::AuthenticatedReady;
                true
            }
            _ => false,
        }
    }

    pub fn set_onboarding(&mut self, onboarding: OnboardingState) {
        self.onboarding = onboarding;
    }
}
