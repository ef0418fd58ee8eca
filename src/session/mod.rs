//! Who is signed in, what their user document says, and whether onboarding
//! is finished.

mod auth_loop;
pub mod controller;
pub mod identity;
pub mod state;

pub use controller::{
    SessionController, SessionDeps, SessionError, SessionOptions, AUTH_FALLBACK_TIMEOUT,
};
pub use identity::{AuthError, AuthEvent, Identity, IdentityProvider, LocalIdentityProvider};
pub use state::{SessionPhase, SessionView};
