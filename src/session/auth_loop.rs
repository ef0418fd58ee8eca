use std::{future, sync::Arc, time::Duration};

use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;

use crate::db::{User, UserWatch, WatchClosed};
use crate::{log_error, log_info, log_warn};

use super::{controller::SessionController, identity::AuthEvent};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "session";

/// Drives the session state machine until cancelled: auth events, the live
/// user document and the one-shot liveness fallback.
pub(super) async fn auth_loop(
    controller: Arc<SessionController>,
    mut events: mpsc::UnboundedReceiver<AuthEvent>,
    auth_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let fallback = time::sleep(auth_timeout);
    tokio::pin!(fallback);
    let mut fallback_armed = true;
    let mut events_open = true;
    let mut user_watch: Option<UserWatch> = None;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("session loop shutting down");
                break;
            }
            _ = &mut fallback, if fallback_armed => {
                fallback_armed = false;
                if controller.update(|state| state.force_auth_resolved()) {
                    log_warn!("auth did not resolve within {:?}, continuing", auth_timeout);
                }
            }
            event = events.recv(), if events_open => match event {
                Some(Ok(Some(identity))) => {
                    drop(user_watch.take());
                    controller.update(|state| state.begin_identity(&identity.uid));
                    user_watch = open_user_watch(&controller, &identity.uid, identity.email.as_deref()).await;
                }
                Some(Ok(None)) => {
                    user_watch = None;
                    controller.update(|state| state.sign_out());
                }
                Some(Err(err)) => {
                    log_error!("{err}; treating as signed out");
                    user_watch = None;
                    controller.update(|state| state.sign_out());
                }
                None => {
                    log_warn!("identity stream ended");
                    events_open = false;
                }
            },
            snapshot = next_user(&mut user_watch) => match snapshot {
                Ok(user) => controller.update(|state| state.apply_user_snapshot(user)),
                Err(WatchClosed) => {
                    log_warn!("user subscription closed");
                    user_watch = None;
                    controller.update(|state| state.user_watch_failed());
                }
            },
        }
    }
}

async fn open_user_watch(
    controller: &SessionController,
    user_id: &str,
    email: Option<&str>,
) -> Option<UserWatch> {
    let db = controller.db();
    if let Err(err) = db.ensure_user(user_id, email).await {
        log_error!("ensure_user failed for {user_id}: {err}");
    }
    match db.watch_user(user_id).await {
        Ok(watch) => Some(watch),
        Err(err) => {
            log_error!("could not subscribe to user {user_id}: {err}");
            controller.update(|state| state.user_watch_failed());
            None
        }
    }
}

async fn next_user(watch: &mut Option<UserWatch>) -> Result<Option<User>, WatchClosed> {
    match watch {
        Some(watch) => watch.next().await,
        None => future::pending().await,
    }
}
