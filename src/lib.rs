pub mod ai;
pub mod cache;
pub mod db;
pub mod session;
pub mod settings;
pub mod storage;
pub mod timer;
pub mod utils;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};

use ai::{AiService, GeminiClient, QuotaGate};
use cache::{AchievementStore, FriendStore, OnboardingStore, TaskStore};
use db::{Database, DEFAULT_RECENT_SESSIONS};
use session::{
    Identity, IdentityProvider, LocalIdentityProvider, SessionController, SessionDeps,
    SessionOptions, AUTH_FALLBACK_TIMEOUT,
};
use settings::SettingsStore;
use storage::{device_user_id, FileStorage, KeyValueStorage};
use timer::FocusTimer;
use utils::{init_logging, Clock, SystemClock};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "app";

const DATABASE_FILE: &str = "odaki.sqlite3";
const SETTINGS_FILE: &str = "settings.json";
const STORAGE_DIR: &str = "storage";

/// Every service of the app, constructed once and shared by reference.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: Arc<SettingsStore>,
    pub storage: Arc<dyn KeyValueStorage>,
    pub db: Database,
    pub tasks: Arc<TaskStore>,
    pub achievements: Arc<AchievementStore>,
    pub friends: Arc<FriendStore>,
    pub onboarding: Arc<OnboardingStore>,
    pub quota: Arc<QuotaGate>,
    pub ai: Arc<AiService<GeminiClient>>,
    pub timer: FocusTimer,
    pub session: Arc<SessionController>,
}

impl AppState {
    pub async fn bootstrap(
        data_dir: &Path,
        settings: SettingsStore,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = Arc::new(settings);
        let storage: Arc<dyn KeyValueStorage> =
            Arc::new(FileStorage::new(data_dir.join(STORAGE_DIR))?);
        let db = Database::new(data_dir.join(DATABASE_FILE), Arc::clone(&clock))?;

        let tasks = Arc::new(TaskStore::new(Arc::clone(&storage), Arc::clone(&clock)));
        let achievements = Arc::new(AchievementStore::new(Arc::clone(&storage)));
        let friends = Arc::new(FriendStore::new(Arc::clone(&storage)));
        let onboarding = Arc::new(OnboardingStore::new(Arc::clone(&storage)));

        let quota = Arc::new(QuotaGate::new(Arc::clone(&clock)));
        let ai = Arc::new(AiService::from_settings(
            &settings.ai(),
            db.clone(),
            Arc::clone(&quota),
        )?);
        let timer = FocusTimer::new(db.clone());

        let session = SessionController::start(
            SessionDeps {
                db: db.clone(),
                identity,
                onboarding: Arc::clone(&onboarding),
                tasks: Arc::clone(&tasks),
            },
            SessionOptions {
                dev_reset: settings.dev().always_require_login,
                ..SessionOptions::default()
            },
        )
        .await;

        log_info!("services ready in {}", data_dir.display());
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            settings,
            storage,
            db,
            tasks,
            achievements,
            friends,
            onboarding,
            quota,
            ai,
            timer,
            session,
        })
    }

    pub async fn shutdown(&self) {
        self.session.shutdown().await;
        log_info!("shut down");
    }
}

pub fn run() {
    init_logging();
    log_info!("Odaki starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log_error!("failed to start async runtime: {err}");
            return;
        }
    };

    if let Err(err) = runtime.block_on(run_app()) {
        log_error!("error while running odaki: {err:#}");
    }
}

async fn run_app() -> Result<()> {
    let data_dir = settings::data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

    let identity = Arc::new(LocalIdentityProvider::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::bootstrap(&data_dir, settings, identity.clone(), clock).await?;

    let device_id = device_user_id(state.storage.as_ref())?;
    identity.sign_in(Identity::anonymous(device_id));

    let mut views = state.session.watch();
    let settled = tokio::time::timeout(AUTH_FALLBACK_TIMEOUT + Duration::from_secs(1), async {
        views
            .wait_for(|view| !view.loading && view.user.is_some())
            .await
            .map(|view| view.clone())
    })
    .await;

    match settled {
        Ok(Ok(view)) => {
            log_info!("session {:?} for {:?}", view.phase, view.user_id);
            if let Some(user_id) = view.user_id.as_deref() {
                let is_premium = view.user.as_ref().is_some_and(|user| user.is_premium);
                let stats = state.db.get_user_stats(user_id).await;
                let recent = state.db.list_recent_sessions(user_id, DEFAULT_RECENT_SESSIONS).await;
                let quota = state.ai.daily_quota(user_id, is_premium).await;
                log_info!(
                    "{} focus minutes, streak {}, {} recent sessions, {} AI requests today",
                    stats.total_focus_minutes,
                    stats.streak,
                    recent.len(),
                    quota.used
                );
            }
        }
        Ok(Err(_)) => log_warn!("session closed before it settled"),
        Err(_) => log_warn!("session did not settle; current view {:?}", state.session.view().phase),
    }

    log_info!("{} local tasks", state.tasks.get_all().await.len());
    state.shutdown().await;
    Ok(())
}
