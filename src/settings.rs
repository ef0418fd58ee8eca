use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::log_warn;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "settings";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_PROVIDER: &str = "GEMINI";

pub const ENV_DATA_DIR: &str = "ODAKI_DATA_DIR";
pub const ENV_AI_PROVIDER: &str = "ODAKI_AI_PROVIDER";
pub const ENV_GEMINI_API_KEY: &str = "ODAKI_GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "ODAKI_GEMINI_MODEL";
pub const ENV_ALWAYS_REQUIRE_LOGIN: &str = "ODAKI_ALWAYS_REQUIRE_LOGIN";

const DEFAULT_DATA_DIR: &str = "odaki-data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
        }
    }
}

impl AiSettings {
    /// The Gemini key, if the provider is switched to Gemini and a non-blank
    /// key is present.
    pub fn gemini_key(&self) -> Option<&str> {
        if !self.provider.eq_ignore_ascii_case(GEMINI_PROVIDER) {
            return None;
        }
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DevSettings {
    /// Wipes onboarding, identity and local tasks once per process at startup.
    pub always_require_login: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    ai: AiSettings,
    dev: DevSettings,
}

/// Values read from the environment. They win over the file but are never
/// written back to it.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    ai_provider: Option<String>,
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    always_require_login: Option<bool>,
}

impl EnvOverrides {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            ai_provider: non_empty(ENV_AI_PROVIDER),
            gemini_api_key: non_empty(ENV_GEMINI_API_KEY),
            gemini_model: non_empty(ENV_GEMINI_MODEL),
            always_require_login: lookup(ENV_ALWAYS_REQUIRE_LOGIN).map(|value| parse_flag(&value)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Where settings, the key-value cache and the document database live.
pub fn data_dir() -> PathBuf {
    env::var(ENV_DATA_DIR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
    env: EnvOverrides,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::with_env(path, |key| env::var(key).ok())
    }

    pub fn with_env(path: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("ignoring unreadable {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            env: EnvOverrides::from_lookup(lookup),
        })
    }

    pub fn ai(&self) -> AiSettings {
        let mut ai = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ai
            .clone();
        if let Some(provider) = &self.env.ai_provider {
            ai.provider = provider.clone();
        }
        if let Some(key) = &self.env.gemini_api_key {
            ai.gemini_api_key = Some(key.clone());
        }
        if let Some(model) = &self.env.gemini_model {
            ai.gemini_model = model.clone();
        }
        ai
    }

    pub fn dev(&self) -> DevSettings {
        let mut dev = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dev
            .clone();
        if let Some(flag) = self.env.always_require_login {
            dev.always_require_login = flag;
        }
        dev
    }

    pub fn update_ai(&self, settings: AiSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.ai = settings;
        self.persist(&guard)
    }

    pub fn update_dev(&self, settings: DevSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.dev = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
