use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::utils::Clock;
use crate::log_warn;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "quota";

pub const QUOTA_COOLDOWN_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub active: bool,
    pub seconds_left: u64,
}

/// Cooldown after the AI provider answered 429. Shared by every caller in
/// the process and forgotten on restart.
pub struct QuotaGate {
    clock: Arc<dyn Clock>,
    last_rate_limited_ms: Mutex<Option<i64>>,
}

impl QuotaGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_rate_limited_ms: Mutex::new(None),
        }
    }

    pub fn record_rate_limited(&self) {
        let now = self.clock.now_ms();
        *self
            .last_rate_limited_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);
        log_warn!("rate limited; cooling down for {}s", QUOTA_COOLDOWN_MS / 1000);
    }

    pub fn status(&self) -> QuotaStatus {
        let last = *self
            .last_rate_limited_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(last) = last else {
            return QuotaStatus::default();
        };

        let elapsed = self.clock.now_ms().saturating_sub(last).max(0);
        if elapsed >= QUOTA_COOLDOWN_MS {
            return QuotaStatus::default();
        }
        let remaining_ms = QUOTA_COOLDOWN_MS - elapsed;
        QuotaStatus {
            active: true,
            seconds_left: u64::try_from((remaining_ms + 999) / 1000).unwrap_or_default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status().active
    }
}
