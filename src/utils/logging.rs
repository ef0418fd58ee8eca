//! Conditional, tagged logging macros.
//!
//! Each module that uses them defines two consts:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! const LOG_TAG: &str = "tasks";
//! ```
//! and every line comes out as `[tasks] message`, so one store's chatter can be
//! silenced without touching `RUST_LOG`.

/// Initializes the global logger from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

/// Errors are the one level we never want to lose: they are emitted even when
/// the module has `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        {
            let _ = ENABLE_LOGS;
            log::error!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}
