pub mod controller;
pub mod state;

pub use controller::{FocusTimer, TimerError, TimerSnapshot};
pub use state::{TimerState, TimerStatus};
