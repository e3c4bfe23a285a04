mod cue;
mod engine;
mod mode;
mod service;
mod settings;

pub use cue::{CompletionCue, SilentCue, TerminalBell};
pub use engine::{TimerEngine, TimerSnapshot, TimerState};
pub use mode::TimerMode;
pub use service::TimerService;
pub use settings::{
    SettingsPatch, TimerSettings, MAX_DURATION_MINUTES, MAX_LONG_BREAK_INTERVAL,
    MIN_DURATION_MINUTES, MIN_LONG_BREAK_INTERVAL,
};
