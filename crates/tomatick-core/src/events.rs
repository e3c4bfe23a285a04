use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::Session;
use crate::timer::{TimerMode, TimerSettings};

/// Every state change in the engine produces an Event.
/// Presentation layers subscribe to them; they never mutate the engine directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A fresh countdown began and opened a new session.
    TimerStarted {
        mode: TimerMode,
        session_id: Uuid,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ModeChanged {
        from: TimerMode,
        to: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// An in-progress session was dropped without being logged.
    SessionDiscarded {
        session_id: Uuid,
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    Tick {
        mode: TimerMode,
        remaining_secs: u64,
    },
    /// A countdown reached zero; `session` has been appended to the log.
    TimerCompleted {
        session: Session,
        next_mode: TimerMode,
        completed_focus_count: u64,
        auto_continued: bool,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: TimerSettings,
        timer_reset: bool,
        at: DateTime<Utc>,
    },
    SessionDeleted {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerResumed { .. } => "timer_resumed",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerReset { .. } => "timer_reset",
            Event::ModeChanged { .. } => "mode_changed",
            Event::SessionDiscarded { .. } => "session_discarded",
            Event::Tick { .. } => "tick",
            Event::TimerCompleted { .. } => "timer_completed",
            Event::SettingsUpdated { .. } => "settings_updated",
            Event::SessionDeleted { .. } => "session_deleted",
        }
    }
}
