//! Timer engine implementation.
//!
//! The timer engine is a one-tick-per-second state machine. It does not own
//! a thread or a clock - the caller is responsible for calling `tick()` once
//! per elapsed second while the engine is running (see
//! [`TimerService`](super::TimerService) for the scheduled driver).
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --start--> Running
//!   ^                |                  |
//!   +---reset/mode---+------------------+
//!   +---natural completion (no auto-continue)
//! ```
//!
//! The run state is orthogonal to the [`TimerMode`]; every transition above
//! applies uniformly across focus, short break and long break.
//!
//! ## Usage
//!
//! ```
//! use tomatick_core::{TimerEngine, TimerSettings, TimerState};
//!
//! let mut engine = TimerEngine::new(TimerSettings::default());
//! engine.start();
//! engine.tick();
//! assert_eq!(engine.state(), TimerState::Running);
//! assert_eq!(engine.display(), "24:59");
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cue::{CompletionCue, SilentCue};
use super::mode::TimerMode;
use super::settings::{SettingsPatch, TimerSettings};
use crate::events::Event;
use crate::format::format_mm_ss;
use crate::session::{Session, SessionLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    /// Stopped mid-countdown; remaining time and the open session are kept.
    Paused,
}

/// Read-only view of the engine, re-derivable at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub state: TimerState,
    pub time_remaining_seconds: u64,
    pub total_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub completed_focus_count: u64,
    pub focus_intervals_until_long_break: u32,
    /// 0.0 .. 1.0 progress within the current countdown.
    pub progress: f64,
    /// `mm:ss` rendering of the remaining time.
    pub display: String,
    pub title: String,
}

/// Core timer engine.
///
/// Owns the settings, the countdown state, the in-progress session and the
/// session log. All mutation goes through the command methods.
pub struct TimerEngine {
    settings: TimerSettings,
    mode: TimerMode,
    state: TimerState,
    remaining_secs: u64,
    completed_focus_count: u64,
    focus_intervals_until_long_break: u32,
    current_session: Option<Session>,
    history: SessionLog,
    cue: Arc<dyn CompletionCue>,
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("settings", &self.settings)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("remaining_secs", &self.remaining_secs)
            .field("completed_focus_count", &self.completed_focus_count)
            .field(
                "focus_intervals_until_long_break",
                &self.focus_intervals_until_long_break,
            )
            .field("current_session", &self.current_session)
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl TimerEngine {
    /// Create an idle engine in focus mode with an empty history.
    pub fn new(settings: TimerSettings) -> Self {
        let settings = settings.normalized();
        Self {
            mode: TimerMode::Focus,
            state: TimerState::Idle,
            remaining_secs: settings.duration_secs(TimerMode::Focus),
            completed_focus_count: 0,
            focus_intervals_until_long_break: settings.long_break_interval,
            current_session: None,
            history: SessionLog::new(),
            cue: Arc::new(SilentCue),
            settings,
        }
    }

    /// Seed the engine with previously persisted history.
    pub fn with_history(mut self, history: SessionLog) -> Self {
        self.history = history;
        self
    }

    pub fn with_cue(mut self, cue: Arc<dyn CompletionCue>) -> Self {
        self.cue = cue;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.settings.duration_secs(self.mode)
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }

    pub fn completed_focus_count(&self) -> u64 {
        self.completed_focus_count
    }

    pub fn focus_intervals_until_long_break(&self) -> u32 {
        self.focus_intervals_until_long_break
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current_session.as_ref()
    }

    pub fn history(&self) -> &SessionLog {
        &self.history
    }

    /// Remaining time as `mm:ss`.
    pub fn display(&self) -> String {
        format_mm_ss(self.remaining_secs)
    }

    /// 0.0 .. 1.0 progress within the current countdown.
    pub fn progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        (1.0 - self.remaining_secs as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            state: self.state,
            time_remaining_seconds: self.remaining_secs,
            total_seconds: self.total_secs(),
            is_running: self.is_running(),
            is_paused: self.is_paused(),
            completed_focus_count: self.completed_focus_count,
            focus_intervals_until_long_break: self.focus_intervals_until_long_break,
            progress: self.progress(),
            display: self.display(),
            title: self.mode.title().to_string(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh countdown from idle, or resume a paused one.
    ///
    /// Returns `None` when already running.
    pub fn start(&mut self) -> Option<Event> {
        self.start_at(Utc::now())
    }

    /// Valid only while running. Remaining time and the open session are kept.
    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.state = TimerState::Paused;
        debug!(mode = %self.mode, remaining_secs = self.remaining_secs, "timer paused");
        Some(Event::TimerPaused {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Drop any open session and refill the current mode's countdown.
    pub fn reset(&mut self) -> Vec<Event> {
        let now = Utc::now();
        let mut events = Vec::with_capacity(2);
        events.extend(self.discard_session(now));
        self.state = TimerState::Idle;
        self.remaining_secs = self.total_secs();
        debug!(mode = %self.mode, "timer reset");
        events.push(Event::TimerReset {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: now,
        });
        events
    }

    /// Switch to `mode`, dropping any open session. The engine ends up idle.
    pub fn change_mode(&mut self, mode: TimerMode) -> Vec<Event> {
        let now = Utc::now();
        let mut events = Vec::with_capacity(2);
        events.extend(self.discard_session(now));
        let from = self.mode;
        self.mode = mode;
        self.state = TimerState::Idle;
        self.remaining_secs = self.total_secs();
        debug!(%from, to = %mode, "mode changed");
        events.push(Event::ModeChanged {
            from,
            to: mode,
            remaining_secs: self.remaining_secs,
            at: now,
        });
        events
    }

    /// Merge `patch` into the settings.
    ///
    /// If the active mode's duration changes, the countdown is reset so the
    /// remaining time reflects it. Other duration edits take effect the next
    /// time their mode becomes active.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Vec<Event> {
        let updated = self.settings.merged(patch);
        let active_changed = updated.duration_secs(self.mode) != self.total_secs();
        self.settings = updated;

        // Keep the countdown to the next long break within the new interval.
        if self.focus_intervals_until_long_break > self.settings.long_break_interval {
            self.focus_intervals_until_long_break = self.settings.long_break_interval;
        }

        let mut events = if active_changed { self.reset() } else { Vec::new() };
        debug!(timer_reset = active_changed, "settings updated");
        events.push(Event::SettingsUpdated {
            settings: self.settings.clone(),
            timer_reset: active_changed,
            at: Utc::now(),
        });
        events
    }

    /// Remove a session from history.
    pub fn delete_session(&mut self, id: Uuid) -> Option<Event> {
        self.history.delete(id)?;
        debug!(session_id = %id, "session deleted");
        Some(Event::SessionDeleted {
            session_id: id,
            at: Utc::now(),
        })
    }

    /// Advance the countdown by one second.
    ///
    /// Does nothing unless running. On the final second the open session is
    /// logged, the mode advances and, if the settings allow, the next
    /// countdown starts straight away.
    pub fn tick(&mut self) -> Vec<Event> {
        if self.state != TimerState::Running {
            return Vec::new();
        }
        if self.remaining_secs > 1 {
            self.remaining_secs -= 1;
            return vec![Event::Tick {
                mode: self.mode,
                remaining_secs: self.remaining_secs,
            }];
        }
        self.complete(Utc::now())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn start_at(&mut self, now: DateTime<Utc>) -> Option<Event> {
        match self.state {
            TimerState::Running => None,
            TimerState::Paused => {
                self.state = TimerState::Running;
                debug!(mode = %self.mode, remaining_secs = self.remaining_secs, "timer resumed");
                Some(Event::TimerResumed {
                    mode: self.mode,
                    remaining_secs: self.remaining_secs,
                    at: now,
                })
            }
            TimerState::Idle => {
                let duration_secs = self.total_secs();
                let session = Session::begin(self.mode, duration_secs, now);
                let session_id = session.id;
                self.current_session = Some(session);
                self.state = TimerState::Running;
                debug!(mode = %self.mode, %session_id, "timer started");
                Some(Event::TimerStarted {
                    mode: self.mode,
                    session_id,
                    duration_secs,
                    at: now,
                })
            }
        }
    }

    fn discard_session(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let session = self.current_session.take()?;
        debug!(session_id = %session.id, mode = %session.mode, "session discarded");
        Some(Event::SessionDiscarded {
            session_id: session.id,
            mode: session.mode,
            at: now,
        })
    }

    fn complete(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let finished = self.mode;
        self.state = TimerState::Idle;
        self.remaining_secs = 0;

        if self.settings.sound_enabled {
            if let Err(e) = self.cue.play(finished) {
                warn!(error = %e, "completion cue failed");
            }
        }

        let session = self
            .current_session
            .take()
            .unwrap_or_else(|| Session::begin(finished, self.total_secs(), now))
            .finish(now);
        self.history.append(session.clone());

        let next_mode = match finished {
            TimerMode::Focus => {
                self.completed_focus_count += 1;
                let left = self.focus_intervals_until_long_break.saturating_sub(1);
                if left == 0 {
                    self.focus_intervals_until_long_break = self.settings.long_break_interval;
                    TimerMode::LongBreak
                } else {
                    self.focus_intervals_until_long_break = left;
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
        };

        self.mode = next_mode;
        self.remaining_secs = self.total_secs();

        let auto_continue = match finished {
            TimerMode::Focus => self.settings.auto_start_breaks,
            TimerMode::ShortBreak | TimerMode::LongBreak => self.settings.auto_start_pomodoros,
        };

        info!(
            completed = %finished,
            next = %next_mode,
            completed_focus_count = self.completed_focus_count,
            auto_continue,
            "countdown completed"
        );

        let mut events = vec![Event::TimerCompleted {
            session,
            next_mode,
            completed_focus_count: self.completed_focus_count,
            auto_continued: auto_continue,
            at: now,
        }];
        if auto_continue {
            events.extend(self.start_at(now));
        }
        events
    }
}
