//! User-editable timer settings.
//!
//! Values are clamped into range at the boundary, so an engine never holds
//! a zero duration or a zero long-break interval.

use serde::{Deserialize, Serialize};

use super::mode::TimerMode;

pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;
pub const MIN_LONG_BREAK_INTERVAL: u32 = 1;
pub const MAX_LONG_BREAK_INTERVAL: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_focus_minutes", alias = "pomodoro")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break_minutes", alias = "shortBreak")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes", alias = "longBreak")]
    pub long_break_minutes: u32,
    /// Completed focus intervals before a long break.
    #[serde(default = "default_long_break_interval", alias = "longBreakInterval")]
    pub long_break_interval: u32,
    #[serde(default = "default_true", alias = "autoStartBreaks")]
    pub auto_start_breaks: bool,
    #[serde(default = "default_true", alias = "autoStartPomodoros")]
    pub auto_start_pomodoros: bool,
    #[serde(default = "default_true", alias = "soundEnabled")]
    pub sound_enabled: bool,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_long_break_interval(),
            auto_start_breaks: true,
            auto_start_pomodoros: true,
            sound_enabled: true,
        }
    }
}

impl TimerSettings {
    /// Full countdown length for `mode`, in seconds.
    pub fn duration_secs(&self, mode: TimerMode) -> u64 {
        let minutes = match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        };
        u64::from(minutes).saturating_mul(60)
    }

    /// Clamp every field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.focus_minutes = clamp_duration(self.focus_minutes);
        self.short_break_minutes = clamp_duration(self.short_break_minutes);
        self.long_break_minutes = clamp_duration(self.long_break_minutes);
        self.long_break_interval = self
            .long_break_interval
            .clamp(MIN_LONG_BREAK_INTERVAL, MAX_LONG_BREAK_INTERVAL);
        self
    }

    /// Merge a patch, clamping the result.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.focus_minutes {
            next.focus_minutes = v;
        }
        if let Some(v) = patch.short_break_minutes {
            next.short_break_minutes = v;
        }
        if let Some(v) = patch.long_break_minutes {
            next.long_break_minutes = v;
        }
        if let Some(v) = patch.long_break_interval {
            next.long_break_interval = v;
        }
        if let Some(v) = patch.auto_start_breaks {
            next.auto_start_breaks = v;
        }
        if let Some(v) = patch.auto_start_pomodoros {
            next.auto_start_pomodoros = v;
        }
        if let Some(v) = patch.sound_enabled {
            next.sound_enabled = v;
        }
        next.normalized()
    }
}

fn clamp_duration(minutes: u32) -> u32 {
    minutes.clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES)
}

/// Partial settings update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    #[serde(alias = "pomodoro")]
    pub focus_minutes: Option<u32>,
    #[serde(alias = "shortBreak")]
    pub short_break_minutes: Option<u32>,
    #[serde(alias = "longBreak")]
    pub long_break_minutes: Option<u32>,
    #[serde(alias = "longBreakInterval")]
    pub long_break_interval: Option<u32>,
    #[serde(alias = "autoStartBreaks")]
    pub auto_start_breaks: Option<bool>,
    #[serde(alias = "autoStartPomodoros")]
    pub auto_start_pomodoros: Option<bool>,
    #[serde(alias = "soundEnabled")]
    pub sound_enabled: Option<bool>,
}

impl SettingsPatch {
    /// A patch that replaces every field with `settings`.
    pub fn from_settings(settings: &TimerSettings) -> Self {
        Self {
            focus_minutes: Some(settings.focus_minutes),
            short_break_minutes: Some(settings.short_break_minutes),
            long_break_minutes: Some(settings.long_break_minutes),
            long_break_interval: Some(settings.long_break_interval),
            auto_start_breaks: Some(settings.auto_start_breaks),
            auto_start_pomodoros: Some(settings.auto_start_pomodoros),
            sound_enabled: Some(settings.sound_enabled),
        }
    }

    pub fn focus_minutes(mut self, minutes: u32) -> Self {
        self.focus_minutes = Some(minutes);
        self
    }

    pub fn short_break_minutes(mut self, minutes: u32) -> Self {
        self.short_break_minutes = Some(minutes);
        self
    }

    pub fn long_break_minutes(mut self, minutes: u32) -> Self {
        self.long_break_minutes = Some(minutes);
        self
    }

    pub fn long_break_interval(mut self, interval: u32) -> Self {
        self.long_break_interval = Some(interval);
        self
    }

    pub fn auto_start_breaks(mut self, enabled: bool) -> Self {
        self.auto_start_breaks = Some(enabled);
        self
    }

    pub fn auto_start_pomodoros(mut self, enabled: bool) -> Self {
        self.auto_start_pomodoros = Some(enabled);
        self
    }

    pub fn sound_enabled(mut self, enabled: bool) -> Self {
        self.sound_enabled = Some(enabled);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
