use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which kind of countdown is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    #[serde(alias = "pomodoro")]
    Focus,
    #[serde(alias = "shortBreak")]
    ShortBreak,
    #[serde(alias = "longBreak")]
    LongBreak,
}

impl TimerMode {
    pub const ALL: [TimerMode; 3] = [TimerMode::Focus, TimerMode::ShortBreak, TimerMode::LongBreak];

    /// Stable identifier used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "short_break",
            TimerMode::LongBreak => "long_break",
        }
    }

    /// Short label for history listings.
    pub fn label(self) -> &'static str {
        match self {
            TimerMode::Focus => "Focus",
            TimerMode::ShortBreak => "Short Break",
            TimerMode::LongBreak => "Long Break",
        }
    }

    /// Heading shown above the countdown.
    pub fn title(self) -> &'static str {
        match self {
            TimerMode::Focus => "Focus Time",
            TimerMode::ShortBreak => "Short Break",
            TimerMode::LongBreak => "Long Break",
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, TimerMode::Focus)
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "focus" | "pomodoro" => Ok(TimerMode::Focus),
            "short_break" | "shortBreak" | "short" => Ok(TimerMode::ShortBreak),
            "long_break" | "longBreak" | "long" => Ok(TimerMode::LongBreak),
            other => Err(ValidationError::InvalidValue {
                field: "mode",
                message: format!("unknown timer mode '{other}'"),
            }),
        }
    }
}
