//! # Tomatick Core Library
//!
//! This library provides the core logic for the Tomatick pomodoro timer:
//! alternating focus and break countdowns, long-break cadence, auto-start,
//! and a history of completed sessions. Presentation layers (the `tomatick`
//! CLI, or any GUI) only issue commands and read snapshots.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A one-tick-per-second state machine over
//!   `{Idle, Running, Paused} x {Focus, ShortBreak, LongBreak}`
//! - **Timer Service**: Drives the engine from a single cancellable tokio
//!   tick task and broadcasts every [`Event`]
//! - **Session Recorder**: Append-only [`SessionLog`] of naturally completed
//!   countdowns
//! - **Storage**: SQLite-based session history and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerService`]: Real-time driver for the engine
//! - [`SessionLog`]: Completed session history
//! - [`Database`]: History persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod format;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, CueError, DatabaseError, Result, ValidationError};
pub use events::Event;
pub use format::format_mm_ss;
pub use session::{DaySessions, HistoryStats, Session, SessionLog, StoredSession};
pub use storage::{Config, Database};
pub use timer::{
    CompletionCue, SettingsPatch, SilentCue, TerminalBell, TimerEngine, TimerMode, TimerService,
    TimerSettings, TimerSnapshot, TimerState,
};
