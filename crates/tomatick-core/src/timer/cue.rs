//! Completion cue fired when a countdown reaches zero.
//!
//! Playback is best-effort. The engine logs a failed cue and carries on.

use std::io::Write;

use crate::error::CueError;
use crate::timer::TimerMode;

pub trait CompletionCue: Send + Sync {
    /// Signal that `completed` just finished.
    fn play(&self, completed: TimerMode) -> Result<(), CueError>;
}

/// Does nothing. Used when no audio sink is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl CompletionCue for SilentCue {
    fn play(&self, _completed: TimerMode) -> Result<(), CueError> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl CompletionCue for TerminalBell {
    fn play(&self, _completed: TimerMode) -> Result<(), CueError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_cue_always_succeeds() {
        assert!(SilentCue.play(TimerMode::Focus).is_ok());
    }
}
