use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tomatick_core::{
    CompletionCue, Config, Database, Event, SettingsPatch, SilentCue, TerminalBell,
    TimerEngine, TimerMode, TimerService, TimerSnapshot,
};
use tracing::warn;
use uuid::Uuid;

#[derive(Args)]
pub struct RunArgs {
    /// Start the first countdown immediately
    #[arg(long)]
    start: bool,
    /// Mode to begin in (focus, short_break, long_break)
    #[arg(long, default_value = "focus")]
    mode: TimerMode,
    /// Print events as JSON lines instead of text
    #[arg(long)]
    json: bool,
    /// Do not ring the terminal bell when a countdown finishes
    #[arg(long)]
    quiet: bool,
}

/// A line typed on stdin while the timer runs.
#[derive(Debug, PartialEq)]
enum Input {
    Start,
    Pause,
    Reset,
    Mode(TimerMode),
    Set { key: String, value: String },
    Delete(Uuid),
    Status,
    Help,
    Quit,
}

impl FromStr for Input {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or_default();
        let input = match cmd {
            "start" | "s" | "resume" => Input::Start,
            "pause" | "p" => Input::Pause,
            "reset" | "r" => Input::Reset,
            "mode" | "m" => {
                let mode = words.next().ok_or("usage: mode <focus|short_break|long_break>")?;
                Input::Mode(mode.parse().map_err(|e| format!("{e}"))?)
            }
            "set" => {
                let key = words.next().ok_or("usage: set <key> <value>")?;
                let value = words.next().ok_or("usage: set <key> <value>")?;
                Input::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            }
            "delete" | "rm" => {
                let id = words.next().ok_or("usage: delete <session-id>")?;
                Input::Delete(Uuid::parse_str(id).map_err(|e| e.to_string())?)
            }
            "status" | "" => Input::Status,
            "help" | "?" => Input::Help,
            "quit" | "q" | "exit" => Input::Quit,
            other => return Err(format!("unknown command '{other}' (try 'help')")),
        };
        Ok(input)
    }
}

const HELP: &str = "\
commands:
  start | s            start or resume the countdown
  pause | p            pause the countdown
  reset | r            reset the current countdown
  mode <m>             switch to focus, short_break or long_break
  set <key> <value>    change a setting, e.g. set focus_minutes 30
  delete <id>          remove a session from history
  status               show the current timer
  quit | q             save and exit";

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_foreground(args))
}

async fn run_foreground(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default();
    let db = Database::open_or_fallback()?;

    let cue: Arc<dyn CompletionCue> = if args.quiet {
        Arc::new(SilentCue)
    } else {
        Arc::new(TerminalBell)
    };
    let engine = TimerEngine::new(config.timer.clone())
        .with_history(db.load_sessions_or_empty())
        .with_cue(cue);
    let service = TimerService::new(engine)?;
    let mut events = service.subscribe();

    if args.mode != TimerMode::Focus {
        service.change_mode(args.mode);
    }
    if args.start {
        service.start();
    }
    if !args.json {
        print_snapshot(&service.snapshot());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                        warn!(error = %e, "ignoring unreadable input line");
                        eprintln!("ignored a line that is not valid UTF-8");
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin closed unexpectedly");
                        break;
                    }
                };
                match line.parse::<Input>() {
                    Ok(Input::Quit) => break,
                    Ok(input) => handle(input, &service, &mut config, &db, args.json),
                    Err(e) => eprintln!("{e}"),
                }
            }
            event = events.recv() => match event {
                Ok(event) => on_event(&event, &db, args.json),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    service.shutdown();
    loop {
        match events.try_recv() {
            Ok(event) => on_event(&event, &db, args.json),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    config.timer = service.settings();
    if let Err(e) = config.save() {
        warn!(error = %e, "could not save configuration");
    }
    db.replace_sessions(&service.history())?;
    Ok(())
}

fn handle(input: Input, service: &TimerService, config: &mut Config, db: &Database, json: bool) {
    match input {
        Input::Start => {
            service.start();
        }
        Input::Pause => {
            service.pause();
        }
        Input::Reset => {
            service.reset();
        }
        Input::Mode(mode) => {
            service.change_mode(mode);
        }
        Input::Set { key, value } => {
            let key = if key.contains('.') {
                key
            } else {
                format!("timer.{key}")
            };
            match config.set_value(&key, &value) {
                Ok(()) => {
                    service.update_settings(&SettingsPatch::from_settings(&config.timer));
                }
                Err(e) => eprintln!("{e}"),
            }
        }
        Input::Delete(id) => {
            if service.delete_session(id).is_none() {
                eprintln!("session not found: {id}");
            } else if let Err(e) = db.delete_session(id) {
                warn!(error = %e, "could not delete stored session");
            }
        }
        Input::Status => {
            let snapshot = service.snapshot();
            if json {
                match serde_json::to_string(&snapshot) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("{e}"),
                }
            } else {
                print_snapshot(&snapshot);
            }
        }
        Input::Help => println!("{HELP}"),
        Input::Quit => {}
    }
}

fn on_event(event: &Event, db: &Database, json: bool) {
    if let Event::TimerCompleted { session, .. } = event {
        if let Err(e) = db.save_session(session) {
            warn!(error = %e, "could not persist completed session");
        }
    }

    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("{e}"),
        }
        return;
    }

    let mut stdout = std::io::stdout().lock();
    let _ = match event {
        Event::Tick {
            mode,
            remaining_secs,
        } => write!(
            stdout,
            "\r{} {}   ",
            mode.title(),
            tomatick_core::format_mm_ss(*remaining_secs)
        ),
        other => writeln!(stdout, "\r{}", describe(other)),
    };
    let _ = stdout.flush();
}

fn describe(event: &Event) -> String {
    match event {
        Event::TimerStarted {
            mode, duration_secs, ..
        } => format!(
            "{} started ({})",
            mode.title(),
            tomatick_core::format_mm_ss(*duration_secs)
        ),
        Event::TimerResumed {
            mode, remaining_secs, ..
        } => format!(
            "{} resumed at {}",
            mode.title(),
            tomatick_core::format_mm_ss(*remaining_secs)
        ),
        Event::TimerPaused {
            mode, remaining_secs, ..
        } => format!(
            "{} paused at {}",
            mode.title(),
            tomatick_core::format_mm_ss(*remaining_secs)
        ),
        Event::TimerReset {
            mode, remaining_secs, ..
        } => format!(
            "{} reset to {}",
            mode.title(),
            tomatick_core::format_mm_ss(*remaining_secs)
        ),
        Event::ModeChanged {
            to, remaining_secs, ..
        } => format!(
            "switched to {} ({})",
            to.title(),
            tomatick_core::format_mm_ss(*remaining_secs)
        ),
        Event::SessionDiscarded { mode, .. } => format!("{} session discarded", mode.label()),
        Event::Tick {
            mode, remaining_secs,
        } => format!(
            "{} {}",
            mode.title(),
            tomatick_core::format_mm_ss(*remaining_secs)
        ),
        Event::TimerCompleted {
            session,
            next_mode,
            completed_focus_count,
            ..
        } => format!(
            "{} complete ({} focus intervals so far), next: {}",
            session.mode.label(),
            completed_focus_count,
            next_mode.title()
        ),
        Event::SettingsUpdated { timer_reset, .. } => {
            if *timer_reset {
                "settings updated, countdown reset".to_string()
            } else {
                "settings updated".to_string()
            }
        }
        Event::SessionDeleted { session_id, .. } => format!("deleted session {session_id}"),
    }
}

fn print_snapshot(snapshot: &TimerSnapshot) {
    let state = if snapshot.is_running {
        "running"
    } else if snapshot.is_paused {
        "paused"
    } else {
        "idle"
    };
    println!(
        "{} {} ({}, {} focus completed, long break in {})",
        snapshot.title,
        snapshot.display,
        state,
        snapshot.completed_focus_count,
        snapshot.focus_intervals_until_long_break
    );
}
