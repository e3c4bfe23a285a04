use clap::Subcommand;
use tomatick_core::format::format_minutes;
use tomatick_core::Database;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List completed sessions, grouped by day
    List {
        /// Print the raw session log as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a session from history
    Delete {
        /// Session ID
        id: Uuid,
    },
    /// Totals across the whole history
    Stats,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { json } => {
            let log = db.load_sessions_or_empty();
            if json {
                println!("{}", serde_json::to_string_pretty(&log)?);
                return Ok(());
            }
            if log.is_empty() {
                println!("No sessions recorded yet.");
                return Ok(());
            }
            for day in log.by_day() {
                println!("{}", day.date.format("%Y-%m-%d"));
                for session in &day.sessions {
                    println!(
                        "  {}  {:<11}  {:>7}  {}",
                        session.start_time.with_timezone(&chrono::Local).format("%H:%M"),
                        session.mode.label(),
                        format_minutes(session.duration_secs),
                        session.id
                    );
                }
            }
        }
        HistoryAction::Delete { id } => {
            if !db.delete_session(id)? {
                return Err(format!("session not found: {id}").into());
            }
            println!("deleted {id}");
        }
        HistoryAction::Stats => {
            let stats = db.load_sessions_or_empty().stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
