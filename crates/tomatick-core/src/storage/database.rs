//! SQLite-based session history storage.
//!
//! Only completed sessions are written. Rows are revalidated when they are
//! read back; a row that fails validation is skipped, never trusted.

use std::io::Read;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::warn;
use uuid::Uuid;

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::session::{Session, SessionLog, StoredSession};

const DB_FILE: &str = "tomatick.db";
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// SQLite database for session history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/tomatick.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join(DB_FILE);
        Self::open_at(&path)
    }

    /// Open the database at `<data_dir>/tomatick.db`, recovering from an
    /// unreadable file instead of failing. See [`Database::open_at_or_fallback`].
    ///
    /// # Errors
    /// Only if not even an in-memory database can be created.
    pub fn open_or_fallback() -> Result<Self> {
        match data_dir() {
            Ok(dir) => Self::open_at_or_fallback(&dir.join(DB_FILE)),
            Err(e) => {
                warn!(error = %e, "no data directory, keeping session history in memory");
                Self::open_memory()
            }
        }
    }

    /// Open `path`, falling back when it cannot be opened or migrated.
    ///
    /// A file that is not SQLite at all is renamed to `<name>.corrupt` and a
    /// fresh database is created in its place. Anything else (including a
    /// damaged SQLite file, which is left untouched) falls back to an
    /// in-memory database for this run.
    pub fn open_at_or_fallback(path: &Path) -> Result<Self> {
        let err = match Self::open_at(path) {
            Ok(db) => return Ok(db),
            Err(e) => e,
        };
        warn!(path = %path.display(), error = %err, "session history unreadable");

        if is_foreign_file(path) {
            let aside = corrupt_path(path);
            match std::fs::rename(path, &aside) {
                Ok(()) => {
                    warn!(moved_to = %aside.display(), "moved unreadable session history aside");
                    match Self::open_at(path) {
                        Ok(db) => return Ok(db),
                        Err(e) => warn!(error = %e, "could not recreate session history"),
                    }
                }
                Err(e) => warn!(error = %e, "could not move unreadable session history aside"),
            }
        }

        warn!("keeping session history in memory for this run");
        Self::open_memory()
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an empty in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id            TEXT PRIMARY KEY,
                    mode          TEXT,
                    started_at    TEXT,
                    ended_at      TEXT,
                    duration_secs INTEGER,
                    completed     INTEGER
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert or replace a single session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn save_session(&self, session: &Session) -> Result<()> {
        insert(&self.conn, session)?;
        Ok(())
    }

    /// Replace the stored history with `log` in one transaction.
    pub fn replace_sessions(&self, log: &SessionLog) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM sessions", [])?;
        for session in log {
            insert(&tx, session)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove a session. Returns whether a row was deleted.
    pub fn delete_session(&self, id: Uuid) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        Ok(n > 0)
    }

    /// Read raw rows without validating them.
    pub fn stored_sessions(&self) -> Result<Vec<StoredSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, started_at, ended_at, duration_secs, completed
             FROM sessions
             ORDER BY started_at, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredSession {
                id: row.get(0)?,
                mode: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                duration_secs: row.get(4)?,
                completed: row.get::<_, Option<i64>>(5)?.map(|v| v != 0),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Load and revalidate the stored history. Invalid rows are skipped.
    pub fn load_sessions(&self) -> Result<SessionLog> {
        let sessions = self
            .stored_sessions()?
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                match Session::try_from(raw) {
                    Ok(session) => Some(session),
                    Err(e) => {
                        warn!(id = ?id, error = %e, "skipping invalid stored session");
                        None
                    }
                }
            })
            .collect();
        Ok(SessionLog::from_sessions(sessions))
    }

    /// Load the stored history, falling back to an empty log on failure.
    pub fn load_sessions_or_empty(&self) -> SessionLog {
        self.load_sessions().unwrap_or_else(|e| {
            warn!(error = %e, "could not load session history, starting empty");
            SessionLog::new()
        })
    }
}

/// Whether `path` is a non-empty file without the SQLite header.
fn is_foreign_file(path: &Path) -> bool {
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut header = Vec::with_capacity(SQLITE_HEADER.len());
    match file.by_ref().take(SQLITE_HEADER.len() as u64).read_to_end(&mut header) {
        Ok(_) => !header.is_empty() && header.as_slice() != SQLITE_HEADER,
        Err(_) => false,
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn insert(conn: &Connection, session: &Session) -> Result<(), rusqlite::Error> {
    let stored = StoredSession::from(session);
    conn.execute(
        "INSERT OR REPLACE INTO sessions (id, mode, started_at, ended_at, duration_secs, completed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            stored.id,
            stored.mode,
            stored.started_at,
            stored.ended_at,
            stored.duration_secs,
            stored.completed,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerMode;
    use chrono::{Duration, TimeZone, Utc};

    fn session(mode: TimerMode, hour: u32, secs: u64) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        Session::begin(mode, secs, start).finish(start + Duration::seconds(secs as i64))
    }

    #[test]
    fn save_and_load() {
        let db = Database::open_memory().unwrap();
        let a = session(TimerMode::Focus, 9, 1500);
        let b = session(TimerMode::ShortBreak, 10, 300);
        db.save_session(&b).unwrap();
        db.save_session(&a).unwrap();

        let log = db.load_sessions().unwrap();
        assert_eq!(log.as_slice(), &[a, b]);
    }

    #[test]
    fn replace_overwrites_history() {
        let db = Database::open_memory().unwrap();
        db.save_session(&session(TimerMode::Focus, 8, 1500)).unwrap();

        let mut log = SessionLog::new();
        log.append(session(TimerMode::LongBreak, 11, 900));
        db.replace_sessions(&log).unwrap();

        assert_eq!(db.load_sessions().unwrap(), log);
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let db = Database::open_memory().unwrap();
        let s = session(TimerMode::Focus, 9, 1500);
        db.save_session(&s).unwrap();
        assert!(db.delete_session(s.id).unwrap());
        assert!(!db.delete_session(s.id).unwrap());
        assert!(db.load_sessions().unwrap().is_empty());
    }

    #[test]
    fn invalid_rows_are_skipped_on_load() {
        let db = Database::open_memory().unwrap();
        let good = session(TimerMode::Focus, 9, 1500);
        db.save_session(&good).unwrap();
        db.conn()
            .execute(
                "INSERT INTO sessions (id, mode, started_at, ended_at, duration_secs, completed)
                 VALUES ('not-a-uuid', 'focus', 'garbage', NULL, 1500, 1)",
                [],
            )
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO sessions (id, mode, started_at) VALUES (?1, 'focus', ?2)",
                params![Uuid::new_v4().to_string(), Utc::now().to_rfc3339()],
            )
            .unwrap();

        assert_eq!(db.stored_sessions().unwrap().len(), 3);
        let log = db.load_sessions().unwrap();
        assert_eq!(log.as_slice(), &[good]);
    }

    #[test]
    fn corrupt_table_falls_back_to_empty() {
        let db = Database::open_memory().unwrap();
        db.conn().execute_batch("DROP TABLE sessions").unwrap();
        assert!(db.load_sessions().is_err());
        assert!(db.load_sessions_or_empty().is_empty());
    }

    #[test]
    fn foreign_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        std::fs::write(&path, b"definitely not sqlite").unwrap();
        assert!(Database::open_at(&path).is_err());

        let db = Database::open_at_or_fallback(&path).unwrap();
        let s = session(TimerMode::Focus, 9, 1500);
        db.save_session(&s).unwrap();
        assert_eq!(db.load_sessions().unwrap().as_slice(), &[s]);

        let aside = dir.path().join("tomatick.db.corrupt");
        assert_eq!(std::fs::read(aside).unwrap(), b"definitely not sqlite");
        drop(db);
        assert_eq!(Database::open_at(&path).unwrap().load_sessions().unwrap().len(), 1);
    }

    #[test]
    fn unopenable_path_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(DB_FILE);

        let db = Database::open_at_or_fallback(&path).unwrap();
        db.save_session(&session(TimerMode::ShortBreak, 10, 300)).unwrap();
        assert_eq!(db.load_sessions().unwrap().len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn healthy_file_is_opened_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        let s = session(TimerMode::Focus, 9, 1500);
        Database::open_at(&path).unwrap().save_session(&s).unwrap();

        let db = Database::open_at_or_fallback(&path).unwrap();
        assert_eq!(db.load_sessions().unwrap().as_slice(), &[s]);
        assert!(!dir.path().join("tomatick.db.corrupt").exists());
    }
}
