//! Session records and the append-only session log.
//!
//! A [`Session`] is opened when a countdown starts from idle and is only
//! ever appended to the [`SessionLog`] once it has run to zero. Sessions
//! abandoned by a reset or a mode change never reach the log.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::format::format_minutes;
use crate::timer::TimerMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub mode: TimerMode,
    pub start_time: DateTime<Utc>,
    /// `None` while the countdown is still in progress.
    pub end_time: Option<DateTime<Utc>>,
    /// Configured length of the countdown when it was started.
    pub duration_secs: u64,
    pub completed: bool,
}

impl Session {
    /// Open an in-progress session.
    pub fn begin(mode: TimerMode, duration_secs: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            start_time: now,
            end_time: None,
            duration_secs,
            completed: false,
        }
    }

    /// Stamp the end time and mark the session completed.
    pub fn finish(mut self, now: DateTime<Utc>) -> Self {
        self.end_time = Some(now);
        self.completed = true;
        self
    }

    pub fn is_in_progress(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn duration_label(&self) -> String {
        format_minutes(self.duration_secs)
    }
}

/// Ordered, append-only history of completed sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionLog {
    sessions: Vec<Session>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from previously stored sessions, ordered by start time.
    ///
    /// Records that are unfinished, or that repeat an id already present,
    /// are dropped.
    pub fn from_sessions(mut sessions: Vec<Session>) -> Self {
        sessions.retain(|s| s.completed && s.end_time.is_some());
        sessions.sort_by_key(|s| s.start_time);
        let mut seen = std::collections::HashSet::new();
        sessions.retain(|s| seen.insert(s.id));
        Self { sessions }
    }

    pub(crate) fn append(&mut self, session: Session) {
        debug_assert!(session.completed && session.end_time.is_some());
        self.sessions.push(session);
    }

    /// Remove a session from history. Returns it if it existed.
    pub fn delete(&mut self, id: Uuid) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(index))
    }

    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn as_slice(&self) -> &[Session] {
        &self.sessions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Session> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn last(&self) -> Option<&Session> {
        self.sessions.last()
    }

    /// Group sessions by calendar day in `tz`.
    ///
    /// Days are newest first, and sessions within a day are newest first.
    pub fn by_day_in<Tz: TimeZone>(&self, tz: &Tz) -> Vec<DaySessions> {
        let mut days: BTreeMap<NaiveDate, Vec<Session>> = BTreeMap::new();
        for session in &self.sessions {
            let day = session.start_time.with_timezone(tz).date_naive();
            days.entry(day).or_default().push(session.clone());
        }
        days.into_iter()
            .rev()
            .map(|(date, mut sessions)| {
                sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
                DaySessions { date, sessions }
            })
            .collect()
    }

    /// [`by_day_in`](Self::by_day_in) using the local time zone.
    pub fn by_day(&self) -> Vec<DaySessions> {
        self.by_day_in(&chrono::Local)
    }

    /// Totals across the log, with `today` interpreted in `tz`.
    pub fn stats_in<Tz: TimeZone>(&self, tz: &Tz, today: NaiveDate) -> HistoryStats {
        let mut stats = HistoryStats::default();
        for session in &self.sessions {
            stats.total_sessions += 1;
            let minutes = session.duration_secs / 60;
            if session.mode == TimerMode::Focus {
                stats.completed_focus += 1;
                stats.focus_minutes += minutes;
                if session.start_time.with_timezone(tz).date_naive() == today {
                    stats.today_focus += 1;
                }
            } else {
                stats.break_minutes += minutes;
            }
        }
        stats
    }

    /// [`stats_in`](Self::stats_in) for the local time zone and today's date.
    pub fn stats(&self) -> HistoryStats {
        self.stats_in(&chrono::Local, chrono::Local::now().date_naive())
    }
}

impl<'a> IntoIterator for &'a SessionLog {
    type Item = &'a Session;
    type IntoIter = std::slice::Iter<'a, Session>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.iter()
    }
}

/// Sessions that started on the same calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySessions {
    pub date: NaiveDate,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_sessions: u64,
    pub completed_focus: u64,
    pub focus_minutes: u64,
    pub break_minutes: u64,
    pub today_focus: u64,
}

/// A session record as read back from durable storage, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_secs: Option<i64>,
    pub completed: Option<bool>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            id: Some(session.id.to_string()),
            mode: Some(session.mode.as_str().to_string()),
            started_at: Some(session.start_time.to_rfc3339()),
            ended_at: session.end_time.map(|t| t.to_rfc3339()),
            duration_secs: Some(i64::try_from(session.duration_secs).unwrap_or(i64::MAX)),
            completed: Some(session.completed),
        }
    }
}

impl TryFrom<StoredSession> for Session {
    type Error = ValidationError;

    fn try_from(raw: StoredSession) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(ValidationError::MissingField("id"))?;
        let id = Uuid::parse_str(&id).map_err(|e| ValidationError::InvalidValue {
            field: "id",
            message: e.to_string(),
        })?;

        let mode: TimerMode = raw
            .mode
            .ok_or(ValidationError::MissingField("mode"))?
            .parse()?;

        let start_time = parse_timestamp("started_at", raw.started_at)?;
        let end_time = parse_timestamp("ended_at", raw.ended_at)?;
        if end_time < start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: start_time,
                end: end_time,
            });
        }

        let duration_secs = raw
            .duration_secs
            .ok_or(ValidationError::MissingField("duration_secs"))?;
        let duration_secs = u64::try_from(duration_secs)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "duration_secs",
                message: format!("expected a positive number of seconds, got {duration_secs}"),
            })?;

        if raw.completed != Some(true) {
            return Err(ValidationError::InvalidValue {
                field: "completed",
                message: "only completed sessions belong in history".into(),
            });
        }

        Ok(Session {
            id,
            mode,
            start_time,
            end_time: Some(end_time),
            duration_secs,
            completed: true,
        })
    }
}

fn parse_timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?;
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidValue {
            field,
            message: format!("'{value}' is not an RFC 3339 timestamp: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn completed(mode: TimerMode, start: DateTime<Utc>, secs: u64) -> Session {
        Session::begin(mode, secs, start).finish(start + Duration::seconds(secs as i64))
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap()
    }

    #[test]
    fn begin_then_finish_stamps_end_time() {
        let s = Session::begin(TimerMode::Focus, 1500, at(9));
        assert!(s.is_in_progress());
        assert!(!s.completed);
        let done = s.finish(at(10));
        assert_eq!(done.end_time, Some(at(10)));
        assert!(done.completed);
        assert_eq!(done.duration_label(), "25 min");
    }

    #[test]
    fn delete_removes_only_matching_session() {
        let mut log = SessionLog::new();
        let a = completed(TimerMode::Focus, at(9), 1500);
        let b = completed(TimerMode::ShortBreak, at(10), 300);
        log.append(a.clone());
        log.append(b.clone());

        assert_eq!(log.delete(a.id), Some(a));
        assert_eq!(log.len(), 1);
        assert_eq!(log.delete(Uuid::new_v4()), None);
        assert_eq!(log.last(), Some(&b));
    }

    #[test]
    fn from_sessions_orders_and_drops_unfinished() {
        let late = completed(TimerMode::Focus, at(12), 1500);
        let early = completed(TimerMode::Focus, at(8), 1500);
        let open = Session::begin(TimerMode::Focus, 1500, at(13));
        let log = SessionLog::from_sessions(vec![late.clone(), open, early.clone(), late.clone()]);
        assert_eq!(log.as_slice(), &[early, late]);
    }

    #[test]
    fn by_day_groups_newest_first() {
        let mut log = SessionLog::new();
        let d1 = completed(TimerMode::Focus, at(9), 1500);
        let d1_later = completed(TimerMode::ShortBreak, at(10), 300);
        let d2 = completed(TimerMode::Focus, at(9) + Duration::days(1), 1500);
        log.append(d1.clone());
        log.append(d1_later.clone());
        log.append(d2.clone());

        let days = log.by_day_in(&Utc);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(days[0].sessions, vec![d2]);
        assert_eq!(days[1].sessions, vec![d1_later, d1]);
    }

    #[test]
    fn stats_split_focus_and_breaks() {
        let mut log = SessionLog::new();
        log.append(completed(TimerMode::Focus, at(9), 1500));
        log.append(completed(TimerMode::ShortBreak, at(10), 300));
        log.append(completed(TimerMode::Focus, at(9) - Duration::days(1), 1500));
        log.append(completed(TimerMode::LongBreak, at(11), 900));

        let stats = log.stats_in(&Utc, at(0).date_naive());
        assert_eq!(
            stats,
            HistoryStats {
                total_sessions: 4,
                completed_focus: 2,
                focus_minutes: 50,
                break_minutes: 20,
                today_focus: 1,
            }
        );
    }

    #[test]
    fn stored_session_revalidates() {
        let original = completed(TimerMode::LongBreak, at(9), 900);
        let stored = StoredSession::from(&original);
        assert_eq!(Session::try_from(stored).unwrap(), original);
    }

    #[test]
    fn stored_session_requires_end_time() {
        let mut stored = StoredSession::from(&completed(TimerMode::Focus, at(9), 1500));
        stored.ended_at = None;
        assert_eq!(
            Session::try_from(stored).unwrap_err(),
            ValidationError::MissingField("ended_at")
        );
    }

    #[test]
    fn stored_session_rejects_garbage_dates_and_modes() {
        let good = StoredSession::from(&completed(TimerMode::Focus, at(9), 1500));

        let bad_date = StoredSession {
            started_at: Some("yesterday".into()),
            ..good.clone()
        };
        assert!(matches!(
            Session::try_from(bad_date),
            Err(ValidationError::InvalidValue { field: "started_at", .. })
        ));

        let bad_mode = StoredSession {
            mode: Some("nap".into()),
            ..good.clone()
        };
        assert!(Session::try_from(bad_mode).is_err());

        let backwards = StoredSession {
            ended_at: Some(at(8).to_rfc3339()),
            ..good.clone()
        };
        assert!(matches!(
            Session::try_from(backwards),
            Err(ValidationError::InvalidTimeRange { .. })
        ));

        let incomplete = StoredSession {
            completed: Some(false),
            ..good
        };
        assert!(Session::try_from(incomplete).is_err());
    }

    #[test]
    fn stored_session_rejects_non_positive_duration() {
        let stored = StoredSession {
            duration_secs: Some(0),
            ..StoredSession::from(&completed(TimerMode::Focus, at(9), 1500))
        };
        assert!(matches!(
            Session::try_from(stored),
            Err(ValidationError::InvalidValue { field: "duration_secs", .. })
        ));
    }
}
