//! Session storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_datetime, parse_datetime_opt, parse_session_status, OptionalExt};
use crate::error::Result;
use crate::models::{StatusFilter, VotingSession};

pub struct SessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<VotingSession> {
        Ok(VotingSession {
            id: row.get(0)?,
            code: row.get(1)?,
            title: row.get(2)?,
            status: parse_session_status(&row.get::<_, String>(3)?)?,
            created_at: parse_datetime(&row.get::<_, String>(4)?)?,
            closed_at: parse_datetime_opt(row.get::<_, Option<String>>(5)?)?,
            created_by: row.get(6)?,
        })
    }

    /// Insert an open session row, returning its id.
    ///
    /// The UNIQUE constraint on `code` is the caller's collision signal.
    #[instrument(skip(self, title))]
    pub fn insert(
        &self,
        code: &str,
        title: &str,
        created_by: i64,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (code, title, status, created_at, created_by)
             VALUES (?1, ?2, 'open', ?3, ?4)",
            params![code, title, created_at.to_rfc3339(), created_by],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Find session by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: i64) -> Result<Option<VotingSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, title, status, created_at, closed_at, created_by
             FROM sessions WHERE id = ?1",
        )?;

        let session = stmt.query_row(params![id], Self::from_row).optional()?;
        Ok(session)
    }

    /// Find session by join code
    #[instrument(skip(self))]
    pub fn find_by_code(&self, code: &str) -> Result<Option<VotingSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, title, status, created_at, closed_at, created_by
             FROM sessions WHERE code = ?1",
        )?;

        let session = stmt.query_row(params![code], Self::from_row).optional()?;
        Ok(session)
    }

    /// Stamp a session closed; false when no open row matched (already
    /// closed or unknown id)
    #[instrument(skip(self))]
    pub fn mark_closed(&self, id: i64, closed_at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE sessions SET status = 'closed', closed_at = ?1
             WHERE id = ?2 AND status = 'open'",
            params![closed_at.to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    /// List sessions, newest first; closed sessions order by closure time
    #[instrument(skip(self))]
    pub fn list(&self, filter: StatusFilter) -> Result<Vec<VotingSession>> {
        let sql = match filter {
            StatusFilter::Open => {
                "SELECT id, code, title, status, created_at, closed_at, created_by
                 FROM sessions WHERE status = 'open'
                 ORDER BY created_at DESC, id DESC"
            }
            StatusFilter::Closed => {
                "SELECT id, code, title, status, created_at, closed_at, created_by
                 FROM sessions WHERE status = 'closed'
                 ORDER BY closed_at DESC, created_at DESC, id DESC"
            }
            StatusFilter::All => {
                "SELECT id, code, title, status, created_at, closed_at, created_by
                 FROM sessions
                 ORDER BY created_at DESC, id DESC"
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let sessions = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse::is_unique_violation;
    use super::*;
    use crate::error::Error;
    use crate::models::SessionStatus;
    use crate::storage::Database;
    use chrono::TimeZone;

    fn stamp(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let store = db.sessions();

        let id = store.insert("QX7DK2", "Budget meeting", 1, stamp(9)).unwrap();

        let by_id = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(by_id.code, "QX7DK2");
        assert_eq!(by_id.title, "Budget meeting");
        assert_eq!(by_id.status, SessionStatus::Open);
        assert_eq!(by_id.closed_at, None);
        assert_eq!(by_id.created_by, 1);

        let by_code = store.find_by_code("QX7DK2").unwrap().unwrap();
        assert_eq!(by_code.id, id);

        assert!(store.find_by_id(id + 1).unwrap().is_none());
        assert!(store.find_by_code("ZZZZZZ").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_code_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        let store = db.sessions();

        store.insert("SAME00", "First", 1, stamp(9)).unwrap();
        let err = store.insert("SAME00", "Second", 1, stamp(10)).unwrap_err();

        match err {
            Error::Database(ref e) => assert!(is_unique_violation(e, "sessions.code")),
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn test_mark_closed_only_touches_open_rows() {
        let db = Database::open_in_memory().unwrap();
        let store = db.sessions();

        let id = store.insert("AB12CD", "Vote night", 1, stamp(9)).unwrap();

        assert!(store.mark_closed(id, stamp(10)).unwrap());
        let closed = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert_eq!(closed.closed_at, Some(stamp(10)));

        // Second close matches no open row and must not restamp
        assert!(!store.mark_closed(id, stamp(11)).unwrap());
        let still = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(still.closed_at, Some(stamp(10)));

        assert!(!store.mark_closed(id + 1, stamp(11)).unwrap());
    }

    #[test]
    fn test_list_filters_and_ordering() {
        let db = Database::open_in_memory().unwrap();
        let store = db.sessions();

        let early = store.insert("AAAA01", "Early", 1, stamp(8)).unwrap();
        let late = store.insert("AAAA02", "Late", 1, stamp(12)).unwrap();
        let closed = store.insert("AAAA03", "Done", 1, stamp(10)).unwrap();
        store.mark_closed(closed, stamp(13)).unwrap();

        let open: Vec<i64> = store
            .list(StatusFilter::Open)
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(open, vec![late, early]);

        let closed_list: Vec<i64> = store
            .list(StatusFilter::Closed)
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(closed_list, vec![closed]);

        let all: Vec<i64> = store
            .list(StatusFilter::All)
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(all, vec![late, closed, early]);
    }
}
