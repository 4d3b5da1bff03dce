//! Resolution storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_voting_status, OptionalExt};
use crate::error::Result;
use crate::models::{Resolution, VotingStatus};

pub struct ResolutionStore<'a> {
    conn: &'a Connection,
}

impl<'a> ResolutionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Resolution> {
        Ok(Resolution {
            id: row.get(0)?,
            session_id: row.get(1)?,
            text: row.get(2)?,
            position: row.get(3)?,
            voting_status: parse_voting_status(&row.get::<_, String>(4)?)?,
        })
    }

    /// Insert a pending resolution, returning its id
    #[instrument(skip(self, text))]
    pub fn insert(&self, session_id: i64, text: &str, position: u32) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO resolutions (session_id, text, position, voting_status)
             VALUES (?1, ?2, ?3, 'pending')",
            params![session_id, text, position],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Find resolution by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: i64) -> Result<Option<Resolution>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, text, position, voting_status
             FROM resolutions WHERE id = ?1",
        )?;

        let resolution = stmt.query_row(params![id], Self::from_row).optional()?;
        Ok(resolution)
    }

    /// Resolutions of a session in display order
    #[instrument(skip(self))]
    pub fn list_for_session(&self, session_id: i64) -> Result<Vec<Resolution>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, text, position, voting_status
             FROM resolutions WHERE session_id = ?1
             ORDER BY position ASC, id ASC",
        )?;

        let resolutions = stmt
            .query_map(params![session_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(resolutions)
    }

    /// Set a resolution's voting status
    #[instrument(skip(self))]
    pub fn set_status(&self, id: i64, status: VotingStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE resolutions SET voting_status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Demote any active sibling back to pending.
    ///
    /// Runs inside the activation transaction together with the promotion of
    /// `keep_id`, so no window exists where two resolutions are active.
    #[instrument(skip(self))]
    pub fn demote_active_siblings(&self, session_id: i64, keep_id: i64) -> Result<usize> {
        let demoted = self.conn.execute(
            "UPDATE resolutions SET voting_status = 'pending'
             WHERE session_id = ?1 AND voting_status = 'active' AND id != ?2",
            params![session_id, keep_id],
        )?;
        Ok(demoted)
    }

    /// Number of active resolutions in a session
    #[instrument(skip(self))]
    pub fn active_count(&self, session_id: i64) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM resolutions
             WHERE session_id = ?1 AND voting_status = 'active'",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::Utc;

    fn seed_session(db: &Database) -> i64 {
        db.sessions()
            .insert("TEST01", "Test session", 1, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_insert_and_list_in_display_order() {
        let db = Database::open_in_memory().unwrap();
        let session_id = seed_session(&db);
        let store = db.resolutions();

        store.insert(session_id, "Second item", 2).unwrap();
        store.insert(session_id, "First item", 1).unwrap();
        store.insert(session_id, "Third item", 3).unwrap();

        let listed = store.list_for_session(session_id).unwrap();
        let positions: Vec<u32> = listed.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(listed
            .iter()
            .all(|r| r.voting_status == VotingStatus::Pending));
    }

    #[test]
    fn test_set_status_and_active_count() {
        let db = Database::open_in_memory().unwrap();
        let session_id = seed_session(&db);
        let store = db.resolutions();

        let first = store.insert(session_id, "First", 1).unwrap();
        store.insert(session_id, "Second", 2).unwrap();

        assert_eq!(store.active_count(session_id).unwrap(), 0);

        store.set_status(first, VotingStatus::Active).unwrap();
        assert_eq!(store.active_count(session_id).unwrap(), 1);
        assert!(store.find_by_id(first).unwrap().unwrap().is_active());

        store.set_status(first, VotingStatus::Closed).unwrap();
        assert_eq!(store.active_count(session_id).unwrap(), 0);
    }

    #[test]
    fn test_demote_active_siblings_spares_the_target() {
        let db = Database::open_in_memory().unwrap();
        let session_id = seed_session(&db);
        let store = db.resolutions();

        let first = store.insert(session_id, "First", 1).unwrap();
        let second = store.insert(session_id, "Second", 2).unwrap();
        store.set_status(first, VotingStatus::Active).unwrap();

        let demoted = store.demote_active_siblings(session_id, second).unwrap();
        assert_eq!(demoted, 1);
        assert_eq!(
            store.find_by_id(first).unwrap().unwrap().voting_status,
            VotingStatus::Pending
        );

        // The kept id itself is never demoted
        store.set_status(second, VotingStatus::Active).unwrap();
        let demoted = store.demote_active_siblings(session_id, second).unwrap();
        assert_eq!(demoted, 0);
        assert!(store.find_by_id(second).unwrap().unwrap().is_active());
    }
}
