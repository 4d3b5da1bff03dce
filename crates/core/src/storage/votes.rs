//! Vote ledger storage
//!
//! One row per (resolution, voter identity); casting again overwrites the
//! previous choice. State checks belong to the caller layer, not here.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;

use super::parse::{parse_choice, parse_datetime, OptionalExt};
use crate::error::{Error, Result};
use crate::models::{Choice, Vote};

pub struct VoteStore<'a> {
    conn: &'a Connection,
}

impl<'a> VoteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Vote> {
        Ok(Vote {
            id: row.get(0)?,
            resolution_id: row.get(1)?,
            voter_identity: row.get(2)?,
            choice: parse_choice(&row.get::<_, String>(3)?)?,
            voted_at: parse_datetime(&row.get::<_, String>(4)?)?,
        })
    }

    /// Find vote by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: i64) -> Result<Option<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, resolution_id, voter_identity, choice, voted_at
             FROM votes WHERE id = ?1",
        )?;

        let vote = stmt.query_row(params![id], Self::from_row).optional()?;
        Ok(vote)
    }

    /// The voter's current choice on a resolution, if any
    #[instrument(skip(self, voter_identity))]
    pub fn find_for_voter(
        &self,
        resolution_id: i64,
        voter_identity: &str,
    ) -> Result<Option<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, resolution_id, voter_identity, choice, voted_at
             FROM votes WHERE resolution_id = ?1 AND voter_identity = ?2",
        )?;

        let vote = stmt
            .query_row(params![resolution_id, voter_identity], Self::from_row)
            .optional()?;
        Ok(vote)
    }

    /// Insert or overwrite the voter's choice on a resolution.
    ///
    /// An unchanged choice returns the existing row untouched, timestamp
    /// included. The write itself is a single upsert against the
    /// UNIQUE(resolution_id, voter_identity) constraint, so two racing
    /// first casts cannot surface a duplicate-row error: the loser's insert
    /// degrades to an update of the winner's row.
    #[instrument(skip(self, voter_identity))]
    pub fn cast_or_update(
        &self,
        resolution_id: i64,
        voter_identity: &str,
        choice: Choice,
        voted_at: DateTime<Utc>,
    ) -> Result<Vote> {
        if let Some(existing) = self.find_for_voter(resolution_id, voter_identity)? {
            if existing.choice == choice {
                return Ok(existing);
            }
        }

        self.conn.execute(
            "INSERT INTO votes (resolution_id, voter_identity, choice, voted_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(resolution_id, voter_identity)
             DO UPDATE SET choice = excluded.choice, voted_at = excluded.voted_at",
            params![
                resolution_id,
                voter_identity,
                choice.as_str(),
                voted_at.to_rfc3339()
            ],
        )?;

        self.find_for_voter(resolution_id, voter_identity)?
            .ok_or_else(|| Error::Persistence("vote row missing after upsert".into()))
    }

    /// All votes cast in a session, across its resolutions
    #[instrument(skip(self))]
    pub fn list_for_session(&self, session_id: i64) -> Result<Vec<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.id, v.resolution_id, v.voter_identity, v.choice, v.voted_at
             FROM votes v
             INNER JOIN resolutions r ON r.id = v.resolution_id
             WHERE r.session_id = ?1",
        )?;

        let votes = stmt
            .query_map(params![session_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(votes)
    }

    /// Distinct identities with at least one vote in the session
    #[instrument(skip(self))]
    pub fn count_distinct_voters(&self, session_id: i64) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(DISTINCT v.voter_identity)
             FROM votes v
             INNER JOIN resolutions r ON r.id = v.resolution_id
             WHERE r.session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total vote rows in the session
    #[instrument(skip(self))]
    pub fn count_for_session(&self, session_id: i64) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(v.id)
             FROM votes v
             INNER JOIN resolutions r ON r.id = v.resolution_id
             WHERE r.session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Identities that voted on every one of the given resolutions
    #[instrument(skip(self, resolution_ids), fields(count = resolution_ids.len()))]
    pub fn count_voters_covering(&self, resolution_ids: &[i64]) -> Result<u32> {
        if resolution_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; resolution_ids.len()].join(", ");
        let sql = format!(
            "SELECT COUNT(*) FROM (
                 SELECT voter_identity FROM votes
                 WHERE resolution_id IN ({placeholders})
                 GROUP BY voter_identity
                 HAVING COUNT(DISTINCT resolution_id) = ?
             )"
        );

        let mut bound: Vec<i64> = resolution_ids.to_vec();
        bound.push(resolution_ids.len() as i64);

        let mut stmt = self.conn.prepare(&sql)?;
        let count = stmt.query_row(params_from_iter(bound), |row| row.get(0))?;
        Ok(count)
    }
}
