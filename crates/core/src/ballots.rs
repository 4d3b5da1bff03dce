//! Vote casting gate
//!
//! The ledger itself (`VoteStore`) trusts its input; this layer checks the
//! session and resolution state before letting a ballot through.

use chrono::Utc;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::models::{Choice, Vote, VotingStatus};
use crate::storage::Database;

pub struct BallotService<'a> {
    db: &'a Database,
}

impl<'a> BallotService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Cast or revise a vote on the currently active resolution.
    ///
    /// Only an active resolution inside an open session accepts ballots;
    /// everything else is a conflict. Re-casting the same choice succeeds
    /// without touching the stored row.
    #[instrument(skip(self, voter_identity))]
    pub fn cast(
        &self,
        resolution_id: i64,
        voter_identity: &str,
        choice: Choice,
    ) -> Result<Vote> {
        if voter_identity.trim().is_empty() {
            return Err(Error::Validation("voter identity must not be blank".into()));
        }

        let resolution = self
            .db
            .resolutions()
            .find_by_id(resolution_id)?
            .ok_or_else(|| Error::NotFound(format!("resolution {resolution_id}")))?;
        let session = self
            .db
            .sessions()
            .find_by_id(resolution.session_id)?
            .ok_or_else(|| Error::NotFound(format!("session {}", resolution.session_id)))?;

        if !session.is_open() {
            return Err(Error::StateConflict(
                "voting is closed for this session".into(),
            ));
        }
        match resolution.voting_status {
            VotingStatus::Active => {}
            VotingStatus::Pending => {
                return Err(Error::StateConflict(
                    "voting on this resolution has not started".into(),
                ))
            }
            VotingStatus::Closed => {
                return Err(Error::StateConflict(
                    "voting on this resolution has ended".into(),
                ))
            }
        }

        let vote = self
            .db
            .votes()
            .cast_or_update(resolution_id, voter_identity, choice, Utc::now())?;

        info!(vote_id = vote.id, resolution_id, "ballot recorded");
        Ok(vote)
    }
}
