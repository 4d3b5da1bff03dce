//! Progress and results aggregation
//!
//! Both views are recomputed from the vote rows on every call; nothing is
//! cached and nothing is mutated.

use std::collections::HashMap;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::models::{
    Progress, ResolutionResult, SessionReport, SessionResults, Tally, VotingSession, VotingStatus,
};
use crate::storage::Database;

pub struct ReportService<'a> {
    db: &'a Database,
}

impl<'a> ReportService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Live participation counters.
    ///
    /// "Full ballot" means a vote on every resolution opened for voting so
    /// far (active or closed); resolutions still pending don't count against
    /// anyone.
    #[instrument(skip(self))]
    pub fn progress(&self, session_id: i64) -> Result<Progress> {
        self.require(session_id)?;
        let resolutions = self.db.resolutions().list_for_session(session_id)?;
        let votes = self.db.votes();

        let opened: Vec<i64> = resolutions
            .iter()
            .filter(|r| r.voting_status != VotingStatus::Pending)
            .map(|r| r.id)
            .collect();

        Ok(Progress {
            session_id,
            total_resolutions: resolutions.len() as u32,
            voters: votes.count_distinct_voters(session_id)?,
            voters_with_full_ballot: votes.count_voters_covering(&opened)?,
            votes_cast: votes.count_for_session(session_id)?,
        })
    }

    /// Tally every resolution of the session, in display order
    #[instrument(skip(self))]
    pub fn results(&self, session_id: i64) -> Result<SessionResults> {
        let session = self.require(session_id)?;
        let resolutions = self.db.resolutions().list_for_session(session_id)?;
        let votes = self.db.votes().list_for_session(session_id)?;

        let mut tallies: HashMap<i64, Tally> = resolutions
            .iter()
            .map(|r| (r.id, Tally::default()))
            .collect();
        for vote in &votes {
            if let Some(tally) = tallies.get_mut(&vote.resolution_id) {
                tally.add(vote.choice);
            }
        }

        let resolutions = resolutions
            .into_iter()
            .map(|r| {
                let tally = tallies.remove(&r.id).unwrap_or_default();
                ResolutionResult {
                    resolution_id: r.id,
                    text: r.text,
                    position: r.position,
                    voting_status: r.voting_status,
                    outcome: tally.outcome(),
                    tally,
                }
            })
            .collect();

        Ok(SessionResults {
            session_id,
            title: session.title,
            code: session.code,
            status: session.status,
            closed_at: session.closed_at,
            resolutions,
            voters: self.db.votes().count_distinct_voters(session_id)?,
        })
    }

    /// Progress while any resolution is still unresolved, results once
    /// voting has ended everywhere. Driven purely by the resolutions'
    /// voting status.
    #[instrument(skip(self))]
    pub fn report(&self, session_id: i64) -> Result<SessionReport> {
        self.require(session_id)?;
        let resolutions = self.db.resolutions().list_for_session(session_id)?;

        let unresolved = resolutions
            .iter()
            .any(|r| r.voting_status != VotingStatus::Closed);
        if unresolved {
            Ok(SessionReport::Progress(self.progress(session_id)?))
        } else {
            Ok(SessionReport::Results(self.results(session_id)?))
        }
    }

    fn require(&self, session_id: i64) -> Result<VotingSession> {
        self.db
            .sessions()
            .find_by_id(session_id)?
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }
}
