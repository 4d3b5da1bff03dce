//! Derived progress and results views
//!
//! Both are recomputed from the vote rows on demand; nothing here is stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Outcome, SessionStatus, Tally, VotingStatus};

/// Live participation counters while a session is still being voted on
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub session_id: i64,
    pub total_resolutions: u32,
    /// Distinct identities that cast at least one vote in the session
    pub voters: u32,
    /// Identities that voted on every resolution opened for voting so far
    pub voters_with_full_ballot: u32,
    pub votes_cast: u32,
}

/// Tally and verdict for one resolution
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    pub resolution_id: i64,
    pub text: String,
    pub position: u32,
    pub voting_status: VotingStatus,
    pub tally: Tally,
    pub outcome: Outcome,
}

/// Per-resolution results for a whole session, in display order
#[derive(Debug, Clone, Serialize)]
pub struct SessionResults {
    pub session_id: i64,
    pub title: String,
    pub code: String,
    pub status: SessionStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub resolutions: Vec<ResolutionResult>,
    /// Distinct identities that voted anywhere in the session
    pub voters: u32,
}

/// Whichever view fits the session's current state
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum SessionReport {
    Progress(Progress),
    Results(SessionResults),
}
