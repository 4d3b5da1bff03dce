//! Voting session model and the participant-facing view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Choice, VotingStatus};

/// Super-state of a session; once closed it never reopens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

/// One voting event: an ordered list of resolutions run by a moderator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingSession {
    pub id: i64,
    /// Join code participants type in; unique across all sessions
    pub code: String,
    pub title: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly when the session transitions to closed
    pub closed_at: Option<DateTime<Utc>>,
    /// Moderator reference; accounts live outside this crate
    pub created_by: i64,
}

impl VotingSession {
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

/// Filter for session listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Open,
    Closed,
    All,
}

/// What a participant sees after joining: pending resolutions are hidden
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub status: SessionStatus,
    pub resolutions: Vec<ResolutionView>,
}

/// A visible resolution, annotated with the caller's current choice
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionView {
    pub id: i64,
    pub text: String,
    pub position: u32,
    pub voting_status: VotingStatus,
    pub voted_choice: Option<Choice>,
}
