//! Resolution model

use serde::{Deserialize, Serialize};

/// Voting sub-state of a resolution.
///
/// `Active` is reachable only while the owning session is open, and at most
/// one resolution per session holds it. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingStatus {
    Pending,
    Active,
    Closed,
}

impl VotingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingStatus::Pending => "pending",
            VotingStatus::Active => "active",
            VotingStatus::Closed => "closed",
        }
    }
}

/// One item put to a yes/no/abstain vote within a session.
///
/// Text and position are fixed at creation; only `voting_status` changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub id: i64,
    pub session_id: i64,
    pub text: String,
    /// Display ordinal, 1-based and unique per session
    pub position: u32,
    pub voting_status: VotingStatus,
}

impl Resolution {
    pub fn is_active(&self) -> bool {
        self.voting_status == VotingStatus::Active
    }
}
