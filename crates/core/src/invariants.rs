//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Resolution, SessionStatus, VotingSession, VotingStatus};

/// A session never carries more than one active resolution
pub fn assert_single_active(resolutions: &[Resolution]) {
    let active = resolutions
        .iter()
        .filter(|r| r.voting_status == VotingStatus::Active)
        .count();
    debug_assert!(
        active <= 1,
        "{} resolutions active at once, expected 0 or 1",
        active
    );
}

/// Validate that a session's state is internally consistent
pub fn assert_session_consistent(session: &VotingSession) {
    // closed_at is present exactly when the session is closed
    debug_assert!(
        (session.status == SessionStatus::Closed) == session.closed_at.is_some(),
        "session {} status {:?} disagrees with closed_at {:?}",
        session.id,
        session.status,
        session.closed_at
    );

    debug_assert!(
        !session.title.trim().is_empty(),
        "session {} has blank title",
        session.id
    );

    debug_assert!(
        !session.code.trim().is_empty(),
        "session {} has blank join code",
        session.id
    );
}
