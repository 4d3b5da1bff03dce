//! Resolution voting-state transitions
//!
//! Holds the single-active rule: promoting one resolution demotes any active
//! sibling inside the same transaction, so concurrent activations serialize
//! on the store instead of racing each other.

use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::invariants;
use crate::models::{Resolution, SessionStatus, VotingSession, VotingStatus};
use crate::storage::{Database, ResolutionStore};

pub struct ResolutionService<'a> {
    db: &'a Database,
}

impl<'a> ResolutionService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Open voting on a resolution.
    ///
    /// Any other active resolution in the session is demoted back to pending
    /// in the same transaction. Activating the already-active resolution is
    /// a no-op; a closed resolution or a non-open session is a conflict.
    #[instrument(skip(self))]
    pub fn activate(&self, resolution_id: i64) -> Result<Resolution> {
        let (resolution, session) = self.load(resolution_id)?;

        if session.status != SessionStatus::Open {
            return Err(Error::StateConflict(
                "cannot open voting in a session that is not open".into(),
            ));
        }
        match resolution.voting_status {
            VotingStatus::Closed => {
                return Err(Error::StateConflict(
                    "voting on this resolution has already ended".into(),
                ))
            }
            VotingStatus::Active => return Ok(resolution),
            VotingStatus::Pending => {}
        }

        self.db.with_transaction(|conn| {
            let store = ResolutionStore::new(conn);
            let demoted = store.demote_active_siblings(resolution.session_id, resolution_id)?;
            if demoted > 0 {
                info!(
                    session_id = resolution.session_id,
                    demoted, "demoted previously active resolution"
                );
            }
            store.set_status(resolution_id, VotingStatus::Active)
        })?;

        info!(resolution_id, session_id = resolution.session_id, "voting opened");

        if cfg!(debug_assertions) {
            let all = self.db.resolutions().list_for_session(resolution.session_id)?;
            invariants::assert_single_active(&all);
        }

        self.reload(resolution_id)
    }

    /// End voting on a resolution.
    ///
    /// Works from both active and pending (a skipped resolution closes
    /// without ever having been voted on). Re-closing is a no-op; a non-open
    /// session freezes all resolution sub-states.
    #[instrument(skip(self))]
    pub fn deactivate(&self, resolution_id: i64) -> Result<Resolution> {
        let (resolution, session) = self.load(resolution_id)?;

        if session.status != SessionStatus::Open {
            return Err(Error::StateConflict(
                "cannot change resolutions of a session that is not open".into(),
            ));
        }
        if resolution.voting_status == VotingStatus::Closed {
            return Ok(resolution);
        }

        self.db
            .resolutions()
            .set_status(resolution_id, VotingStatus::Closed)?;

        info!(resolution_id, session_id = resolution.session_id, "voting ended");
        self.reload(resolution_id)
    }

    fn load(&self, resolution_id: i64) -> Result<(Resolution, VotingSession)> {
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
        Ok((resolution, session))
    }

    fn reload(&self, resolution_id: i64) -> Result<Resolution> {
        self.db
            .resolutions()
            .find_by_id(resolution_id)?
            .ok_or_else(|| Error::NotFound(format!("resolution {resolution_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionService;

    fn seed(db: &Database, texts: &[&str]) -> (i64, Vec<i64>) {
        let texts: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        let session = SessionService::new(db).create("Test", 1, &texts).unwrap();
        let ids = db
            .resolutions()
            .list_for_session(session.id)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        (session.id, ids)
    }

    #[test]
    fn test_activation_hands_over_the_active_slot() {
        let db = Database::open_in_memory().unwrap();
        let (session_id, ids) = seed(&db, &["R1", "R2"]);
        let service = ResolutionService::new(&db);

        let r1 = service.activate(ids[0]).unwrap();
        assert_eq!(r1.voting_status, VotingStatus::Active);
        assert_eq!(
            db.resolutions().find_by_id(ids[1]).unwrap().unwrap().voting_status,
            VotingStatus::Pending
        );

        // Activating R2 demotes R1 in the same step
        let r2 = service.activate(ids[1]).unwrap();
        assert_eq!(r2.voting_status, VotingStatus::Active);
        assert_eq!(
            db.resolutions().find_by_id(ids[0]).unwrap().unwrap().voting_status,
            VotingStatus::Pending
        );
        assert_eq!(db.resolutions().active_count(session_id).unwrap(), 1);

        let closed = service.deactivate(ids[1]).unwrap();
        assert_eq!(closed.voting_status, VotingStatus::Closed);
        assert_eq!(db.resolutions().active_count(session_id).unwrap(), 0);
    }

    #[test]
    fn test_activate_is_idempotent_on_the_active_resolution() {
        let db = Database::open_in_memory().unwrap();
        let (_, ids) = seed(&db, &["R1"]);
        let service = ResolutionService::new(&db);

        service.activate(ids[0]).unwrap();
        let again = service.activate(ids[0]).unwrap();
        assert_eq!(again.voting_status, VotingStatus::Active);
    }

    #[test]
    fn test_closed_resolutions_never_reopen() {
        let db = Database::open_in_memory().unwrap();
        let (_, ids) = seed(&db, &["R1"]);
        let service = ResolutionService::new(&db);

        service.activate(ids[0]).unwrap();
        service.deactivate(ids[0]).unwrap();

        assert!(matches!(
            service.activate(ids[0]),
            Err(Error::StateConflict(_))
        ));

        // Re-closing stays a quiet success
        let again = service.deactivate(ids[0]).unwrap();
        assert_eq!(again.voting_status, VotingStatus::Closed);
    }

    #[test]
    fn test_skipping_a_pending_resolution_closes_it() {
        let db = Database::open_in_memory().unwrap();
        let (_, ids) = seed(&db, &["R1"]);
        let service = ResolutionService::new(&db);

        let skipped = service.deactivate(ids[0]).unwrap();
        assert_eq!(skipped.voting_status, VotingStatus::Closed);
    }

    #[test]
    fn test_closed_session_freezes_resolutions() {
        let db = Database::open_in_memory().unwrap();
        let (session_id, ids) = seed(&db, &["R1", "R2"]);
        let service = ResolutionService::new(&db);

        service.activate(ids[0]).unwrap();
        SessionService::new(&db).close(session_id).unwrap();

        assert!(matches!(
            service.activate(ids[1]),
            Err(Error::StateConflict(_))
        ));
        assert!(matches!(
            service.deactivate(ids[0]),
            Err(Error::StateConflict(_))
        ));
    }

    #[test]
    fn test_unknown_resolution_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let service = ResolutionService::new(&db);

        assert!(matches!(service.activate(42), Err(Error::NotFound(_))));
        assert!(matches!(service.deactivate(42), Err(Error::NotFound(_))));
    }
}
