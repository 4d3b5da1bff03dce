//! Session lifecycle operations
//!
//! Creation is all-or-nothing: the session row, its join code, and every
//! resolution land in one transaction. Closing is idempotent and final.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::invariants;
use crate::models::{
    ResolutionView, SessionStatus, SessionView, StatusFilter, VotingSession, VotingStatus,
};
use crate::storage::{is_unique_violation, Database, ResolutionStore, SessionStore};

/// Join code alphabet: digits and upper-case letters
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Join code length
const CODE_LENGTH: usize = 6;
/// Collision retries before code generation gives up
const MAX_CODE_ATTEMPTS: u32 = 16;

pub struct SessionService<'a> {
    db: &'a Database,
}

impl<'a> SessionService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a session with its resolutions, numbered 1..N in input order.
    ///
    /// Nothing is persisted unless every row lands; a failure mid-way rolls
    /// the whole creation back.
    #[instrument(skip(self, title, resolution_texts), fields(resolutions = resolution_texts.len()))]
    pub fn create(
        &self,
        title: &str,
        moderator_id: i64,
        resolution_texts: &[String],
    ) -> Result<VotingSession> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("session title must not be blank".into()));
        }
        if moderator_id <= 0 {
            return Err(Error::Validation("moderator id is required".into()));
        }
        if resolution_texts.is_empty() {
            return Err(Error::Validation(
                "a session needs at least one resolution".into(),
            ));
        }
        if resolution_texts.iter().any(|text| text.trim().is_empty()) {
            return Err(Error::Validation(
                "resolution text must not be blank".into(),
            ));
        }

        let created_at = Utc::now();
        let session_id = self.db.with_transaction(|conn| {
            let sessions = SessionStore::new(conn);
            let session_id = insert_with_fresh_code(&sessions, title, moderator_id, created_at)?;

            let resolutions = ResolutionStore::new(conn);
            for (index, text) in resolution_texts.iter().enumerate() {
                resolutions.insert(session_id, text.trim(), index as u32 + 1)?;
            }
            Ok(session_id)
        })?;

        info!(session_id, "session created");
        let session = self.require(session_id)?;
        invariants::assert_session_consistent(&session);
        Ok(session)
    }

    /// Close a session, stamping its closure time.
    ///
    /// Closing an already-closed session returns it unchanged.
    #[instrument(skip(self))]
    pub fn close(&self, session_id: i64) -> Result<VotingSession> {
        let store = self.db.sessions();
        let session = store
            .find_by_id(session_id)?
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;

        if session.status == SessionStatus::Closed {
            return Ok(session);
        }

        if !store.mark_closed(session_id, Utc::now())? {
            // Another writer closed it between our read and the update
            warn!(session_id, "session was closed concurrently");
        }

        info!(session_id, "session closed");
        let session = self.require(session_id)?;
        invariants::assert_session_consistent(&session);
        Ok(session)
    }

    /// Find session by ID
    pub fn find_by_id(&self, session_id: i64) -> Result<Option<VotingSession>> {
        self.db.sessions().find_by_id(session_id)
    }

    /// Find session by join code
    pub fn find_by_code(&self, code: &str) -> Result<Option<VotingSession>> {
        self.db.sessions().find_by_code(code)
    }

    /// List sessions matching the filter
    pub fn list(&self, filter: StatusFilter) -> Result<Vec<VotingSession>> {
        self.db.sessions().list(filter)
    }

    /// Participant entry point: resolve a join code into the voting view.
    ///
    /// Pending resolutions stay hidden; each visible one carries the
    /// caller's current choice so a rejoining browser can restore its state.
    #[instrument(skip(self, voter_identity))]
    pub fn join_by_code(&self, code: &str, voter_identity: &str) -> Result<SessionView> {
        let session = self
            .db
            .sessions()
            .find_by_code(code)?
            .ok_or_else(|| Error::NotFound(format!("session code {code}")))?;

        if !session.is_open() {
            return Err(Error::StateConflict(
                "session is not open for joining".into(),
            ));
        }

        let votes = self.db.votes();
        let mut visible = Vec::new();
        for resolution in self.db.resolutions().list_for_session(session.id)? {
            if resolution.voting_status == VotingStatus::Pending {
                continue;
            }
            let voted_choice = votes
                .find_for_voter(resolution.id, voter_identity)?
                .map(|vote| vote.choice);
            visible.push(ResolutionView {
                id: resolution.id,
                text: resolution.text,
                position: resolution.position,
                voting_status: resolution.voting_status,
                voted_choice,
            });
        }

        Ok(SessionView {
            id: session.id,
            code: session.code,
            title: session.title,
            status: session.status,
            resolutions: visible,
        })
    }

    fn require(&self, session_id: i64) -> Result<VotingSession> {
        self.db
            .sessions()
            .find_by_id(session_id)?
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }
}

/// Insert the session row, regenerating the join code on collision.
///
/// The UNIQUE constraint on `sessions.code` is the arbiter; retries are
/// capped so a pathological collision rate cannot loop forever.
fn insert_with_fresh_code(
    store: &SessionStore<'_>,
    title: &str,
    moderator_id: i64,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code();
        match store.insert(&code, title, moderator_id, created_at) {
            Ok(id) => return Ok(id),
            Err(Error::Database(ref e)) if is_unique_violation(e, "sessions.code") => {
                warn!(%code, "join code collision, retrying");
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::Persistence(
        "could not generate a unique join code".into(),
    ))
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Choice;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_validates_input() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        let blank_title = service.create("  ", 1, &texts(&["R1"]));
        assert!(matches!(blank_title, Err(Error::Validation(_))));

        let no_moderator = service.create("Vote", 0, &texts(&["R1"]));
        assert!(matches!(no_moderator, Err(Error::Validation(_))));

        let empty_list = service.create("Vote", 1, &[]);
        assert!(matches!(empty_list, Err(Error::Validation(_))));

        let blank_entry = service.create("Vote", 1, &texts(&["R1", " "]));
        assert!(matches!(blank_entry, Err(Error::Validation(_))));

        // A rejected creation leaves nothing behind
        assert!(service.list(StatusFilter::All).unwrap().is_empty());
    }

    #[test]
    fn test_create_numbers_resolutions_in_input_order() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        let session = service
            .create("Annual meeting", 7, &texts(&["Budget", "Elections", "Bylaws"]))
            .unwrap();

        assert_eq!(session.status, SessionStatus::Open);
        assert_eq!(session.closed_at, None);
        assert_eq!(session.created_by, 7);
        assert_eq!(session.code.len(), CODE_LENGTH);
        assert!(session
            .code
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b)));

        let resolutions = db.resolutions().list_for_session(session.id).unwrap();
        assert_eq!(resolutions.len(), 3);
        let listed: Vec<(u32, &str)> = resolutions
            .iter()
            .map(|r| (r.position, r.text.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![(1, "Budget"), (2, "Elections"), (3, "Bylaws")]
        );
        assert!(resolutions
            .iter()
            .all(|r| r.voting_status == VotingStatus::Pending));
    }

    #[test]
    fn test_created_sessions_get_distinct_codes() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        let first = service.create("One", 1, &texts(&["R1"])).unwrap();
        let second = service.create("Two", 1, &texts(&["R1"])).unwrap();
        assert_ne!(first.code, second.code);
        assert_eq!(
            service.find_by_code(&first.code).unwrap().unwrap().id,
            first.id
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        let session = service.create("Vote", 1, &texts(&["R1"])).unwrap();

        let closed = service.close(session.id).unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        let stamped = closed.closed_at.unwrap();

        let again = service.close(session.id).unwrap();
        assert_eq!(again.status, SessionStatus::Closed);
        assert_eq!(again.closed_at, Some(stamped));
    }

    #[test]
    fn test_close_unknown_session() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        assert!(matches!(service.close(999), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_join_hides_pending_resolutions() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        let session = service.create("Vote", 1, &texts(&["R1", "R2"])).unwrap();
        let resolutions = db.resolutions().list_for_session(session.id).unwrap();

        // Nothing opened yet: the view is empty
        let view = service.join_by_code(&session.code, "voter-a").unwrap();
        assert!(view.resolutions.is_empty());

        db.resolutions()
            .set_status(resolutions[0].id, VotingStatus::Active)
            .unwrap();
        db.votes()
            .cast_or_update(resolutions[0].id, "voter-a", Choice::Yes, Utc::now())
            .unwrap();

        let view = service.join_by_code(&session.code, "voter-a").unwrap();
        assert_eq!(view.resolutions.len(), 1);
        assert_eq!(view.resolutions[0].id, resolutions[0].id);
        assert_eq!(view.resolutions[0].voted_choice, Some(Choice::Yes));

        // A different identity sees the resolution but no prior choice
        let other = service.join_by_code(&session.code, "voter-b").unwrap();
        assert_eq!(other.resolutions[0].voted_choice, None);
    }

    #[test]
    fn test_join_rejects_unknown_code_and_closed_session() {
        let db = Database::open_in_memory().unwrap();
        let service = SessionService::new(&db);

        assert!(matches!(
            service.join_by_code("NOPE00", "voter-a"),
            Err(Error::NotFound(_))
        ));

        let session = service.create("Vote", 1, &texts(&["R1"])).unwrap();
        service.close(session.id).unwrap();
        assert!(matches!(
            service.join_by_code(&session.code, "voter-a"),
            Err(Error::StateConflict(_))
        ));
    }

    #[test]
    fn test_generated_codes_use_the_alphabet() {
        for _ in 0..32 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }
}
