//! Plenum Core Library
//!
//! State machine and vote ledger for moderator-run resolution voting: a
//! session carries an ordered list of resolutions, the moderator opens
//! voting on one resolution at a time, and anonymous participants cast
//! yes/no/abstain choices they can revise until voting ends.

pub mod ballots;
pub mod error;
pub mod invariants;
pub mod models;
pub mod reports;
pub mod resolutions;
pub mod sessions;
pub mod storage;

pub use ballots::BallotService;
pub use error::{Error, Result};
pub use models::*;
pub use reports::ReportService;
pub use resolutions::ResolutionService;
pub use sessions::SessionService;
pub use storage::Database;
