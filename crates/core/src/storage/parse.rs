//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::Error as SqlError;

use crate::models::{Choice, SessionStatus, VotingStatus};

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse a session status column
pub fn parse_session_status(s: &str) -> Result<SessionStatus, SqlError> {
    match s {
        "open" => Ok(SessionStatus::Open),
        "closed" => Ok(SessionStatus::Closed),
        other => Err(invalid_text(format!("unknown session status '{other}'"))),
    }
}

/// Parse a resolution voting-status column
pub fn parse_voting_status(s: &str) -> Result<VotingStatus, SqlError> {
    match s {
        "pending" => Ok(VotingStatus::Pending),
        "active" => Ok(VotingStatus::Active),
        "closed" => Ok(VotingStatus::Closed),
        other => Err(invalid_text(format!("unknown voting status '{other}'"))),
    }
}

/// Parse a vote choice column
pub fn parse_choice(s: &str) -> Result<Choice, SqlError> {
    match s {
        "yes" => Ok(Choice::Yes),
        "no" => Ok(Choice::No),
        "abstain" => Ok(Choice::Abstain),
        other => Err(invalid_text(format!("unknown choice '{other}'"))),
    }
}

fn invalid_text(message: String) -> SqlError {
    SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, message.into())
}

/// True when `err` is a UNIQUE-constraint failure on the named columns
pub fn is_unique_violation(err: &SqlError, constraint: &str) -> bool {
    match err {
        SqlError::SqliteFailure(e, Some(message)) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation && message.contains(constraint)
        }
        _ => false,
    }
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
