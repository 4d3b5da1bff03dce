//! Vote model and per-resolution tallying

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A participant's choice on one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Yes,
    No,
    Abstain,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Yes => "yes",
            Choice::No => "no",
            Choice::Abstain => "abstain",
        }
    }
}

impl FromStr for Choice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Choice::Yes),
            "no" => Ok(Choice::No),
            "abstain" => Ok(Choice::Abstain),
            other => Err(Error::Validation(format!(
                "invalid choice '{other}', expected yes, no or abstain"
            ))),
        }
    }
}

/// One recorded choice; at most one row per (resolution, voter identity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub resolution_id: i64,
    /// Opaque identity token minted by an external collaborator
    pub voter_identity: String,
    pub choice: Choice,
    /// Time of the last write, refreshed when the choice changes
    pub voted_at: DateTime<Utc>,
}

/// Vote counts for one resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub total: u32,
}

impl Tally {
    pub fn add(&mut self, choice: Choice) {
        match choice {
            Choice::Yes => self.yes += 1,
            Choice::No => self.no += 1,
            Choice::Abstain => self.abstain += 1,
        }
        self.total += 1;
    }

    /// Ties and empty tallies are reported as such, never coerced into a
    /// pass or fail.
    pub fn outcome(&self) -> Outcome {
        if self.total == 0 {
            Outcome::Undecided
        } else if self.yes > self.no {
            Outcome::Accepted
        } else if self.no > self.yes {
            Outcome::Rejected
        } else {
            Outcome::Tie
        }
    }
}

/// Derived verdict on a resolution's tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Accepted,
    Rejected,
    Tie,
    Undecided,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_parses_allowed_values() {
        assert_eq!("yes".parse::<Choice>().unwrap(), Choice::Yes);
        assert_eq!("no".parse::<Choice>().unwrap(), Choice::No);
        assert_eq!("abstain".parse::<Choice>().unwrap(), Choice::Abstain);
    }

    #[test]
    fn test_choice_rejects_unknown_value() {
        let err = "maybe".parse::<Choice>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_tally_outcomes() {
        let mut tally = Tally::default();
        assert_eq!(tally.outcome(), Outcome::Undecided);

        tally.add(Choice::Yes);
        assert_eq!(tally.outcome(), Outcome::Accepted);

        tally.add(Choice::No);
        assert_eq!(tally.outcome(), Outcome::Tie);

        tally.add(Choice::No);
        assert_eq!(tally.outcome(), Outcome::Rejected);

        tally.add(Choice::Abstain);
        assert_eq!(tally.total, 4);
        assert_eq!(tally.yes + tally.no + tally.abstain, tally.total);
    }

    #[test]
    fn test_abstain_only_tally_is_a_tie() {
        let mut tally = Tally::default();
        tally.add(Choice::Abstain);
        tally.add(Choice::Abstain);
        assert_eq!(tally.outcome(), Outcome::Tie);
    }
}
