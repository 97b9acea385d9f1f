// ********* Input data structures ***********

use serde::Serialize;
use snafu::{ensure, Snafu};

use crate::model::{CandidateGroup, CandidateId};
use crate::weight::{Weight, MAX_PRECISION};

/// One line of first-preference results, as published for a single-member district.
///
/// In most cases, it is enough to use the higher-level builder API.
#[derive(PartialEq, Debug, Clone)]
pub struct CandidateEntry {
    pub surname: String,
    pub given_name: String,
    pub party: String,
    pub votes: u64,
    /// Share of the valid votes of the home district, in percent.
    /// Computed from the district totals when missing.
    pub vote_pct: Option<f64>,
    /// Display only.
    pub color: Option<String>,
}

impl CandidateEntry {
    pub fn new(surname: &str, given_name: &str, party: &str, votes: u64) -> CandidateEntry {
        CandidateEntry {
            surname: surname.to_string(),
            given_name: given_name.to_string(),
            party: party.to_string(),
            votes,
            vote_pct: None,
            color: None,
        }
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct Winner {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    /// 1 for the first candidate declared elected.
    pub order: u32,
    pub vote: Weight,
}

/// The outcome of counting one riding.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CountResult {
    pub district: String,
    pub seats: u32,
    pub quota: Weight,
    /// Number of synthetic ballots in the count.
    pub ballots: u64,
    pub winners: Vec<Winner>,
    pub exhausted: u64,
    pub exhausted_weight: Weight,
    pub rounds: u32,
    pub groups: Vec<CandidateGroup>,
}

/// Errors that prevent a riding from being counted.
///
/// All of them are fatal for the riding they name and for that riding only.
#[derive(PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VotingError {
    #[snafu(display("{district}: a riding needs at least one seat"))]
    NoSeats { district: String },

    #[snafu(display("{district}: no candidates to count"))]
    NoCandidates { district: String },

    #[snafu(display("{district}: {seats} seats but only {candidates} candidates"))]
    TooFewCandidates {
        district: String,
        seats: u32,
        candidates: usize,
    },

    #[snafu(display(
        "{district}: member district {member} has {rejected} rejected ballots out of {total}"
    ))]
    InvalidDistrictTotals {
        district: String,
        member: String,
        total: u64,
        rejected: u64,
    },

    #[snafu(display(
        "{district}: candidates of member district {member} received {votes} votes, more than the {valid} valid votes"
    ))]
    VotesExceedValid {
        district: String,
        member: String,
        votes: u64,
        valid: u64,
    },

    #[snafu(display("{district}: no member district with id {member}"))]
    UnknownMemberDistrict { district: String, member: String },

    #[snafu(display("{district}: member district {member} added twice"))]
    DuplicateMemberDistrict { district: String, member: String },

    #[snafu(display(
        "{district}: {candidate} in member district {member} has an invalid vote share {vote_pct}"
    ))]
    InvalidVoteShare {
        district: String,
        member: String,
        candidate: String,
        vote_pct: f64,
    },

    #[snafu(display(
        "{district}: precision {precision} is not supported (at most 9 decimals)"
    ))]
    InvalidPrecision { district: String, precision: u32 },

    #[snafu(display(
        "{district}: ballot synthesis failed for {candidate} (group {group}): {remainder} ballots left over for {permutations} orderings"
    ))]
    BallotSynthesis {
        district: String,
        group: String,
        candidate: String,
        remainder: i128,
        permutations: usize,
    },

    #[snafu(display("{district}: count did not complete after {rounds} rounds"))]
    NoConvergence { district: String, rounds: u32 },
}

// ********* Configuration **********

/// How ballots are made up from the first-preference totals.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum BallotMethod {
    /// Later preferences stay within the party of the first choice, in
    /// proportion to how well each candidate did in their home district.
    PartyVote,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CountMethod {
    /// Weighted Inclusive Gregory Method, with truncated arithmetic.
    Wigm,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountRules {
    /// Decimal places kept in votes, weights and the quota.
    pub precision: u32,
    pub ballot_method: BallotMethod,
    pub count_method: CountMethod,
}

impl CountRules {
    pub const DEFAULT_RULES: CountRules = CountRules {
        precision: 4,
        ballot_method: BallotMethod::PartyVote,
        count_method: CountMethod::Wigm,
    };

    pub(crate) fn check(&self, district: &str) -> Result<(), VotingError> {
        ensure!(
            self.precision <= MAX_PRECISION,
            InvalidPrecisionSnafu {
                district,
                precision: self.precision
            }
        );
        Ok(())
    }
}

impl Default for CountRules {
    fn default() -> Self {
        CountRules::DEFAULT_RULES
    }
}
