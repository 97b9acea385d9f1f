use serde::Serialize;
use snafu::ensure;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::*;
use crate::weight::Weight;

/// Party label of candidates running without a party. Each of them forms its
/// own group when ballots are made up.
pub const INDEPENDENT: &str = "Independent";

/// The tie-break id of a candidate.
///
/// Ids follow the alphabetical order of (surname, given name, party) and are
/// dense, so they also index the candidates of their riding.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

impl CandidateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a candidate stands in the count.
///
/// Only hopeful candidates are continuing: they are the only ones that can
/// receive transferred ballots.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum CandidateState {
    Hopeful,
    /// Reached the quota, surplus not transferred yet.
    Pending { surplus: Weight },
    Elected { order: u32 },
    Defeated,
}

impl CandidateState {
    pub fn is_continuing(&self) -> bool {
        matches!(self, CandidateState::Hopeful)
    }

    /// Pending and elected candidates both hold a seat.
    pub fn has_won(&self) -> bool {
        matches!(
            self,
            CandidateState::Pending { .. } | CandidateState::Elected { .. }
        )
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Candidate {
    pub id: CandidateId,
    pub surname: String,
    pub given_name: String,
    pub party: String,
    /// Id of the single-member district the candidate ran in.
    pub district_id: String,
    pub color: Option<String>,
    pub original_votes: u64,
    pub original_vote_pct: f64,
    pub state: CandidateState,
    pub vote: Weight,
}

impl Candidate {
    pub fn display_name(&self) -> String {
        if self.given_name.is_empty() {
            self.surname.clone()
        } else {
            format!("{} {}", self.given_name, self.surname)
        }
    }

    pub fn is_independent(&self) -> bool {
        self.party.is_empty() || self.party == INDEPENDENT
    }

    fn group_key(&self) -> String {
        if self.is_independent() {
            format!("Ind: {}", self.id.0)
        } else {
            self.party.clone()
        }
    }
}

/// One of the original single-member districts.
#[derive(PartialEq, Debug, Clone)]
pub struct District {
    pub id: String,
    pub name: String,
    pub total_ballots: u64,
    pub rejected_ballots: u64,
    /// In the order they were declared.
    pub candidates: Vec<CandidateId>,
}

impl District {
    pub fn valid_votes(&self) -> u64 {
        self.total_ballots.saturating_sub(self.rejected_ballots)
    }
}

/// A multi-member riding made of one or more single-member districts.
///
/// Built with [`crate::builder::Builder`].
#[derive(PartialEq, Debug, Clone)]
pub struct StvDistrict {
    pub name: String,
    pub districts: Vec<District>,
    pub seats: u32,
    pub(crate) candidates: Vec<Candidate>,
    /// Set once, when the count starts.
    pub quota: Option<Weight>,
}

impl StvDistrict {
    /// All the candidates, in tie-break order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate_by_id(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(id.index())
    }

    pub fn valid_votes(&self) -> u64 {
        self.districts.iter().map(|d| d.valid_votes()).sum()
    }

    pub fn first_preferences(&self) -> u64 {
        self.candidates.iter().map(|c| c.original_votes).sum()
    }

    /// Candidates grouped by party, independents on their own, in tie-break
    /// order of the first member of each group.
    pub fn party_groups(&self) -> Vec<CandidateGroup> {
        let mut groups: Vec<CandidateGroup> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for c in self.candidates.iter() {
            let pos = *positions.entry(c.group_key()).or_insert_with(|| {
                groups.push(CandidateGroup {
                    name: c.party.clone(),
                    color: c.color.clone(),
                    votes: 0,
                    candidates: Vec::new(),
                });
                groups.len() - 1
            });
            let g = &mut groups[pos];
            g.votes += c.original_votes;
            g.candidates.push(c.id);
        }
        groups
    }

    pub(crate) fn check_structure(&self) -> Result<(), VotingError> {
        let district = self.name.as_str();
        ensure!(self.seats >= 1, NoSeatsSnafu { district });
        ensure!(!self.candidates.is_empty(), NoCandidatesSnafu { district });
        ensure!(
            self.seats as usize <= self.candidates.len(),
            TooFewCandidatesSnafu {
                district,
                seats: self.seats,
                candidates: self.candidates.len()
            }
        );
        Ok(())
    }

    pub(crate) fn reset_count(&mut self) {
        self.quota = None;
        for c in self.candidates.iter_mut() {
            c.state = CandidateState::Hopeful;
            c.vote = Weight::ZERO;
        }
    }
}

/// Candidates of one party, gathered for ballot synthesis and summaries.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CandidateGroup {
    pub name: String,
    pub color: Option<String>,
    pub votes: u64,
    pub candidates: Vec<CandidateId>,
}

/// A synthetic ranked ballot.
///
/// Identical orderings share the same allocation.
#[derive(PartialEq, Debug, Clone)]
pub struct Ballot {
    order: Arc<[CandidateId]>,
    weight: Weight,
    // Index in `order` of the candidate holding this ballot.
    position: usize,
}

impl Ballot {
    pub(crate) fn new(order: Arc<[CandidateId]>) -> Ballot {
        Ballot {
            order,
            weight: Weight::ONE,
            position: 0,
        }
    }

    pub fn order(&self) -> &[CandidateId] {
        &self.order
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn current(&self) -> Option<CandidateId> {
        self.order.get(self.position).cloned()
    }

    pub(crate) fn set_weight(&mut self, weight: Weight) {
        self.weight = weight;
    }

    /// Moves the ballot to the next continuing candidate after the current
    /// one. Returns None if there is none: the ballot is exhausted.
    pub(crate) fn advance<F>(&mut self, continuing: F) -> Option<CandidateId>
    where
        F: Fn(CandidateId) -> bool,
    {
        let next = self
            .order
            .iter()
            .enumerate()
            .skip(self.position + 1)
            .find(|(_, cid)| continuing(**cid))
            .map(|(idx, cid)| (idx, *cid));
        match next {
            Some((idx, cid)) => {
                self.position = idx;
                Some(cid)
            }
            None => {
                self.position = self.order.len();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[u32]) -> Arc<[CandidateId]> {
        v.iter().map(|i| CandidateId(*i)).collect()
    }

    #[test]
    fn advance_skips_candidates_that_are_not_continuing() {
        let mut b = Ballot::new(ids(&[0, 1, 2, 3]));
        assert_eq!(b.current(), Some(CandidateId(0)));
        assert_eq!(b.advance(|c| c.0 != 1), Some(CandidateId(2)));
        assert_eq!(b.current(), Some(CandidateId(2)));
        // Never goes back to an earlier preference.
        assert_eq!(b.advance(|c| c.0 == 0), None);
        assert_eq!(b.current(), None);
    }

    #[test]
    fn state_predicates() {
        assert!(CandidateState::Hopeful.is_continuing());
        assert!(!CandidateState::Hopeful.has_won());
        let p = CandidateState::Pending {
            surplus: Weight::ONE,
        };
        assert!(p.has_won() && !p.is_continuing());
        assert!(CandidateState::Elected { order: 1 }.has_won());
        assert!(!CandidateState::Defeated.has_won());
        assert!(!CandidateState::Defeated.is_continuing());
    }
}
