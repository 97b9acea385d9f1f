pub use crate::config::*;
use crate::model::*;
use crate::weight::Weight;

use log::debug;
use snafu::{ensure, OptionExt};

/// A builder for assembling a riding from the results of its districts.
///
/// Each district added gives the riding one seat. Tie-break ids are assigned
/// when the riding is built.
///
/// ```
/// use wigm_stv::builder::Builder;
/// use wigm_stv::{CandidateEntry, VotingError};
///
/// let mut builder = Builder::new("Lakeshore");
/// builder.add_district("101", "Lakeshore North", 1000, 20)?;
/// builder.add_candidate_simple("101", "Ahmed", "Sara", "Green", 600)?;
/// builder.add_candidate("101", CandidateEntry::new("Brown", "Leo", "Blue", 380))?;
///
/// let riding = builder.build()?;
/// assert_eq!(riding.seats, 1);
/// assert_eq!(riding.valid_votes(), 980);
///
/// # Ok::<(), VotingError>(())
/// ```
pub struct Builder {
    _name: String,
    _districts: Vec<(District, Vec<CandidateEntry>)>,
}

impl Builder {
    pub fn new(name: &str) -> Builder {
        Builder {
            _name: name.to_string(),
            _districts: Vec::new(),
        }
    }

    /// Adds a member district. Its candidates are added separately.
    pub fn add_district(
        &mut self,
        id: &str,
        name: &str,
        total_ballots: u64,
        rejected_ballots: u64,
    ) -> Result<(), VotingError> {
        ensure!(
            !self._districts.iter().any(|(d, _)| d.id == id),
            DuplicateMemberDistrictSnafu {
                district: self._name.as_str(),
                member: id
            }
        );
        ensure!(
            rejected_ballots <= total_ballots,
            InvalidDistrictTotalsSnafu {
                district: self._name.as_str(),
                member: id,
                total: total_ballots,
                rejected: rejected_ballots
            }
        );
        self._districts.push((
            District {
                id: id.to_string(),
                name: name.to_string(),
                total_ballots,
                rejected_ballots,
                candidates: Vec::new(),
            },
            Vec::new(),
        ));
        Ok(())
    }

    /// Adds a candidate to a district that was already added.
    pub fn add_candidate(
        &mut self,
        district_id: &str,
        candidate: CandidateEntry,
    ) -> Result<(), VotingError> {
        let riding = self._name.as_str();
        let (_, entries) = self
            ._districts
            .iter_mut()
            .find(|(d, _)| d.id == district_id)
            .context(UnknownMemberDistrictSnafu {
                district: riding,
                member: district_id,
            })?;
        if let Some(pct) = candidate.vote_pct {
            ensure!(
                pct.is_finite() && pct >= 0.0,
                InvalidVoteShareSnafu {
                    district: riding,
                    member: district_id,
                    candidate: candidate.surname.as_str(),
                    vote_pct: pct
                }
            );
        }
        entries.push(candidate);
        Ok(())
    }

    /// Adds a candidate with only a name, a party and a vote count.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_candidate_simple(
        &mut self,
        district_id: &str,
        surname: &str,
        given_name: &str,
        party: &str,
        votes: u64,
    ) -> Result<(), VotingError> {
        self.add_candidate(
            district_id,
            CandidateEntry::new(surname, given_name, party, votes),
        )
    }

    pub fn build(self) -> Result<StvDistrict, VotingError> {
        let riding = self._name;
        let mut candidates: Vec<Candidate> = Vec::new();
        // (district index, position in the district) for every candidate.
        let mut origins: Vec<(usize, usize)> = Vec::new();
        for (d_idx, (district, entries)) in self._districts.iter().enumerate() {
            let valid = district.valid_votes();
            let votes: u64 = entries.iter().map(|e| e.votes).sum();
            ensure!(
                votes <= valid,
                VotesExceedValidSnafu {
                    district: riding.as_str(),
                    member: district.id.as_str(),
                    votes,
                    valid
                }
            );
            for (pos, e) in entries.iter().enumerate() {
                let pct = e.vote_pct.unwrap_or_else(|| {
                    if valid == 0 {
                        0.0
                    } else {
                        100.0 * e.votes as f64 / valid as f64
                    }
                });
                candidates.push(Candidate {
                    id: CandidateId(0),
                    surname: e.surname.clone(),
                    given_name: e.given_name.clone(),
                    party: e.party.clone(),
                    district_id: district.id.clone(),
                    color: e.color.clone(),
                    original_votes: e.votes,
                    original_vote_pct: pct,
                    state: CandidateState::Hopeful,
                    vote: Weight::ZERO,
                });
                origins.push((d_idx, pos));
            }
        }

        // Tie-break ids, by alphabetical order. The sort is stable, so exact
        // homonyms keep the order in which they were declared.
        let mut sorted: Vec<usize> = (0..candidates.len()).collect();
        sorted.sort_by(|&a, &b| {
            let (ca, cb) = (&candidates[a], &candidates[b]);
            (&ca.surname, &ca.given_name, &ca.party).cmp(&(&cb.surname, &cb.given_name, &cb.party))
        });

        let mut districts: Vec<District> = self._districts.into_iter().map(|(d, _)| d).collect();
        let mut slots: Vec<Vec<Option<CandidateId>>> = districts
            .iter()
            .enumerate()
            .map(|(d_idx, _)| {
                vec![None; origins.iter().filter(|(d, _)| *d == d_idx).count()]
            })
            .collect();
        let mut arena: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for (new_id, &old_idx) in sorted.iter().enumerate() {
            let mut c = candidates[old_idx].clone();
            c.id = CandidateId(new_id as u32);
            let (d_idx, pos) = origins[old_idx];
            slots[d_idx][pos] = Some(c.id);
            debug!("build: {}: tie-break id {} for {:?}", riding, new_id, c.display_name());
            arena.push(c);
        }
        for (district, ids) in districts.iter_mut().zip(slots) {
            district.candidates = ids.into_iter().flatten().collect();
        }

        Ok(StvDistrict {
            name: riding,
            seats: districts.len() as u32,
            districts,
            candidates: arena,
            quota: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_alphabetical_order() {
        let mut b = Builder::new("R");
        b.add_district("1", "One", 100, 0).unwrap();
        b.add_district("2", "Two", 100, 0).unwrap();
        b.add_candidate_simple("1", "Zed", "Amy", "Red", 40).unwrap();
        b.add_candidate_simple("1", "Adams", "Bo", "Blue", 30).unwrap();
        b.add_candidate_simple("2", "Adams", "Al", "Red", 50).unwrap();
        let r = b.build().unwrap();
        let names: Vec<String> = r.candidates().iter().map(|c| c.display_name()).collect();
        assert_eq!(names, vec!["Al Adams", "Bo Adams", "Amy Zed"]);
        assert_eq!(r.districts[0].candidates, vec![CandidateId(2), CandidateId(1)]);
        assert_eq!(r.districts[1].candidates, vec![CandidateId(0)]);
        assert_eq!(r.candidate_by_id(CandidateId(2)).unwrap().surname, "Zed");
        assert_eq!(r.seats, 2);
    }

    #[test]
    fn vote_share_is_computed_from_valid_votes() {
        let mut b = Builder::new("R");
        b.add_district("1", "One", 110, 10).unwrap();
        b.add_candidate_simple("1", "A", "", "P", 25).unwrap();
        let r = b.build().unwrap();
        assert_eq!(r.candidates()[0].original_vote_pct, 25.0);
    }

    #[test]
    fn too_many_votes() {
        let mut b = Builder::new("R");
        b.add_district("1", "One", 100, 10).unwrap();
        b.add_candidate_simple("1", "A", "", "P", 60).unwrap();
        b.add_candidate_simple("1", "B", "", "Q", 31).unwrap();
        assert!(matches!(
            b.build(),
            Err(VotingError::VotesExceedValid { votes: 91, valid: 90, .. })
        ));
    }

    #[test]
    fn vote_shares_must_be_positive_numbers() {
        let mut b = Builder::new("R");
        b.add_district("1", "One", 100, 0).unwrap();
        for pct in [-10.0, f64::NAN, f64::INFINITY] {
            let mut entry = CandidateEntry::new("A", "", "P", 10);
            entry.vote_pct = Some(pct);
            assert!(matches!(
                b.add_candidate("1", entry),
                Err(VotingError::InvalidVoteShare { ref candidate, .. }) if candidate == "A"
            ));
        }
        let mut entry = CandidateEntry::new("A", "", "P", 10);
        entry.vote_pct = Some(0.0);
        b.add_candidate("1", entry).unwrap();
        assert_eq!(b.build().unwrap().candidates()[0].original_vote_pct, 0.0);
    }

    #[test]
    fn bad_district_input() {
        let mut b = Builder::new("R");
        assert!(matches!(
            b.add_district("1", "One", 10, 11),
            Err(VotingError::InvalidDistrictTotals { .. })
        ));
        b.add_district("1", "One", 10, 1).unwrap();
        assert!(matches!(
            b.add_district("1", "Again", 10, 1),
            Err(VotingError::DuplicateMemberDistrict { .. })
        ));
        assert!(matches!(
            b.add_candidate_simple("9", "A", "", "P", 1),
            Err(VotingError::UnknownMemberDistrict { .. })
        ));
    }
}
