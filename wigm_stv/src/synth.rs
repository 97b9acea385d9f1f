use log::{debug, info};
use snafu::ensure;
use std::sync::Arc;

use crate::config::*;
use crate::model::*;

/// A group member and the weight of its later preferences (its vote share
/// in its home district).
type Member = (CandidateId, f64);

// Products that should land on a whole number may come out a hair below it
// in floating point.
const FLOOR_TOLERANCE: f64 = 1e-9;

struct Branch {
    ordered: Vec<CandidateId>,
    remaining: Vec<Member>,
    weight: f64,
}

/// Lazily enumerates all the orderings of a party group that start with a
/// given candidate, along with their probability.
///
/// At each rank, a remaining candidate is picked in proportion to its share
/// among the candidates not ranked yet. The sequence is consumed once.
pub struct Orderings {
    stack: Vec<Branch>,
}

impl Orderings {
    pub fn anchored(members: &[Member], anchor: usize) -> Orderings {
        let mut remaining = members.to_vec();
        let (first, _) = remaining.remove(anchor);
        Orderings {
            stack: vec![Branch {
                ordered: vec![first],
                remaining,
                weight: 1.0,
            }],
        }
    }
}

impl Iterator for Orderings {
    type Item = (Vec<CandidateId>, f64);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(branch) = self.stack.pop() {
            if branch.remaining.is_empty() {
                return Some((branch.ordered, branch.weight));
            }
            let total: f64 = branch.remaining.iter().map(|(_, pct)| pct).sum();
            let n = branch.remaining.len() as f64;
            // Pushed in reverse so that the branches come out in member order.
            for idx in (0..branch.remaining.len()).rev() {
                let mut remaining = branch.remaining.clone();
                let (cid, pct) = remaining.remove(idx);
                // Nobody got any vote: all the continuations are equally likely.
                let share = if total > 0.0 { pct / total } else { 1.0 / n };
                let mut ordered = branch.ordered.clone();
                ordered.push(cid);
                self.stack.push(Branch {
                    ordered,
                    remaining,
                    weight: branch.weight * share,
                });
            }
        }
        None
    }
}

/// A ranked ordering and how many ballots carry it.
#[derive(PartialEq, Debug, Clone)]
pub struct BallotDef {
    pub order: Arc<[CandidateId]>,
    pub weight: f64,
    pub count: u64,
}

/// Turns the orderings anchored at one candidate into ballot counts that
/// add up exactly to the votes of that candidate.
fn anchored_definitions(
    district: &StvDistrict,
    group: &CandidateGroup,
    members: &[Member],
    anchor: usize,
) -> Result<Vec<BallotDef>, VotingError> {
    let candidate = &district.candidates[members[anchor].0.index()];
    let votes = candidate.original_votes;
    let mut defs: Vec<BallotDef> = Orderings::anchored(members, anchor)
        .map(|(order, weight)| BallotDef {
            order: order.into(),
            weight,
            count: (votes as f64 * weight + FLOOR_TOLERANCE).floor() as u64,
        })
        .collect();

    let assigned: u64 = defs.iter().map(|d| d.count).sum();
    let remainder = votes as i128 - assigned as i128;
    ensure!(
        remainder >= 0 && (remainder as usize) < defs.len(),
        BallotSynthesisSnafu {
            district: district.name.as_str(),
            group: group.name.as_str(),
            candidate: candidate.display_name(),
            remainder,
            permutations: defs.len()
        }
    );

    if remainder > 0 {
        // The most likely ordering takes everything left over.
        let mut modal = 0;
        for (idx, d) in defs.iter().enumerate() {
            if d.weight > defs[modal].weight {
                modal = idx;
            }
        }
        debug!(
            "anchored_definitions: {}: {} ballots left over, added to {:?}",
            candidate.display_name(),
            remainder,
            defs[modal].order
        );
        defs[modal].count += remainder as u64;
    }
    Ok(defs)
}

/// All the ballot definitions of a riding, group by group.
pub fn ballot_definitions(district: &StvDistrict) -> Result<Vec<BallotDef>, VotingError> {
    let mut res: Vec<BallotDef> = Vec::new();
    for group in district.party_groups() {
        let members: Vec<Member> = group
            .candidates
            .iter()
            .map(|cid| (*cid, district.candidates[cid.index()].original_vote_pct))
            .collect();
        debug!(
            "ballot_definitions: group {:?} with {} candidates",
            group.name,
            members.len()
        );
        for anchor in 0..members.len() {
            res.extend(anchored_definitions(district, &group, &members, anchor)?);
        }
    }
    Ok(res)
}

/// Makes up the ballots of a riding, with the preferences restricted to the
/// party of the first choice.
pub fn generate_ballots(district: &StvDistrict) -> Result<Vec<Ballot>, VotingError> {
    let defs = ballot_definitions(district)?;
    let mut ballots: Vec<Ballot> = Vec::with_capacity(district.first_preferences() as usize);
    for d in defs.iter() {
        for _ in 0..d.count {
            ballots.push(Ballot::new(d.order.clone()));
        }
    }
    info!(
        "generate_ballots: {}: {} ballots from {} orderings",
        district.name,
        ballots.len(),
        defs.len()
    );
    Ok(ballots)
}

pub fn synthesize(district: &StvDistrict, method: BallotMethod) -> Result<Vec<Ballot>, VotingError> {
    match method {
        BallotMethod::PartyVote => generate_ballots(district),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use proptest::prelude::*;
    use std::collections::{HashMap, HashSet};

    fn members(pcts: &[f64]) -> Vec<Member> {
        pcts.iter()
            .enumerate()
            .map(|(i, p)| (CandidateId(i as u32), *p))
            .collect()
    }

    fn factorial(n: usize) -> usize {
        (1..=n).product()
    }

    fn first_choice_counts(ballots: &[Ballot]) -> HashMap<CandidateId, u64> {
        let mut m: HashMap<CandidateId, u64> = HashMap::new();
        for b in ballots {
            *m.entry(b.order()[0]).or_insert(0) += 1;
        }
        m
    }

    #[test]
    fn orderings_of_a_group_of_four() {
        let ms = members(&[40.0, 30.0, 20.0, 10.0]);
        for anchor in 0..4 {
            let all: Vec<(Vec<CandidateId>, f64)> = Orderings::anchored(&ms, anchor).collect();
            assert_eq!(all.len(), factorial(3));
            let distinct: HashSet<Vec<CandidateId>> = all.iter().map(|(o, _)| o.clone()).collect();
            assert_eq!(distinct.len(), all.len());
            assert!(all.iter().all(|(o, _)| o[0] == CandidateId(anchor as u32) && o.len() == 4));
            let total: f64 = all.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn ordering_weights_follow_vote_shares() {
        let ms = members(&[50.0, 30.0, 10.0]);
        let all: Vec<(Vec<CandidateId>, f64)> = Orderings::anchored(&ms, 0).collect();
        assert_eq!(all[0].0, vec![CandidateId(0), CandidateId(1), CandidateId(2)]);
        assert!((all[0].1 - 0.75).abs() < 1e-12);
        assert_eq!(all[1].0, vec![CandidateId(0), CandidateId(2), CandidateId(1)]);
        assert!((all[1].1 - 0.25).abs() < 1e-12);
    }

    #[test]
    fn orderings_without_any_vote_share() {
        let ms = members(&[0.0, 0.0, 0.0]);
        let all: Vec<(Vec<CandidateId>, f64)> = Orderings::anchored(&ms, 1).collect();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|(_, w)| (*w - 0.5).abs() < 1e-12));
    }

    #[test]
    fn singleton_group() {
        let all: Vec<(Vec<CandidateId>, f64)> = Orderings::anchored(&members(&[12.0]), 0).collect();
        assert_eq!(all, vec![(vec![CandidateId(0)], 1.0)]);
    }

    #[test]
    fn exact_split_leaves_no_remainder() {
        // 75% / 25% of 100 votes: the floors already add up.
        let mut b = Builder::new("R");
        b.add_district("1", "One", 1000, 0).unwrap();
        b.add_candidate_simple("1", "A", "", "P", 100).unwrap();
        b.add_candidate_simple("1", "B", "", "P", 150).unwrap();
        b.add_candidate_simple("1", "C", "", "P", 50).unwrap();
        let r = b.build().unwrap();
        let defs = ballot_definitions(&r).unwrap();
        let from_a: Vec<&BallotDef> = defs.iter().filter(|d| d.order[0] == CandidateId(0)).collect();
        assert_eq!(from_a.len(), 2);
        assert_eq!(from_a[0].count, 75);
        assert_eq!(from_a[1].count, 25);
    }

    #[test]
    fn remainder_goes_to_the_most_likely_ordering() {
        // Anchor A with 10 votes, B and C at 2/3 and 1/3: floors are 6 and 3.
        let mut b = Builder::new("R");
        b.add_district("1", "One", 1000, 0).unwrap();
        b.add_candidate_simple("1", "A", "", "P", 10).unwrap();
        b.add_candidate_simple("1", "B", "", "P", 200).unwrap();
        b.add_candidate_simple("1", "C", "", "P", 100).unwrap();
        let r = b.build().unwrap();
        let defs = ballot_definitions(&r).unwrap();
        let from_a: Vec<&BallotDef> = defs.iter().filter(|d| d.order[0] == CandidateId(0)).collect();
        assert_eq!(from_a[0].order.as_ref(), &[CandidateId(0), CandidateId(1), CandidateId(2)]);
        assert_eq!(from_a[0].count, 7);
        assert_eq!(from_a[1].count, 3);
    }

    #[test]
    fn impossible_split_names_the_candidate() {
        let mut b = Builder::new("R");
        b.add_district("1", "One", 1000, 0).unwrap();
        b.add_candidate_simple("1", "A", "", "P", 100).unwrap();
        b.add_candidate_simple("1", "B", "", "P", 300).unwrap();
        b.add_candidate_simple("1", "C", "", "P", 100).unwrap();
        let mut r = b.build().unwrap();
        // Shares of 30 and -10: the orderings of A ask for 150 and -50 ballots.
        r.candidates[2].original_vote_pct = -10.0;
        let res = generate_ballots(&r);
        assert_eq!(
            res,
            Err(VotingError::BallotSynthesis {
                district: "R".to_string(),
                group: "P".to_string(),
                candidate: "A".to_string(),
                remainder: -50,
                permutations: 2,
            })
        );
    }

    #[test]
    fn parties_do_not_mix() {
        let mut b = Builder::new("R");
        b.add_district("1", "One", 1000, 0).unwrap();
        b.add_district("2", "Two", 1000, 0).unwrap();
        b.add_candidate_simple("1", "A", "", "Red", 300).unwrap();
        b.add_candidate_simple("1", "B", "", "Blue", 200).unwrap();
        b.add_candidate_simple("1", "C", "", INDEPENDENT, 50).unwrap();
        b.add_candidate_simple("2", "D", "", "Red", 250).unwrap();
        b.add_candidate_simple("2", "E", "", INDEPENDENT, 40).unwrap();
        let r = b.build().unwrap();
        let ballots = generate_ballots(&r).unwrap();
        assert_eq!(ballots.len() as u64, r.first_preferences());
        for ballot in ballots.iter() {
            let parties: HashSet<&str> = ballot
                .order()
                .iter()
                .map(|cid| r.candidates()[cid.index()].party.as_str())
                .collect();
            assert_eq!(parties.len(), 1);
            let first = &r.candidates()[ballot.order()[0].index()];
            if first.is_independent() {
                assert_eq!(ballot.order().len(), 1);
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn first_preferences_are_conserved(
            groups in prop::collection::vec(prop::collection::vec(0u64..5_000, 1..5), 1..4),
        ) {
            let mut b = Builder::new("Prop");
            for (g, votes) in groups.iter().enumerate() {
                for (i, v) in votes.iter().enumerate() {
                    let id = format!("{}-{}", g, i);
                    b.add_district(&id, &id, 10_000, 0).unwrap();
                    b.add_candidate_simple(&id, &format!("S{}{}", g, i), "", &format!("Party{}", g), *v).unwrap();
                }
            }
            let r = b.build().unwrap();
            let ballots = generate_ballots(&r).unwrap();
            prop_assert_eq!(ballots.len() as u64, r.first_preferences());
            let counts = first_choice_counts(&ballots);
            for c in r.candidates() {
                prop_assert_eq!(counts.get(&c.id).cloned().unwrap_or(0), c.original_votes);
            }
        }
    }
}
