//! The Weighted Inclusive Gregory Method.
//!
//! The steps follow the reference WIGM rule of the Proportional
//! Representation Foundation: initialize (A), rounds (B), finish (C), with the
//! helper procedures of section D. Votes, weights and the quota are all
//! truncated to the precision of the rules.

use log::{debug, info};
use snafu::ensure;
use std::collections::BTreeSet;

use crate::config::*;
use crate::model::*;
use crate::report::*;
use crate::weight::Weight;

pub struct ElectWigm<'a> {
    district: &'a mut StvDistrict,
    ballots: Vec<Ballot>,
    // For each candidate (by id), the ballots it currently holds.
    assigned: Vec<Vec<usize>>,
    precision: u32,
    quota: Weight,
    exhausted: u64,
    exhausted_weight: Weight,
    // Number of candidates declared elected so far.
    elected: u32,
    round: u32,
    // False right after a surplus transfer: the next round goes straight to
    // the completion test and the next pending surplus.
    elect_first: bool,
}

impl<'a> ElectWigm<'a> {
    /// Prepares a count. Fails if the riding cannot be counted at all.
    ///
    /// Any state left by a previous count of the same riding is reset.
    pub fn new(
        district: &'a mut StvDistrict,
        ballots: Vec<Ballot>,
        rules: &CountRules,
    ) -> Result<ElectWigm<'a>, VotingError> {
        rules.check(&district.name)?;
        district.check_structure()?;
        district.reset_count();
        let assigned = vec![Vec::new(); district.candidates.len()];
        Ok(ElectWigm {
            district,
            ballots,
            assigned,
            precision: rules.precision,
            quota: Weight::ZERO,
            exhausted: 0,
            exhausted_weight: Weight::ZERO,
            elected: 0,
            round: 0,
            elect_first: true,
        })
    }

    /// Runs the count to completion.
    pub fn count(mut self, sink: &mut dyn ReportSink) -> Result<CountResult, VotingError> {
        // Ref A
        let mut complete = self.initialize(sink);

        // Ref B. Every round either elects or defeats a candidate, so there
        // cannot be more rounds than candidates.
        let max_rounds = self.district.candidates.len() as u32 + 1;
        while !complete {
            self.round += 1;
            ensure!(
                self.round <= max_rounds,
                NoConvergenceSnafu {
                    district: self.district.name.as_str(),
                    rounds: max_rounds
                }
            );
            complete = self.run_round(sink);
        }

        // Ref C
        self.finish(sink)
    }

    /// Ref A. Returns true if the count is already complete.
    fn initialize(&mut self, sink: &mut dyn ReportSink) -> bool {
        // A.1: Droop quota, plus one unit of the last decimal place.
        let ballot_count = self.ballots.len() as u64;
        self.quota = Weight::ratio(ballot_count, self.district.seats as u64 + 1, self.precision)
            + Weight::epsilon(self.precision);
        self.district.quota = Some(self.quota);
        info!(
            "{}: {} ballots, {} seats, quota {}",
            self.district.name, ballot_count, self.district.seats, self.quota
        );

        // A.2 - A.5: everybody is hopeful, every ballot goes to its first choice.
        for (bid, ballot) in self.ballots.iter().enumerate() {
            match ballot.current() {
                Some(cid) => {
                    self.assigned[cid.index()].push(bid);
                    self.district.candidates[cid.index()].vote += ballot.weight();
                }
                None => {
                    self.exhausted += 1;
                    self.exhausted_weight += ballot.weight();
                }
            }
        }

        let all: Vec<CandidateId> = self.district.candidates.iter().map(|c| c.id).collect();
        let heading = format!("Initial count, quota {}", self.quota);
        self.emit(sink, EventKind::Initial, heading, Vec::new(), &all, None);

        self.test_count_complete()
    }

    /// One pass of Ref B. Returns true if the count is complete.
    ///
    /// A round that follows a surplus transfer starts at the completion test.
    /// Candidates pushed over the quota by the transfer stay hopeful, and can
    /// receive more transfers, until the next round that elects.
    fn run_round(&mut self, sink: &mut dyn ReportSink) -> bool {
        // B.1
        let newly_pending = if self.elect_first {
            self.elect_winners()
        } else {
            Vec::new()
        };
        // B.2
        if self.test_count_complete() {
            return true;
        }
        // B.3
        if let Some(cid) = self.highest_surplus() {
            self.transfer_surplus(cid, &newly_pending, sink);
            self.elect_first = false;
            return self.test_count_complete();
        }
        // B.4
        self.elect_first = true;
        self.defeat_low(sink)
    }

    /// B.1: every hopeful candidate at or above the quota becomes pending.
    fn elect_winners(&mut self) -> Vec<CandidateId> {
        let quota = self.quota;
        let mut res: Vec<CandidateId> = Vec::new();
        for c in self.district.candidates.iter_mut() {
            if c.state.is_continuing() && c.vote >= quota {
                c.state = CandidateState::Pending {
                    surplus: c.vote - quota,
                };
                info!(
                    "Round {}: {} reaches the quota with {}",
                    self.round,
                    c.display_name(),
                    c.vote
                );
                res.push(c.id);
            }
        }
        res
    }

    /// The pending candidate with the largest surplus, the lowest id on ties.
    fn highest_surplus(&self) -> Option<CandidateId> {
        let mut best: Option<(CandidateId, Weight)> = None;
        for c in self.district.candidates.iter() {
            if let CandidateState::Pending { surplus } = c.state {
                match best {
                    Some((_, s)) if s >= surplus => {}
                    _ => best = Some((c.id, surplus)),
                }
            }
        }
        best.map(|(cid, _)| cid)
    }

    /// The hopeful candidate with the fewest votes, the lowest id on ties.
    fn lowest_hopeful(&self) -> Option<CandidateId> {
        let mut worst: Option<(CandidateId, Weight)> = None;
        for c in self.district.candidates.iter() {
            if c.state.is_continuing() {
                match worst {
                    Some((_, v)) if v <= c.vote => {}
                    _ => worst = Some((c.id, c.vote)),
                }
            }
        }
        worst.map(|(cid, _)| cid)
    }

    /// B.3
    fn transfer_surplus(
        &mut self,
        cid: CandidateId,
        newly_pending: &[CandidateId],
        sink: &mut dyn ReportSink,
    ) {
        let surplus = match self.district.candidates[cid.index()].state {
            CandidateState::Pending { surplus } => surplus,
            _ => Weight::ZERO,
        };
        let vote = self.district.candidates[cid.index()].vote;
        self.elected += 1;
        self.district.candidates[cid.index()].state = CandidateState::Elected {
            order: self.elected,
        };

        let mut changed: BTreeSet<CandidateId> = newly_pending.iter().cloned().collect();
        changed.insert(cid);
        let held = std::mem::take(&mut self.assigned[cid.index()]);
        debug!(
            "transfer_surplus: {:?}: surplus {} of {} over {} ballots",
            cid,
            surplus,
            vote,
            held.len()
        );
        for bid in held {
            let weight = self.ballots[bid].weight().scale(surplus, vote, self.precision);
            self.move_ballot(bid, weight, &mut changed);
        }
        self.district.candidates[cid.index()].vote = self.quota;

        let name = self.district.candidates[cid.index()].display_name();
        let heading = format!(
            "Round {}: {} elected, surplus of {} transferred",
            self.round, name, surplus
        );
        let changed: Vec<CandidateId> = changed.into_iter().collect();
        self.emit(sink, EventKind::RoundElect, heading, vec![cid], &changed, None);
    }

    /// B.4. Returns true if the count is complete.
    fn defeat_low(&mut self, sink: &mut dyn ReportSink) -> bool {
        let cid = match self.lowest_hopeful() {
            Some(cid) => cid,
            // No hopeful left means every candidate still standing won.
            None => return true,
        };
        {
            let c = &mut self.district.candidates[cid.index()];
            info!("Round {}: {} defeated with {}", self.round, c.display_name(), c.vote);
            c.state = CandidateState::Defeated;
            c.vote = Weight::ZERO;
        }
        let mut changed: BTreeSet<CandidateId> = BTreeSet::new();
        changed.insert(cid);

        let complete = self.test_count_complete();
        if !complete {
            let held = std::mem::take(&mut self.assigned[cid.index()]);
            for bid in held {
                let weight = self.ballots[bid].weight();
                self.move_ballot(bid, weight, &mut changed);
            }
        }

        let name = self.district.candidates[cid.index()].display_name();
        let heading = format!("Round {}: {} defeated", self.round, name);
        let changed: Vec<CandidateId> = changed.into_iter().collect();
        self.emit(sink, EventKind::RoundDefeat, heading, vec![cid], &changed, None);
        complete
    }

    /// D.2: gives a ballot, with its new weight, to the next continuing
    /// candidate in its order, or exhausts it.
    fn move_ballot(&mut self, bid: usize, weight: Weight, changed: &mut BTreeSet<CandidateId>) {
        let candidates = &self.district.candidates;
        let ballot = &mut self.ballots[bid];
        ballot.set_weight(weight);
        let next = if weight.is_zero() {
            None
        } else {
            ballot.advance(|c| candidates[c.index()].state.is_continuing())
        };
        match next {
            Some(next) => {
                self.assigned[next.index()].push(bid);
                self.district.candidates[next.index()].vote += weight;
                changed.insert(next);
            }
            None => {
                self.exhausted += 1;
                self.exhausted_weight += weight;
            }
        }
    }

    /// D.3
    fn test_count_complete(&self) -> bool {
        let seats = self.district.seats as usize;
        let won = self
            .district
            .candidates
            .iter()
            .filter(|c| c.state.has_won())
            .count();
        let hopeful = self
            .district
            .candidates
            .iter()
            .filter(|c| c.state.is_continuing())
            .count();
        won == seats || won + hopeful <= seats
    }

    /// Ref C
    fn finish(mut self, sink: &mut dyn ReportSink) -> Result<CountResult, VotingError> {
        // C.1: elect the pending candidates, largest surplus first.
        let mut pending: Vec<(CandidateId, Weight)> = self
            .district
            .candidates
            .iter()
            .filter_map(|c| match c.state {
                CandidateState::Pending { surplus } => Some((c.id, surplus)),
                _ => None,
            })
            .collect();
        pending.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        if !pending.is_empty() {
            let ids: Vec<CandidateId> = pending.iter().map(|(cid, _)| *cid).collect();
            for cid in ids.iter() {
                self.elected += 1;
                self.district.candidates[cid.index()].state = CandidateState::Elected {
                    order: self.elected,
                };
            }
            let heading = "Pending candidates elected".to_string();
            self.emit(sink, EventKind::FinishPending, heading, ids.clone(), &ids, None);
        }

        // C.2: the remaining hopeful candidates fill the empty seats, or lose.
        let mut hopeful: Vec<(CandidateId, Weight)> = self
            .district
            .candidates
            .iter()
            .filter(|c| c.state.is_continuing())
            .map(|c| (c.id, c.vote))
            .collect();
        hopeful.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        if !hopeful.is_empty() {
            let ids: Vec<CandidateId> = hopeful.iter().map(|(cid, _)| *cid).collect();
            let open_seats = self.district.seats.saturating_sub(self.elected);
            for cid in ids.iter() {
                let state = if self.elected < self.district.seats {
                    self.elected += 1;
                    CandidateState::Elected {
                        order: self.elected,
                    }
                } else {
                    CandidateState::Defeated
                };
                self.district.candidates[cid.index()].state = state;
            }
            let heading = if open_seats == 0 {
                "All seats filled, remaining candidates defeated".to_string()
            } else {
                format!("Remaining candidates fill the open seats ({})", open_seats)
            };
            self.emit(sink, EventKind::FinishHopeful, heading, ids.clone(), &ids, None);
        }

        let mut winners: Vec<Winner> = self
            .district
            .candidates
            .iter()
            .filter_map(|c| match c.state {
                CandidateState::Elected { order } => Some(Winner {
                    id: c.id,
                    name: c.display_name(),
                    party: c.party.clone(),
                    order,
                    vote: c.vote,
                }),
                _ => None,
            })
            .collect();
        winners.sort_by_key(|w| w.order);
        for w in winners.iter() {
            info!("{}: elected #{}: {} ({})", self.district.name, w.order, w.name, w.party);
        }

        let heading = format!(
            "Count complete: {} elected, {} ballots exhausted",
            winners.len(),
            self.exhausted
        );
        self.emit(
            sink,
            EventKind::Final,
            heading,
            winners.iter().map(|w| w.id).collect(),
            &[],
            Some(winners.clone()),
        );

        Ok(CountResult {
            district: self.district.name.clone(),
            seats: self.district.seats,
            quota: self.quota,
            ballots: self.ballots.len() as u64,
            winners,
            exhausted: self.exhausted,
            exhausted_weight: self.exhausted_weight,
            rounds: self.round,
            groups: self.district.party_groups(),
        })
    }

    fn emit(
        &self,
        sink: &mut dyn ReportSink,
        kind: EventKind,
        heading: String,
        affected: Vec<CandidateId>,
        changed: &[CandidateId],
        winners: Option<Vec<Winner>>,
    ) {
        let updates = changed
            .iter()
            .map(|cid| {
                let c = &self.district.candidates[cid.index()];
                CandidateUpdate {
                    id: c.id,
                    state: c.state,
                    vote: c.vote,
                }
            })
            .collect();
        let with_quota = matches!(kind, EventKind::Initial | EventKind::Final);
        sink.report(ReportEvent {
            kind,
            round: self.round,
            heading,
            quota: if with_quota { Some(self.quota) } else { None },
            affected,
            updates,
            exhausted: self.exhausted,
            exhausted_weight: self.exhausted_weight,
            winners,
        });
    }
}
