mod config;
mod model;
mod report;
mod synth;
mod weight;
mod wigm;

pub mod builder;
pub mod manual;

use log::{debug, info};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

pub use crate::config::*;
pub use crate::model::*;
pub use crate::report::*;
pub use crate::synth::{ballot_definitions, generate_ballots, synthesize, BallotDef, Orderings};
pub use crate::weight::{Weight, MAX_PRECISION};
pub use crate::wigm::ElectWigm;

/// Makes up the ballots of a riding and counts them.
///
/// The riding is left with the final state of every candidate, and its quota.
///
/// ```
/// use wigm_stv::builder::Builder;
/// use wigm_stv::{run_district, CountRules, ReportEvent, VotingError};
///
/// let mut builder = Builder::new("Harbour");
/// builder.add_district("1", "Harbour East", 700, 0)?;
/// builder.add_district("2", "Harbour West", 300, 0)?;
/// builder.add_candidate_simple("1", "Ahmed", "Sara", "Green", 600)?;
/// builder.add_candidate_simple("1", "Chen", "Li", "Blue", 100)?;
/// builder.add_candidate_simple("2", "Brown", "Leo", "Red", 300)?;
/// let mut riding = builder.build()?;
///
/// let mut events: Vec<ReportEvent> = Vec::new();
/// let result = run_district(&mut riding, &CountRules::DEFAULT_RULES, &mut events)?;
/// let winners: Vec<&str> = result.winners.iter().map(|w| w.name.as_str()).collect();
/// assert_eq!(winners, vec!["Sara Ahmed", "Leo Brown"]);
/// assert_eq!(result.quota.to_string(), "333.3334");
///
/// # Ok::<(), VotingError>(())
/// ```
pub fn run_district(
    district: &mut StvDistrict,
    rules: &CountRules,
    sink: &mut dyn ReportSink,
) -> Result<CountResult, VotingError> {
    let name = district.name.clone();
    run_steps(district, rules, sink, &|status| {
        info!("{}: {}", name, status);
    })
}

fn run_steps(
    district: &mut StvDistrict,
    rules: &CountRules,
    sink: &mut dyn ReportSink,
    status: &dyn Fn(&str),
) -> Result<CountResult, VotingError> {
    rules.check(&district.name)?;
    district.check_structure()?;
    status("Generating ballots");
    let ballots = synthesize(district, rules.ballot_method)?;
    status("Initiating count");
    match rules.count_method {
        CountMethod::Wigm => ElectWigm::new(district, ballots, rules)?.count(sink),
    }
}

/// What a counting thread tells the outside world.
///
/// Every riding sends any number of `Status` and `Report` messages, then
/// exactly one `Done` or `Failed`.
#[derive(PartialEq, Debug, Clone)]
pub enum DistrictMessage {
    Status { district: String, status: String },
    Report { district: String, event: ReportEvent },
    Done { district: String, result: CountResult },
    Failed { district: String, error: VotingError },
}

impl DistrictMessage {
    pub fn district(&self) -> &str {
        match self {
            DistrictMessage::Status { district, .. }
            | DistrictMessage::Report { district, .. }
            | DistrictMessage::Done { district, .. }
            | DistrictMessage::Failed { district, .. } => district,
        }
    }
}

struct DistrictSender {
    district: String,
    tx: Sender<DistrictMessage>,
}

impl DistrictSender {
    fn send(&self, msg: DistrictMessage) {
        // The receiver may stop listening at any time, the count goes on.
        if self.tx.send(msg).is_err() {
            debug!("DistrictSender: {}: receiver is gone", self.district);
        }
    }
}

impl ReportSink for DistrictSender {
    fn report(&mut self, event: ReportEvent) {
        self.send(DistrictMessage::Report {
            district: self.district.clone(),
            event,
        });
    }
}

/// Counts every riding on its own thread.
///
/// The ridings are independent: a failure in one of them is sent as a
/// `Failed` message and does not stop the others. Join the handles, or
/// wait for one final message per riding.
pub fn spawn_counts(
    districts: Vec<StvDistrict>,
    rules: &CountRules,
    tx: Sender<DistrictMessage>,
) -> Vec<JoinHandle<()>> {
    info!("spawn_counts: {} ridings", districts.len());
    districts
        .into_iter()
        .map(|mut district| {
            let rules = rules.clone();
            let mut sink = DistrictSender {
                district: district.name.clone(),
                tx: tx.clone(),
            };
            thread::spawn(move || {
                let status_tx = DistrictSender {
                    district: sink.district.clone(),
                    tx: sink.tx.clone(),
                };
                let res = run_steps(&mut district, &rules, &mut sink, &|status| {
                    status_tx.send(DistrictMessage::Status {
                        district: status_tx.district.clone(),
                        status: status.to_string(),
                    })
                });
                let msg = match res {
                    Ok(result) => DistrictMessage::Done {
                        district: district.name.clone(),
                        result,
                    },
                    Err(error) => DistrictMessage::Failed {
                        district: district.name.clone(),
                        error,
                    },
                };
                sink.send(msg);
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use std::sync::mpsc::channel;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn riding(name: &str, members: &[(&str, &[(&str, &str, u64)])]) -> StvDistrict {
        let mut b = Builder::new(name);
        for (id, candidates) in members {
            b.add_district(id, id, 1000, 10).unwrap();
            for (surname, party, votes) in candidates.iter() {
                b.add_candidate_simple(id, surname, "", party, *votes).unwrap();
            }
        }
        b.build().unwrap()
    }

    #[test]
    fn run_district_reports_in_order() {
        init();
        let mut r = riding(
            "North",
            &[
                ("1", &[("A", "Red", 600), ("C", "Green", 100)]),
                ("2", &[("B", "Blue", 300)]),
            ],
        );
        let mut events: Vec<ReportEvent> = Vec::new();
        let res = run_district(&mut r, &CountRules::DEFAULT_RULES, &mut events).unwrap();
        assert_eq!(events.first().map(|e| e.kind), Some(EventKind::Initial));
        assert_eq!(events.last().map(|e| e.kind), Some(EventKind::Final));
        assert_eq!(events.last().and_then(|e| e.winners.clone()), Some(res.winners.clone()));
        assert_eq!(res.ballots, 1000);
        assert_eq!(r.quota, Some(res.quota));
    }

    #[test]
    fn failures_stay_within_their_riding() {
        init();
        let good = riding(
            "Good",
            &[("1", &[("A", "Red", 500), ("B", "Blue", 400)])],
        );
        // Two seats, a single candidate.
        let bad = riding("Bad", &[("1", &[("A", "Red", 500)]), ("2", &[])]);

        let (tx, rx) = channel();
        let handles = spawn_counts(vec![good, bad], &CountRules::DEFAULT_RULES, tx);
        for h in handles {
            h.join().unwrap();
        }
        let msgs: Vec<DistrictMessage> = rx.try_iter().collect();

        let good_msgs: Vec<&DistrictMessage> = msgs.iter().filter(|m| m.district() == "Good").collect();
        let statuses: Vec<&str> = good_msgs
            .iter()
            .filter_map(|m| match m {
                DistrictMessage::Status { status, .. } => Some(status.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec!["Generating ballots", "Initiating count"]);
        match good_msgs.last() {
            Some(DistrictMessage::Done { result, .. }) => {
                assert_eq!(result.winners.len(), 1);
                assert_eq!(result.winners[0].name, "A");
            }
            other => panic!("unexpected last message {:?}", other),
        }

        let bad_msgs: Vec<&DistrictMessage> = msgs.iter().filter(|m| m.district() == "Bad").collect();
        assert_eq!(bad_msgs.len(), 1);
        assert!(matches!(
            bad_msgs[0],
            DistrictMessage::Failed {
                error: VotingError::TooFewCandidates { .. },
                ..
            }
        ));
    }

    #[test]
    fn counting_goes_on_without_a_receiver() {
        init();
        let r = riding("Alone", &[("1", &[("A", "Red", 5)])]);
        let (tx, rx) = channel();
        drop(rx);
        for h in spawn_counts(vec![r], &CountRules::DEFAULT_RULES, tx) {
            h.join().unwrap();
        }
    }
}
