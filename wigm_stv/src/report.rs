use log::info;
use serde::Serialize;

use crate::config::Winner;
use crate::model::{CandidateId, CandidateState};
use crate::weight::Weight;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Initial,
    RoundElect,
    RoundDefeat,
    FinishPending,
    FinishHopeful,
    Final,
}

/// The new state and tally of a candidate.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct CandidateUpdate {
    pub id: CandidateId,
    #[serde(flatten)]
    pub state: CandidateState,
    pub vote: Weight,
}

/// One step of a count, as seen from the outside.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEvent {
    pub kind: EventKind,
    /// 0 before the first round.
    pub round: u32,
    pub heading: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<Weight>,
    pub affected: Vec<CandidateId>,
    /// Every candidate whose state or vote changed with this event.
    pub updates: Vec<CandidateUpdate>,
    pub exhausted: u64,
    pub exhausted_weight: Weight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winners: Option<Vec<Winner>>,
}

/// Receives the events of a count, in order.
///
/// The counter never waits on a sink: an implementation that needs to
/// buffer or forward the events does so on its own.
pub trait ReportSink {
    fn report(&mut self, event: ReportEvent);
}

impl ReportSink for Vec<ReportEvent> {
    fn report(&mut self, event: ReportEvent) {
        self.push(event);
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&mut self, event: ReportEvent) {
        info!("{} (exhausted: {})", event.heading, event.exhausted);
        for u in event.updates.iter() {
            info!("    {:>6} {:?} {}", u.id.0, u.state, u.vote);
        }
        if let Some(winners) = event.winners.as_ref() {
            for w in winners {
                info!("    #{} {} ({}) {}", w.order, w.name, w.party, w.vote);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> ReportEvent {
        ReportEvent {
            kind,
            round: 1,
            heading: "Round 1".to_string(),
            quota: None,
            affected: vec![CandidateId(2)],
            updates: vec![CandidateUpdate {
                id: CandidateId(2),
                state: CandidateState::Pending {
                    surplus: Weight::from_votes(3),
                },
                vote: Weight::from_votes(5),
            }],
            exhausted: 4,
            exhausted_weight: Weight::ZERO,
            winners: None,
        }
    }

    #[test]
    fn vec_sink_buffers() {
        let mut v: Vec<ReportEvent> = Vec::new();
        v.report(event(EventKind::RoundDefeat));
        LogSink.report(event(EventKind::RoundDefeat));
        assert_eq!(v.len(), 1);
    }
}
