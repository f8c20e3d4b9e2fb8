use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;
use std::path::PathBuf;

pub const TIME_INCREMENT_SECS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MtimeAssignment {
    pub path: PathBuf,
    pub time: DateTime<Local>,
    pub inferred: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SequencePlan {
    pub assignments: Vec<MtimeAssignment>,
    pub unresolved: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct InferenceState {
    last_known: Option<DateTime<Local>>,
    pending_backfill: Vec<PathBuf>,
    assignments: Vec<MtimeAssignment>,
}

impl InferenceState {
    fn step(mut self, (path, own): (PathBuf, Option<DateTime<Local>>)) -> Self {
        match (own, self.last_known) {
            (Some(known), _) => {
                let mut back = known;
                while let Some(pending) = self.pending_backfill.pop() {
                    back = shift(back, -TIME_INCREMENT_SECS);
                    self.assignments.push(MtimeAssignment {
                        path: pending,
                        time: back,
                        inferred: true,
                    });
                }
                self.last_known = Some(known);
                self.assignments.push(MtimeAssignment {
                    path,
                    time: known,
                    inferred: false,
                });
            }
            (None, Some(last)) => {
                let next = shift(last, TIME_INCREMENT_SECS);
                self.last_known = Some(next);
                self.assignments.push(MtimeAssignment {
                    path,
                    time: next,
                    inferred: true,
                });
            }
            (None, None) => self.pending_backfill.push(path),
        }
        self
    }

    fn finish(self) -> SequencePlan {
        SequencePlan {
            assignments: self.assignments,
            unresolved: self.pending_backfill,
        }
    }
}

// Files before the first known timestamp count backwards from it; later gaps
// count forwards from the most recent known one.
pub fn infer_sequence<I>(items: I) -> SequencePlan
where
    I: IntoIterator<Item = (PathBuf, Option<DateTime<Local>>)>,
{
    items
        .into_iter()
        .fold(InferenceState::default(), InferenceState::step)
        .finish()
}

fn shift(time: DateTime<Local>, secs: i64) -> DateTime<Local> {
    TimeDelta::try_seconds(secs)
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(time)
}
