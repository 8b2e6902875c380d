use crate::reminder::InsertOutcome;

/// What happened to a single reminder candidate during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Scheduled,
    SkippedDuplicate,
    Failed,
}

impl From<InsertOutcome> for CandidateOutcome {
    fn from(outcome: InsertOutcome) -> Self {
        match outcome {
            InsertOutcome::Created => Self::Scheduled,
            InsertOutcome::Duplicate => Self::SkippedDuplicate,
        }
    }
}

/// Counters of one scheduler run. Partial failures are reported here
/// instead of failing the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events_processed: usize,
    pub reminders_scheduled: usize,
    pub reminders_skipped_duplicate: usize,
    pub reminders_failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::Scheduled => self.reminders_scheduled += 1,
            CandidateOutcome::SkippedDuplicate => self.reminders_skipped_duplicate += 1,
            CandidateOutcome::Failed => self.reminders_failed += 1,
        }
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.events_processed += other.events_processed;
        self.reminders_scheduled += other.reminders_scheduled;
        self.reminders_skipped_duplicate += other.reminders_skipped_duplicate;
        self.reminders_failed += other.reminders_failed;
    }
}
