use event_reminder_domain::RunSummary;
use serde::{Deserialize, Serialize};

pub mod schedule_reminders {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
    pub struct APIResponse {
        pub success: bool,
        pub events_processed: usize,
        pub reminders_scheduled: usize,
        pub reminders_skipped_duplicate: usize,
        pub reminders_failed: usize,
    }

    impl From<RunSummary> for APIResponse {
        fn from(summary: RunSummary) -> Self {
            Self {
                success: true,
                events_processed: summary.events_processed,
                reminders_scheduled: summary.reminders_scheduled,
                reminders_skipped_duplicate: summary.reminders_skipped_duplicate,
                reminders_failed: summary.reminders_failed,
            }
        }
    }
}

pub mod cancel_stale_reminders {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
    pub struct APIResponse {
        pub success: bool,
        pub reminders_cancelled: usize,
    }

    impl APIResponse {
        pub fn new(reminders_cancelled: usize) -> Self {
            Self {
                success: true,
                reminders_cancelled,
            }
        }
    }
}
