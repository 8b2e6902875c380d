mod event;
mod planner;
mod preference;
mod reminder;
mod shared;
mod subscription;
mod summary;
mod window;

pub use event::Event;
pub use planner::{plan_event_reminders, PlanOptions, ReminderCandidate};
pub use preference::{filter_opted_in, to_lookup, NotificationPreference, PreferenceLookup};
pub use reminder::{
    DedupKey, InsertOutcome, InvalidJobStatusError, InvalidTierTableError,
    InvalidTransitionError, JobStatus, ReminderJob, ReminderTier, TierId, TierTable,
};
pub use shared::entity::{InvalidIDError, ID};
pub use subscription::{resolve_subscribers, Subscription, SubscriptionSource};
pub use summary::{CandidateOutcome, RunSummary};
pub use window::{LookaheadWindow, UpcomingEvent};

pub use chrono_tz::Tz;
