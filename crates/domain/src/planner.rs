use crate::{
    preference::{filter_opted_in, PreferenceLookup},
    reminder::{ReminderJob, TierId, TierTable},
    shared::entity::ID,
    window::{LookaheadWindow, UpcomingEvent},
};
use chrono::{DateTime, Utc};

/// A reminder that should exist after this run, before it is
/// checked against the jobs that already do
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderCandidate {
    pub event_id: ID,
    pub user_id: ID,
    pub tier_id: TierId,
    pub fire_at: DateTime<Utc>,
}

impl ReminderCandidate {
    pub fn into_job(self, created_at: DateTime<Utc>) -> ReminderJob {
        ReminderJob::new_pending(
            self.event_id,
            self.user_id,
            self.tier_id,
            self.fire_at,
            created_at,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Schedule the nearest tier immediately when every tier of a still
    /// upcoming event already lapsed
    pub catch_up_lapsed_tier: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            catch_up_lapsed_tier: true,
        }
    }
}

/// Every (user, tier) reminder the `subscribers` of `upcoming` opted into and
/// which is due inside `window`
pub fn plan_event_reminders(
    upcoming: &UpcomingEvent,
    subscribers: &[ID],
    preferences: &PreferenceLookup,
    tiers: &TierTable,
    window: &LookaheadWindow,
    options: PlanOptions,
) -> Vec<ReminderCandidate> {
    let mut due = tiers
        .due_within(upcoming.start, window)
        .into_iter()
        .map(|(tier, fire_at)| (tier.id.clone(), fire_at))
        .collect::<Vec<_>>();

    if options.catch_up_lapsed_tier {
        if let Some(tier) = tiers.catch_up_tier(upcoming.start, window) {
            due.push((tier.id.clone(), window.start()));
        }
    }

    due.into_iter()
        .flat_map(|(tier_id, fire_at)| {
            filter_opted_in(subscribers, preferences, &tier_id)
                .into_iter()
                .map(move |user_id| ReminderCandidate {
                    event_id: upcoming.event.id,
                    user_id,
                    tier_id: tier_id.clone(),
                    fire_at,
                })
        })
        .collect()
}
