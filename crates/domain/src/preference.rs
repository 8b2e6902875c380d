use crate::{reminder::TierId, shared::entity::ID};
use std::collections::HashMap;

/// A user's opt-in settings for reminder notifications
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationPreference {
    pub user_id: ID,
    /// Master switch for all notifications
    pub enabled: bool,
    pub event_reminders: bool,
    /// Per tier opt in. A tier that is not present is treated as opted out.
    pub tier_flags: HashMap<TierId, bool>,
}

impl NotificationPreference {
    pub fn wants_tier(&self, tier_id: &TierId) -> bool {
        self.enabled
            && self.event_reminders
            && self.tier_flags.get(tier_id).copied().unwrap_or(false)
    }
}

/// Preferences of a set of users, keyed by user id
pub type PreferenceLookup = HashMap<ID, NotificationPreference>;

pub fn to_lookup(preferences: Vec<NotificationPreference>) -> PreferenceLookup {
    preferences.into_iter().map(|p| (p.user_id, p)).collect()
}

/// The candidates that opted into reminders for `tier_id`.
///
/// A candidate without a preference record is filtered out.
pub fn filter_opted_in(
    candidates: &[ID],
    preferences: &PreferenceLookup,
    tier_id: &TierId,
) -> Vec<ID> {
    candidates
        .iter()
        .filter(|user_id| {
            preferences
                .get(user_id)
                .map(|p| p.wants_tier(tier_id))
                .unwrap_or(false)
        })
        .copied()
        .collect()
}
