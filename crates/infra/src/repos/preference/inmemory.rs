use super::IPreferenceRepo;
use crate::repos::shared::inmemory_repo::*;
use event_reminder_domain::{NotificationPreference, ID};
use std::sync::Mutex;

pub struct InMemoryPreferenceRepo {
    preferences: Mutex<Vec<NotificationPreference>>,
}

impl InMemoryPreferenceRepo {
    pub fn new() -> Self {
        Self {
            preferences: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IPreferenceRepo for InMemoryPreferenceRepo {
    async fn save(&self, preference: &NotificationPreference) -> anyhow::Result<()> {
        delete_by(&self.preferences, |p| p.user_id == preference.user_id);
        insert(preference, &self.preferences);
        Ok(())
    }

    async fn find_by_users(
        &self,
        user_ids: &[ID],
    ) -> anyhow::Result<Vec<NotificationPreference>> {
        Ok(find_by(&self.preferences, |p| user_ids.contains(&p.user_id)))
    }
}
