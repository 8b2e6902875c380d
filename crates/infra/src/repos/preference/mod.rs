mod inmemory;
mod postgres;

use event_reminder_domain::{NotificationPreference, ID};
pub use inmemory::InMemoryPreferenceRepo;
pub use postgres::PostgresPreferenceRepo;

#[async_trait::async_trait]
pub trait IPreferenceRepo: Send + Sync {
    /// Inserts or replaces the preference of the user
    async fn save(&self, preference: &NotificationPreference) -> anyhow::Result<()>;
    /// Users without a stored preference are left out of the result
    async fn find_by_users(
        &self,
        user_ids: &[ID],
    ) -> anyhow::Result<Vec<NotificationPreference>>;
}
