mod event;
mod preference;
mod reminder_job;
mod shared;
mod subscription;

pub use event::{IEventRepo, InMemoryEventRepo, PostgresEventRepo};
pub use preference::{IPreferenceRepo, InMemoryPreferenceRepo, PostgresPreferenceRepo};
pub use reminder_job::{IReminderJobRepo, InMemoryReminderJobRepo, PostgresReminderJobRepo};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use subscription::{ISubscriptionRepo, InMemorySubscriptionRepo, PostgresSubscriptionRepo};
use tracing::info;

#[derive(Clone)]
pub struct Repos {
    pub events: Arc<dyn IEventRepo>,
    pub subscriptions: Arc<dyn ISubscriptionRepo>,
    pub preferences: Arc<dyn IPreferenceRepo>,
    pub reminder_jobs: Arc<dyn IReminderJobRepo>,
}

impl Repos {
    pub async fn create_postgres(
        connection_string: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("DB CHECKING CONNECTION ...");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;
        info!("DB CHECKING CONNECTION ... [done]");
        Ok(Self {
            events: Arc::new(PostgresEventRepo::new(pool.clone())),
            subscriptions: Arc::new(PostgresSubscriptionRepo::new(pool.clone())),
            preferences: Arc::new(PostgresPreferenceRepo::new(pool.clone())),
            reminder_jobs: Arc::new(PostgresReminderJobRepo::new(pool)),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            events: Arc::new(InMemoryEventRepo::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepo::new()),
            preferences: Arc::new(InMemoryPreferenceRepo::new()),
            reminder_jobs: Arc::new(InMemoryReminderJobRepo::new()),
        }
    }
}
