mod config;
mod repos;
mod retry;
mod system;

pub use config::Config;
pub use repos::{
    IEventRepo, IPreferenceRepo, IReminderJobRepo, ISubscriptionRepo, InMemoryEventRepo,
    InMemoryPreferenceRepo, InMemoryReminderJobRepo, InMemorySubscriptionRepo, Repos,
};
pub use retry::{with_retry, RetryPolicy, StoreError};
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::{ISys, RealSys, StaticTimeSys};
use tracing::warn;

#[derive(Clone)]
pub struct ReminderContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

struct ContextParams {
    pub postgres_connection_string: String,
}

impl ReminderContext {
    async fn create(params: ContextParams) -> Result<Self, Box<dyn std::error::Error>> {
        let repos = Repos::create_postgres(&params.postgres_connection_string).await?;
        Ok(Self {
            repos,
            config: Config::new(),
            sys: Arc::new(RealSys {}),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            repos: Repos::create_inmemory(),
            config: Config::new(),
            sys: Arc::new(RealSys {}),
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> Result<ReminderContext, Box<dyn std::error::Error>> {
    match get_psql_connection_string() {
        Some(connection_string) => {
            ReminderContext::create(ContextParams {
                postgres_connection_string: connection_string,
            })
            .await
        }
        None => {
            warn!("Did not find DATABASE_URL environment variable. Falling back to inmemory repositories, scheduled reminders will be lost on restart.");
            Ok(ReminderContext::create_inmemory())
        }
    }
}

fn get_psql_connection_string() -> Option<String> {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .ok()
        .filter(|conn| !conn.trim().is_empty())
}

/// Runs the migrations when a database is configured
pub async fn run_migration() -> Result<(), MigrateError> {
    let connection_string = match get_psql_connection_string() {
        Some(conn) => conn,
        None => return Ok(()),
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await?;

    sqlx::migrate!().run(&pool).await
}
