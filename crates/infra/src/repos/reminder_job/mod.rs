mod inmemory;
mod postgres;

use chrono::{DateTime, Utc};
use event_reminder_domain::{InsertOutcome, ReminderJob, ID};
pub use inmemory::InMemoryReminderJobRepo;
pub use postgres::PostgresReminderJobRepo;

#[async_trait::async_trait]
pub trait IReminderJobRepo: Send + Sync {
    /// Atomically inserts the job unless a non cancelled job with the same
    /// `DedupKey` already exists. Concurrent callers with the same key get
    /// exactly one `InsertOutcome::Created`.
    async fn insert_if_absent(&self, job: &ReminderJob) -> anyhow::Result<InsertOutcome>;
    async fn find(&self, job_id: &ID) -> anyhow::Result<Option<ReminderJob>>;
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ReminderJob>>;
    /// Distinct events that still have pending jobs
    async fn find_pending_event_ids(&self) -> anyhow::Result<Vec<ID>>;
    /// Claims a pending job for delivery
    async fn mark_sent(&self, job_id: &ID) -> anyhow::Result<ReminderJob>;
    /// Cancels pending jobs that should have fired before `before`
    async fn cancel_lapsed(&self, before: DateTime<Utc>) -> anyhow::Result<usize>;
    /// Cancels the pending jobs of the given events
    async fn cancel_by_events(&self, event_ids: &[ID]) -> anyhow::Result<usize>;
}
