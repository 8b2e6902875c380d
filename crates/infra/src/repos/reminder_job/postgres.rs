use super::IReminderJobRepo;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use event_reminder_domain::{DedupKey, InsertOutcome, ReminderJob, TierId, ID};
use sqlx::{types::Uuid, FromRow, PgPool};
use std::convert::{TryFrom, TryInto};

pub struct PostgresReminderJobRepo {
    pool: PgPool,
}

impl PostgresReminderJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderJobRaw {
    job_uid: Uuid,
    event_uid: Uuid,
    user_uid: Uuid,
    tier_id: String,
    fire_at: DateTime<Utc>,
    dedup_key: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReminderJobRaw> for ReminderJob {
    type Error = anyhow::Error;

    fn try_from(j: ReminderJobRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: j.job_uid.into(),
            event_id: j.event_uid.into(),
            user_id: j.user_uid.into(),
            tier_id: TierId::new(j.tier_id),
            fire_at: j.fire_at,
            dedup_key: DedupKey::from(j.dedup_key),
            status: j.status.parse()?,
            created_at: j.created_at,
        })
    }
}

#[async_trait::async_trait]
impl IReminderJobRepo for PostgresReminderJobRepo {
    async fn insert_if_absent(&self, job: &ReminderJob) -> anyhow::Result<InsertOutcome> {
        // The partial unique index on dedup_key resolves concurrent inserts
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO reminder_jobs
            (job_uid, event_uid, user_uid, tier_id, fire_at, dedup_key, status, created_at)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (dedup_key) WHERE status <> 'cancelled' DO NOTHING
            RETURNING job_uid
            "#,
        )
        .bind(job.id.inner_ref())
        .bind(job.event_id.inner_ref())
        .bind(job.user_id.inner_ref())
        .bind(job.tier_id.as_str())
        .bind(job.fire_at)
        .bind(job.dedup_key.as_str())
        .bind(job.status.as_str())
        .bind(job.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(_) => InsertOutcome::Created,
            None => InsertOutcome::Duplicate,
        })
    }

    async fn find(&self, job_id: &ID) -> anyhow::Result<Option<ReminderJob>> {
        let job = sqlx::query_as::<_, ReminderJobRaw>(
            r#"
            SELECT * FROM reminder_jobs AS j
            WHERE j.job_uid = $1
            "#,
        )
        .bind(job_id.inner_ref())
        .fetch_optional(&self.pool)
        .await?;
        job.map(ReminderJob::try_from).transpose()
    }

    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ReminderJob>> {
        let jobs = sqlx::query_as::<_, ReminderJobRaw>(
            r#"
            SELECT * FROM reminder_jobs AS j
            WHERE j.event_uid = $1
            ORDER BY j.fire_at
            "#,
        )
        .bind(event_id.inner_ref())
        .fetch_all(&self.pool)
        .await?;
        jobs.into_iter().map(ReminderJob::try_from).collect()
    }

    async fn find_pending_event_ids(&self) -> anyhow::Result<Vec<ID>> {
        let event_ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT j.event_uid FROM reminder_jobs AS j
            WHERE j.status = 'pending'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(event_ids.into_iter().map(|(id,)| id.into()).collect())
    }

    async fn mark_sent(&self, job_id: &ID) -> anyhow::Result<ReminderJob> {
        let job = sqlx::query_as::<_, ReminderJobRaw>(
            r#"
            UPDATE reminder_jobs SET status = 'sent'
            WHERE job_uid = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(job_id.inner_ref())
        .fetch_optional(&self.pool)
        .await?;
        match job {
            Some(job) => job.try_into(),
            None => Err(anyhow!(
                "Reminder job {} was not found or is no longer pending",
                job_id
            )),
        }
    }

    async fn cancel_lapsed(&self, before: DateTime<Utc>) -> anyhow::Result<usize> {
        let res = sqlx::query(
            r#"
            UPDATE reminder_jobs SET status = 'cancelled'
            WHERE status = 'pending' AND fire_at < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() as usize)
    }

    async fn cancel_by_events(&self, event_ids: &[ID]) -> anyhow::Result<usize> {
        let ids = event_ids.iter().map(|id| id.inner()).collect::<Vec<_>>();
        let res = sqlx::query(
            r#"
            UPDATE reminder_jobs SET status = 'cancelled'
            WHERE status = 'pending' AND event_uid = ANY($1)
            "#,
        )
        .bind(&ids)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() as usize)
    }
}
