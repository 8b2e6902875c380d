use super::IReminderJobRepo;
use crate::repos::shared::inmemory_repo::*;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use event_reminder_domain::{InsertOutcome, JobStatus, ReminderJob, ID};
use std::{collections::BTreeSet, sync::Mutex};

pub struct InMemoryReminderJobRepo {
    jobs: Mutex<Vec<ReminderJob>>,
}

impl InMemoryReminderJobRepo {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
        }
    }
}

fn cancel_pending(job: &mut ReminderJob) -> bool {
    job.status == JobStatus::Pending && job.cancel().is_ok()
}

#[async_trait::async_trait]
impl IReminderJobRepo for InMemoryReminderJobRepo {
    async fn insert_if_absent(&self, job: &ReminderJob) -> anyhow::Result<InsertOutcome> {
        // Check and insert under the same lock
        let mut jobs = lock(&self.jobs);
        let occupied = jobs
            .iter()
            .any(|j| j.dedup_key == job.dedup_key && j.status.is_active());
        if occupied {
            return Ok(InsertOutcome::Duplicate);
        }
        jobs.push(job.clone());
        Ok(InsertOutcome::Created)
    }

    async fn find(&self, job_id: &ID) -> anyhow::Result<Option<ReminderJob>> {
        Ok(find_by(&self.jobs, |j| j.id == *job_id).into_iter().next())
    }

    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ReminderJob>> {
        Ok(find_by(&self.jobs, |j| j.event_id == *event_id))
    }

    async fn find_pending_event_ids(&self) -> anyhow::Result<Vec<ID>> {
        let event_ids = find_by(&self.jobs, |j| j.status == JobStatus::Pending)
            .into_iter()
            .map(|j| j.event_id)
            .collect::<BTreeSet<_>>();
        Ok(event_ids.into_iter().collect())
    }

    async fn mark_sent(&self, job_id: &ID) -> anyhow::Result<ReminderJob> {
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .iter_mut()
            .find(|j| j.id == *job_id)
            .ok_or_else(|| anyhow!("Reminder job {} was not found", job_id))?;
        job.mark_sent()?;
        Ok(job.clone())
    }

    async fn cancel_lapsed(&self, before: DateTime<Utc>) -> anyhow::Result<usize> {
        Ok(update_many(&self.jobs, |j| j.fire_at < before, cancel_pending))
    }

    async fn cancel_by_events(&self, event_ids: &[ID]) -> anyhow::Result<usize> {
        Ok(update_many(
            &self.jobs,
            |j| event_ids.contains(&j.event_id),
            cancel_pending,
        ))
    }
}
