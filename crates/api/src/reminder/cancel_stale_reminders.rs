use crate::{
    error::ReminderError,
    shared::{
        auth::protect_trigger_route,
        usecase::{execute, UseCase},
    },
};
use actix_web::{web, HttpRequest, HttpResponse};
use event_reminder_api_structs::cancel_stale_reminders::*;
use event_reminder_domain::Event;
use event_reminder_infra::{with_retry, ReminderContext, RetryPolicy, StoreError};
use std::collections::HashSet;
use tracing::info;

fn handle_error(e: UseCaseError) -> ReminderError {
    match e {
        UseCaseError::StorageError(_) => ReminderError::InternalError,
    }
}

pub async fn cancel_stale_reminders_controller(
    http_req: HttpRequest,
    ctx: web::Data<ReminderContext>,
) -> Result<HttpResponse, ReminderError> {
    protect_trigger_route(&http_req, &ctx)?;

    execute(CancelStaleRemindersUseCase {}, &ctx)
        .await
        .map(|cancelled| HttpResponse::Ok().json(APIResponse::new(cancelled)))
        .map_err(handle_error)
}

/// Cancels pending reminder jobs that will never be delivered: jobs that
/// lapsed longer than the grace period ago and jobs of events that were
/// deleted, cancelled or hidden after scheduling.
#[derive(Debug)]
pub struct CancelStaleRemindersUseCase {}

#[derive(Debug)]
pub enum UseCaseError {
    StorageError(StoreError),
}

impl From<StoreError> for UseCaseError {
    fn from(e: StoreError) -> Self {
        Self::StorageError(e)
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for CancelStaleRemindersUseCase {
    /// Number of cancelled reminder jobs
    type Response = usize;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &ReminderContext) -> Result<Self::Response, Self::Errors> {
        let policy = RetryPolicy::from_config(&ctx.config);

        let lapsed_before = ctx.sys.now() - ctx.config.lapsed_grace;
        let lapsed = with_retry(&policy, "cancel_lapsed_reminder_jobs", move || {
            ctx.repos.reminder_jobs.cancel_lapsed(lapsed_before)
        })
        .await?;

        let pending_event_ids = with_retry(&policy, "find_pending_event_ids", move || {
            ctx.repos.reminder_jobs.find_pending_event_ids()
        })
        .await?;
        if pending_event_ids.is_empty() {
            info!("Cancelled {} lapsed reminder jobs", lapsed);
            return Ok(lapsed);
        }

        let event_ids = &pending_event_ids;
        let active_event_ids = with_retry(&policy, "find_events", move || {
            ctx.repos.events.find_many(event_ids)
        })
        .await?
        .into_iter()
        .filter(Event::is_active)
        .map(|e| e.id)
        .collect::<HashSet<_>>();

        let stale_event_ids = pending_event_ids
            .iter()
            .filter(|event_id| !active_event_ids.contains(*event_id))
            .copied()
            .collect::<Vec<_>>();
        let orphaned = if stale_event_ids.is_empty() {
            0
        } else {
            let event_ids = &stale_event_ids;
            with_retry(&policy, "cancel_reminder_jobs_by_events", move || {
                ctx.repos.reminder_jobs.cancel_by_events(event_ids)
            })
            .await?
        };

        info!(
            "Cancelled {} lapsed reminder jobs and {} reminder jobs of {} removed events",
            lapsed,
            orphaned,
            stale_event_ids.len()
        );
        Ok(lapsed + orphaned)
    }
}
