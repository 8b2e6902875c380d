use crate::{
    reminder::{
        cancel_stale_reminders::CancelStaleRemindersUseCase,
        schedule_reminders::ScheduleRemindersUseCase,
    },
    shared::usecase::execute,
};
use actix_web::rt::time::{interval_at, Instant};
use event_reminder_infra::ReminderContext;
use std::time::Duration;
use tracing::info;

/// Seconds until the next multiple of `interval_secs` since the epoch
pub fn get_start_delay(now_ts: usize, interval_secs: usize) -> usize {
    let interval_secs = interval_secs.max(1);
    interval_secs - (now_ts / 1000) % interval_secs
}

/// Triggers cleanup and scheduling runs from within the service. Only
/// started when an interval is configured, otherwise an external scheduler
/// is expected to call the trigger endpoints.
pub fn start_reminder_job_scheduler(ctx: ReminderContext) {
    let period = match ctx.config.scheduler_interval {
        Some(period) => period,
        None => return,
    };

    actix_web::rt::spawn(async move {
        let now = ctx.sys.get_timestamp_millis();
        let secs_to_next_run = get_start_delay(now as usize, period.as_secs() as usize);
        let start = Instant::now() + Duration::from_secs(secs_to_next_run as u64);

        let mut interval = interval_at(start, period);
        loop {
            interval.tick().await;
            run_reminder_jobs(&ctx).await;
        }
    });
}

async fn run_reminder_jobs(ctx: &ReminderContext) {
    // Errors are already logged by `execute`
    if let Ok(cancelled) = execute(CancelStaleRemindersUseCase {}, ctx).await {
        info!("Job scheduler cancelled {} stale reminders", cancelled);
    }
    if let Ok(summary) = execute(ScheduleRemindersUseCase {}, ctx).await {
        info!(
            "Job scheduler scheduled {} reminders for {} events",
            summary.reminders_scheduled, summary.events_processed
        );
    }
}
