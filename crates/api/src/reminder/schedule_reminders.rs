use crate::{
    error::ReminderError,
    shared::{
        auth::protect_trigger_route,
        usecase::{execute, UseCase},
    },
};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use event_reminder_api_structs::schedule_reminders::*;
use event_reminder_domain::{
    plan_event_reminders, resolve_subscribers, to_lookup, CandidateOutcome, LookaheadWindow,
    PlanOptions, ReminderCandidate, RunSummary, UpcomingEvent,
};
use event_reminder_infra::{with_retry, ReminderContext, RetryPolicy, StoreError};
use futures::{future, stream, StreamExt};
use std::time::Instant;
use tracing::{error, info, warn};

fn handle_error(e: UseCaseError) -> ReminderError {
    match e {
        UseCaseError::StorageError(_) => ReminderError::InternalError,
    }
}

pub async fn schedule_reminders_controller(
    http_req: HttpRequest,
    ctx: web::Data<ReminderContext>,
) -> Result<HttpResponse, ReminderError> {
    protect_trigger_route(&http_req, &ctx)?;

    execute(ScheduleRemindersUseCase {}, &ctx)
        .await
        .map(|summary| HttpResponse::Ok().json(APIResponse::from(summary)))
        .map_err(handle_error)
}

/// One scheduler run: finds the events starting inside the lookahead window
/// and creates the reminder jobs their subscribers opted into. Running it
/// again over the same store state creates nothing new.
#[derive(Debug)]
pub struct ScheduleRemindersUseCase {}

#[derive(Debug)]
pub enum UseCaseError {
    /// The upcoming events could not be read, nothing was scheduled
    StorageError(StoreError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for ScheduleRemindersUseCase {
    type Response = RunSummary;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &ReminderContext) -> Result<Self::Response, Self::Errors> {
        let deadline = Instant::now() + ctx.config.max_run_duration;
        let now = ctx.sys.now();
        let window = LookaheadWindow::new(now, ctx.config.lookahead);
        let policy = RetryPolicy::from_config(&ctx.config);

        let (from, to) = window.date_range(&ctx.config.timezone);
        let events = with_retry(&policy, "find_events_by_date_range", move || {
            ctx.repos.events.find_by_date_range(from, to)
        })
        .await
        .map_err(UseCaseError::StorageError)?;

        let upcoming = window.select_events(events, &ctx.config.timezone);
        let upcoming_count = upcoming.len();
        info!(
            "Scheduling reminders for {} upcoming events between {} and {}",
            upcoming_count,
            window.start(),
            window.end()
        );

        let options = PlanOptions {
            catch_up_lapsed_tier: ctx.config.catch_up_lapsed_tier,
        };
        let window = &window;
        let policy = &policy;
        let worker_concurrency = ctx.config.worker_concurrency;
        // Planning reads and job inserts run in separate phases so that at most
        // `worker_concurrency` store calls are in flight at any time
        let plans = stream::iter(upcoming)
            // Checked whenever a worker is free to pick up the next event
            .take_while(|_| future::ready(Instant::now() < deadline))
            .map(move |event| plan_event(event, window, options, policy, ctx))
            .buffer_unordered(worker_concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut summary = RunSummary::default();
        let mut candidates = Vec::new();
        for (event_summary, event_candidates) in plans {
            summary.merge(event_summary);
            candidates.extend(event_candidates);
        }

        let outcomes = stream::iter(candidates)
            .map(move |candidate| enqueue_reminder(candidate, policy, now, ctx))
            .buffer_unordered(worker_concurrency)
            .collect::<Vec<_>>()
            .await;
        for outcome in outcomes {
            summary.record(outcome);
        }

        if summary.events_processed < upcoming_count {
            warn!(
                "Reminder run exceeded its budget of {} seconds. {} events are left for the next run.",
                ctx.config.max_run_duration.as_secs(),
                upcoming_count - summary.events_processed
            );
        }
        info!(
            events_processed = summary.events_processed,
            reminders_scheduled = summary.reminders_scheduled,
            reminders_skipped_duplicate = summary.reminders_skipped_duplicate,
            reminders_failed = summary.reminders_failed,
            "Reminder run finished"
        );

        Ok(summary)
    }
}

/// Looks up who should be reminded of `upcoming`. A failed lookup skips the
/// event and is counted as one failure.
async fn plan_event(
    upcoming: UpcomingEvent,
    window: &LookaheadWindow,
    options: PlanOptions,
    policy: &RetryPolicy,
    ctx: &ReminderContext,
) -> (RunSummary, Vec<ReminderCandidate>) {
    let mut summary = RunSummary {
        events_processed: 1,
        ..Default::default()
    };
    let event_id = upcoming.event.id;

    let event_ref = &event_id;
    let subscriptions = match with_retry(policy, "find_subscriptions_by_event", move || {
        ctx.repos.subscriptions.find_by_event(event_ref)
    })
    .await
    {
        Ok(subscriptions) => subscriptions,
        Err(e) => {
            error!("Skipping event {}: {}", event_id, e);
            summary.record(CandidateOutcome::Failed);
            return (summary, Vec::new());
        }
    };

    let subscribers = resolve_subscribers(&event_id, &subscriptions);
    if subscribers.is_empty() {
        return (summary, Vec::new());
    }

    let user_ids = &subscribers;
    let preferences = match with_retry(policy, "find_preferences_by_users", move || {
        ctx.repos.preferences.find_by_users(user_ids)
    })
    .await
    {
        Ok(preferences) => to_lookup(preferences),
        Err(e) => {
            error!("Skipping event {}: {}", event_id, e);
            summary.record(CandidateOutcome::Failed);
            return (summary, Vec::new());
        }
    };

    let candidates = plan_event_reminders(
        &upcoming,
        &subscribers,
        &preferences,
        &ctx.config.tiers,
        window,
        options,
    );

    (summary, candidates)
}

async fn enqueue_reminder(
    candidate: ReminderCandidate,
    policy: &RetryPolicy,
    created_at: DateTime<Utc>,
    ctx: &ReminderContext,
) -> CandidateOutcome {
    let job = candidate.into_job(created_at);
    let job_ref = &job;
    match with_retry(policy, "insert_reminder_job", move || {
        ctx.repos.reminder_jobs.insert_if_absent(job_ref)
    })
    .await
    {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            error!("Unable to store reminder job {}: {}", job.dedup_key, e);
            CandidateOutcome::Failed
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use event_reminder_domain::{
        Event, InsertOutcome, JobStatus, NotificationPreference, ReminderJob, Subscription,
        SubscriptionSource, TierId, TierTable, ID,
    };
    use event_reminder_infra::{
        IPreferenceRepo, IReminderJobRepo, ISubscriptionRepo, InMemoryReminderJobRepo,
        InMemorySubscriptionRepo, StaticTimeSys,
    };
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap()
    }

    fn setup() -> ReminderContext {
        let mut ctx = ReminderContext::create_inmemory();
        ctx.sys = Arc::new(StaticTimeSys::at(now()));
        ctx.config.timezone = chrono_tz::UTC;
        ctx.config.tiers = TierTable::default();
        ctx.config.lookahead = Duration::hours(25);
        ctx.config.catch_up_lapsed_tier = true;
        ctx.config.worker_concurrency = 4;
        ctx.config.store_timeout = std::time::Duration::from_secs(1);
        ctx.config.store_max_retries = 1;
        ctx.config.store_retry_base_delay = std::time::Duration::from_millis(1);
        ctx.config.max_run_duration = std::time::Duration::from_secs(60);
        ctx
    }

    async fn insert_event(ctx: &ReminderContext, start: DateTime<Utc>) -> Event {
        let event = Event {
            id: Default::default(),
            title: "Late night jazz".into(),
            date: start.date_naive(),
            time: Some(start.time()),
            location_name: Some("Blue Note".into()),
            cancelled: false,
            hidden: false,
        };
        ctx.repos.events.insert(&event).await.unwrap();
        event
    }

    async fn insert_date_only_event(ctx: &ReminderContext, date: NaiveDate) -> Event {
        let event = Event {
            id: Default::default(),
            title: "Flea market".into(),
            date,
            time: None,
            location_name: None,
            cancelled: false,
            hidden: false,
        };
        ctx.repos.events.insert(&event).await.unwrap();
        event
    }

    /// Creates a user that favorited `event` and opted into `tiers`
    async fn subscribe(ctx: &ReminderContext, event: &Event, tiers: &[&str]) -> ID {
        let user_id = ID::default();
        ctx.repos
            .subscriptions
            .insert(&Subscription {
                event_id: event.id,
                user_id,
                source: SubscriptionSource::Favorite,
            })
            .await
            .unwrap();
        ctx.repos
            .preferences
            .save(&NotificationPreference {
                user_id,
                enabled: true,
                event_reminders: true,
                tier_flags: tiers.iter().map(|t| (TierId::new(*t), true)).collect(),
            })
            .await
            .unwrap();
        user_id
    }

    async fn run(ctx: &ReminderContext) -> RunSummary {
        let mut usecase = ScheduleRemindersUseCase {};
        usecase.execute(ctx).await.unwrap()
    }

    #[actix_web::test]
    async fn schedules_reminders_of_upcoming_event() {
        let ctx = setup();
        let start = now() + Duration::hours(20);
        let event = insert_event(&ctx, start).await;
        let user_id = subscribe(&ctx, &event, &["1h", "1d"]).await;

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.reminders_scheduled, 1);
        assert_eq!(summary.reminders_failed, 0);
        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].user_id, user_id);
        assert_eq!(jobs[0].tier_id, TierId::new("1h"));
        assert_eq!(jobs[0].fire_at, start - Duration::hours(1));
        assert_eq!(jobs[0].status, JobStatus::Pending);
    }

    #[actix_web::test]
    async fn date_only_event_reminds_a_day_before_noon() {
        let mut ctx = setup();
        ctx.config.lookahead = Duration::hours(48);
        let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let event = insert_date_only_event(&ctx, date).await;
        subscribe(&ctx, &event, &["1d"]).await;

        let summary = run(&ctx).await;

        assert_eq!(summary.reminders_scheduled, 1);
        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(
            jobs[0].fire_at,
            Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
        );
    }

    #[actix_web::test]
    async fn lapsed_tiers_are_not_scheduled_without_catch_up() {
        let mut ctx = setup();
        ctx.config.catch_up_lapsed_tier = false;
        let event = insert_event(&ctx, now() + Duration::minutes(30)).await;
        subscribe(&ctx, &event, &["1h"]).await;
        subscribe(&ctx, &event, &["1h", "1d"]).await;

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.reminders_scheduled, 0);
        assert_eq!(summary.reminders_skipped_duplicate, 0);
        assert_eq!(summary.reminders_failed, 0);
        assert!(ctx
            .repos
            .reminder_jobs
            .find_by_event(&event.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[actix_web::test]
    async fn second_run_only_reports_duplicates() {
        let ctx = setup();
        let event = insert_event(&ctx, now() + Duration::minutes(30)).await;
        subscribe(&ctx, &event, &["1h"]).await;
        subscribe(&ctx, &event, &["1h"]).await;

        let first = run(&ctx).await;
        assert_eq!(first.reminders_scheduled, 2);
        assert_eq!(first.reminders_skipped_duplicate, 0);

        let second = run(&ctx).await;
        assert_eq!(second.events_processed, 1);
        assert_eq!(second.reminders_scheduled, 0);
        assert_eq!(second.reminders_skipped_duplicate, 2);
        assert_eq!(second.reminders_failed, 0);

        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(jobs.len(), 2);
        // The 1h tier had already lapsed so it fires right away
        assert!(jobs.iter().all(|j| j.fire_at == now()));
    }

    #[actix_web::test]
    async fn concurrent_runs_create_each_job_once() {
        let ctx = setup();
        let event = insert_event(&ctx, now() + Duration::hours(5)).await;
        for _ in 0..5 {
            subscribe(&ctx, &event, &["1h"]).await;
        }

        let (a, b) = futures::join!(run(&ctx), run(&ctx));

        assert_eq!(a.reminders_scheduled + b.reminders_scheduled, 5);
        assert_eq!(
            a.reminders_skipped_duplicate + b.reminders_skipped_duplicate,
            5
        );
        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(jobs.len(), 5);
    }

    #[actix_web::test]
    async fn skips_users_without_opt_in() {
        let ctx = setup();
        let event = insert_event(&ctx, now() + Duration::hours(3)).await;
        let opted_in = subscribe(&ctx, &event, &["1h"]).await;
        subscribe(&ctx, &event, &["1d"]).await;
        // Subscribed but without any stored preference
        ctx.repos
            .subscriptions
            .insert(&Subscription {
                event_id: event.id,
                user_id: ID::default(),
                source: SubscriptionSource::RsvpGoing,
            })
            .await
            .unwrap();
        // Globally disabled notifications
        let disabled = subscribe(&ctx, &event, &["1h"]).await;
        ctx.repos
            .preferences
            .save(&NotificationPreference {
                user_id: disabled,
                enabled: false,
                event_reminders: true,
                tier_flags: vec![(TierId::new("1h"), true)].into_iter().collect(),
            })
            .await
            .unwrap();

        let summary = run(&ctx).await;

        assert_eq!(summary.reminders_scheduled, 1);
        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].user_id, opted_in);
    }

    #[actix_web::test]
    async fn favorite_and_rsvp_of_same_user_gives_one_reminder() {
        let ctx = setup();
        let event = insert_event(&ctx, now() + Duration::hours(3)).await;
        let user_id = subscribe(&ctx, &event, &["1h"]).await;
        ctx.repos
            .subscriptions
            .insert(&Subscription {
                event_id: event.id,
                user_id,
                source: SubscriptionSource::RsvpGoing,
            })
            .await
            .unwrap();

        let summary = run(&ctx).await;

        assert_eq!(summary.reminders_scheduled, 1);
        assert_eq!(summary.reminders_skipped_duplicate, 0);
    }

    #[actix_web::test]
    async fn ignores_events_outside_window_and_inactive_events() {
        let ctx = setup();
        let past = insert_event(&ctx, now() - Duration::minutes(1)).await;
        let far = insert_event(&ctx, now() + Duration::hours(26)).await;
        let mut cancelled = insert_event(&ctx, now() + Duration::hours(2)).await;
        cancelled.cancelled = true;
        ctx.repos.events.save(&cancelled).await.unwrap();
        let mut hidden = insert_event(&ctx, now() + Duration::hours(2)).await;
        hidden.hidden = true;
        ctx.repos.events.save(&hidden).await.unwrap();
        for event in [&past, &far, &cancelled, &hidden].iter() {
            subscribe(&ctx, event, &["1h", "1d"]).await;
        }

        let summary = run(&ctx).await;

        assert_eq!(summary, RunSummary::default());
        for event in [past, far, cancelled, hidden].iter() {
            assert!(ctx
                .repos
                .reminder_jobs
                .find_by_event(&event.id)
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[actix_web::test]
    async fn event_without_subscribers_is_processed_without_jobs() {
        let ctx = setup();
        insert_event(&ctx, now() + Duration::hours(2)).await;

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.reminders_scheduled, 0);
    }

    #[actix_web::test]
    async fn exhausted_budget_defers_all_events() {
        let mut ctx = setup();
        ctx.config.max_run_duration = std::time::Duration::from_secs(0);
        let event = insert_event(&ctx, now() + Duration::hours(2)).await;
        subscribe(&ctx, &event, &["1h"]).await;

        let summary = run(&ctx).await;

        assert_eq!(summary, RunSummary::default());
    }

    /// Fails every insert of the jobs belonging to `failing_user`
    struct FailingReminderJobRepo {
        inner: InMemoryReminderJobRepo,
        failing_user: ID,
    }

    #[async_trait::async_trait]
    impl IReminderJobRepo for FailingReminderJobRepo {
        async fn insert_if_absent(&self, job: &ReminderJob) -> anyhow::Result<InsertOutcome> {
            if job.user_id == self.failing_user {
                return Err(anyhow::anyhow!("connection refused"));
            }
            self.inner.insert_if_absent(job).await
        }

        async fn find(&self, job_id: &ID) -> anyhow::Result<Option<ReminderJob>> {
            self.inner.find(job_id).await
        }

        async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ReminderJob>> {
            self.inner.find_by_event(event_id).await
        }

        async fn find_pending_event_ids(&self) -> anyhow::Result<Vec<ID>> {
            self.inner.find_pending_event_ids().await
        }

        async fn mark_sent(&self, job_id: &ID) -> anyhow::Result<ReminderJob> {
            self.inner.mark_sent(job_id).await
        }

        async fn cancel_lapsed(&self, before: DateTime<Utc>) -> anyhow::Result<usize> {
            self.inner.cancel_lapsed(before).await
        }

        async fn cancel_by_events(&self, event_ids: &[ID]) -> anyhow::Result<usize> {
            self.inner.cancel_by_events(event_ids).await
        }
    }

    #[actix_web::test]
    async fn failed_insert_does_not_abort_the_run() {
        let mut ctx = setup();
        let event = insert_event(&ctx, now() + Duration::hours(2)).await;
        let mut users = Vec::new();
        for _ in 0..5 {
            users.push(subscribe(&ctx, &event, &["1h"]).await);
        }
        ctx.repos.reminder_jobs = Arc::new(FailingReminderJobRepo {
            inner: InMemoryReminderJobRepo::new(),
            failing_user: users[2],
        });

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.reminders_scheduled, 4);
        assert_eq!(summary.reminders_failed, 1);
        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(jobs.len(), 4);
        assert!(jobs.iter().all(|j| j.user_id != users[2]));
    }

    /// Fails the subscriber lookup of a single event
    struct FailingSubscriptionRepo {
        inner: InMemorySubscriptionRepo,
        failing_event: ID,
    }

    #[async_trait::async_trait]
    impl ISubscriptionRepo for FailingSubscriptionRepo {
        async fn insert(&self, subscription: &Subscription) -> anyhow::Result<()> {
            self.inner.insert(subscription).await
        }

        async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<Subscription>> {
            if *event_id == self.failing_event {
                return Err(anyhow::anyhow!("read timed out"));
            }
            self.inner.find_by_event(event_id).await
        }
    }

    #[actix_web::test]
    async fn failed_subscriber_lookup_skips_only_that_event() {
        let mut ctx = setup();
        let broken = insert_event(&ctx, now() + Duration::hours(2)).await;
        let healthy = insert_event(&ctx, now() + Duration::hours(3)).await;
        ctx.repos.subscriptions = Arc::new(FailingSubscriptionRepo {
            inner: InMemorySubscriptionRepo::new(),
            failing_event: broken.id,
        });
        subscribe(&ctx, &broken, &["1h"]).await;
        subscribe(&ctx, &healthy, &["1h"]).await;

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 2);
        assert_eq!(summary.reminders_scheduled, 1);
        assert_eq!(summary.reminders_failed, 1);
    }

    #[actix_web::test]
    async fn rejects_run_when_trigger_secret_is_missing() {
        let mut ctx = setup();
        ctx.config.trigger_secret = None;
        let req = actix_web::test::TestRequest::default()
            .insert_header(("authorization", "Bearer whatever"))
            .to_http_request();

        let res = schedule_reminders_controller(req, web::Data::new(ctx)).await;

        assert!(matches!(res, Err(ReminderError::MissingConfig(_))));
    }

    /// Fails the preference lookup of every batch containing `failing_user`
    struct FailingPreferenceRepo {
        inner: Arc<dyn IPreferenceRepo>,
        failing_user: ID,
    }

    #[async_trait::async_trait]
    impl IPreferenceRepo for FailingPreferenceRepo {
        async fn save(&self, preference: &NotificationPreference) -> anyhow::Result<()> {
            self.inner.save(preference).await
        }

        async fn find_by_users(
            &self,
            user_ids: &[ID],
        ) -> anyhow::Result<Vec<NotificationPreference>> {
            if user_ids.contains(&self.failing_user) {
                return Err(anyhow::anyhow!("too many connections"));
            }
            self.inner.find_by_users(user_ids).await
        }
    }

    #[actix_web::test]
    async fn failed_preference_lookup_skips_only_that_event() {
        let mut ctx = setup();
        let broken = insert_event(&ctx, now() + Duration::hours(2)).await;
        let healthy = insert_event(&ctx, now() + Duration::hours(3)).await;
        let broken_user = subscribe(&ctx, &broken, &["1h"]).await;
        subscribe(&ctx, &healthy, &["1h"]).await;
        ctx.repos.preferences = Arc::new(FailingPreferenceRepo {
            inner: ctx.repos.preferences.clone(),
            failing_user: broken_user,
        });

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 2);
        assert_eq!(summary.reminders_scheduled, 1);
        assert_eq!(summary.reminders_failed, 1);
        assert!(ctx
            .repos
            .reminder_jobs
            .find_by_event(&broken.id)
            .await
            .unwrap()
            .is_empty());
    }

    /// Stores the first job but reports the write as failed, like a commit
    /// whose acknowledgement got lost
    struct LostAckReminderJobRepo {
        inner: InMemoryReminderJobRepo,
        ack_lost: AtomicBool,
    }

    #[async_trait::async_trait]
    impl IReminderJobRepo for LostAckReminderJobRepo {
        async fn insert_if_absent(&self, job: &ReminderJob) -> anyhow::Result<InsertOutcome> {
            let outcome = self.inner.insert_if_absent(job).await?;
            if !self.ack_lost.swap(true, Ordering::SeqCst) {
                return Err(anyhow::anyhow!("connection reset by peer"));
            }
            Ok(outcome)
        }

        async fn find(&self, job_id: &ID) -> anyhow::Result<Option<ReminderJob>> {
            self.inner.find(job_id).await
        }

        async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ReminderJob>> {
            self.inner.find_by_event(event_id).await
        }

        async fn find_pending_event_ids(&self) -> anyhow::Result<Vec<ID>> {
            self.inner.find_pending_event_ids().await
        }

        async fn mark_sent(&self, job_id: &ID) -> anyhow::Result<ReminderJob> {
            self.inner.mark_sent(job_id).await
        }

        async fn cancel_lapsed(&self, before: DateTime<Utc>) -> anyhow::Result<usize> {
            self.inner.cancel_lapsed(before).await
        }

        async fn cancel_by_events(&self, event_ids: &[ID]) -> anyhow::Result<usize> {
            self.inner.cancel_by_events(event_ids).await
        }
    }

    #[actix_web::test]
    async fn retried_insert_that_was_stored_counts_as_duplicate() {
        let mut ctx = setup();
        ctx.repos.reminder_jobs = Arc::new(LostAckReminderJobRepo {
            inner: InMemoryReminderJobRepo::new(),
            ack_lost: AtomicBool::new(false),
        });
        let event = insert_event(&ctx, now() + Duration::hours(2)).await;
        subscribe(&ctx, &event, &["1h"]).await;

        let summary = run(&ctx).await;

        assert_eq!(summary.reminders_scheduled, 0);
        assert_eq!(summary.reminders_skipped_duplicate, 1);
        assert_eq!(summary.reminders_failed, 0);
        let jobs = ctx.repos.reminder_jobs.find_by_event(&event.id).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    /// Records how many inserts are running at the same time
    struct InFlightReminderJobRepo {
        inner: InMemoryReminderJobRepo,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IReminderJobRepo for InFlightReminderJobRepo {
        async fn insert_if_absent(&self, job: &ReminderJob) -> anyhow::Result<InsertOutcome> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            actix_web::rt::time::sleep(std::time::Duration::from_millis(20)).await;
            let outcome = self.inner.insert_if_absent(job).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        }

        async fn find(&self, job_id: &ID) -> anyhow::Result<Option<ReminderJob>> {
            self.inner.find(job_id).await
        }

        async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ReminderJob>> {
            self.inner.find_by_event(event_id).await
        }

        async fn find_pending_event_ids(&self) -> anyhow::Result<Vec<ID>> {
            self.inner.find_pending_event_ids().await
        }

        async fn mark_sent(&self, job_id: &ID) -> anyhow::Result<ReminderJob> {
            self.inner.mark_sent(job_id).await
        }

        async fn cancel_lapsed(&self, before: DateTime<Utc>) -> anyhow::Result<usize> {
            self.inner.cancel_lapsed(before).await
        }

        async fn cancel_by_events(&self, event_ids: &[ID]) -> anyhow::Result<usize> {
            self.inner.cancel_by_events(event_ids).await
        }
    }

    #[actix_web::test]
    async fn inserts_in_flight_never_exceed_worker_concurrency() {
        let mut ctx = setup();
        ctx.config.worker_concurrency = 2;
        let repo = Arc::new(InFlightReminderJobRepo {
            inner: InMemoryReminderJobRepo::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        ctx.repos.reminder_jobs = repo.clone();
        for hours in 2..6 {
            let event = insert_event(&ctx, now() + Duration::hours(hours)).await;
            for _ in 0..4 {
                subscribe(&ctx, &event, &["1h"]).await;
            }
        }

        let summary = run(&ctx).await;

        assert_eq!(summary.events_processed, 4);
        assert_eq!(summary.reminders_scheduled, 16);
        let max_in_flight = repo.max_in_flight.load(Ordering::SeqCst);
        assert!(max_in_flight >= 1);
        assert!(max_in_flight <= 2);
    }
}
