use chrono::{DateTime, Utc};
use event_reminder_api::Application;
use event_reminder_domain::{
    Event, NotificationPreference, Subscription, SubscriptionSource, TierId, Tz, ID,
};
use event_reminder_infra::ReminderContext;
use event_reminder_sdk::ReminderSDK;

pub const TRIGGER_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub ctx: ReminderContext,
    pub address: String,
}

impl TestApp {
    /// Sdk presenting `trigger_secret` as bearer credential
    pub fn sdk(&self, trigger_secret: Option<&str>) -> ReminderSDK {
        ReminderSDK::new(self.address.clone(), trigger_secret.map(String::from))
    }

    pub async fn insert_event(&self, start: DateTime<Utc>) -> Event {
        let event = Event {
            id: Default::default(),
            title: "Release party".into(),
            date: start.date_naive(),
            time: Some(start.time()),
            location_name: None,
            cancelled: false,
            hidden: false,
        };
        self.ctx.repos.events.insert(&event).await.unwrap();
        event
    }

    /// A user who RSVPed "going" and opted into `tiers`
    pub async fn subscribe(&self, event: &Event, tiers: &[&str]) -> ID {
        let user_id = ID::default();
        self.ctx
            .repos
            .subscriptions
            .insert(&Subscription {
                event_id: event.id,
                user_id,
                source: SubscriptionSource::RsvpGoing,
            })
            .await
            .unwrap();
        self.ctx
            .repos
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
}

// Launch the application as a background task
pub async fn spawn_app(trigger_secret: Option<&str>) -> TestApp {
    let mut ctx = ReminderContext::create_inmemory();
    ctx.config.port = 0; // Random port
    ctx.config.trigger_secret = trigger_secret.map(String::from);
    ctx.config.timezone = Tz::UTC;
    ctx.config.scheduler_interval = None;

    let application = Application::new(ctx.clone())
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}/api/v1", application.port());
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    TestApp { ctx, address }
}
