use chrono::Duration;
use chrono_tz::Tz;
use event_reminder_domain::TierTable;
use std::{fmt::Display, str::FromStr};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    /// Bearer credential that callers of the trigger endpoints must present.
    /// When this is missing every trigger is rejected as misconfigured.
    pub trigger_secret: Option<String>,
    /// How far ahead of now a run looks for upcoming events
    pub lookahead: Duration,
    pub tiers: TierTable,
    /// Timezone the event store dates and times are expressed in
    pub timezone: Tz,
    /// Schedule the nearest tier right away when every tier of an upcoming
    /// event already lapsed, e.g. because the user subscribed late
    pub catch_up_lapsed_tier: bool,
    /// Maximum number of store calls in flight during a run, shared by the
    /// event lookups and the reminder job inserts
    pub worker_concurrency: usize,
    /// Timeout of a single store read or write
    pub store_timeout: std::time::Duration,
    /// Retries of a store operation after the first attempt failed
    pub store_max_retries: u32,
    /// Backoff before the first retry, doubled on every following retry
    pub store_retry_base_delay: std::time::Duration,
    /// A run stops picking up new events after this long. The events left
    /// behind are covered by the next run.
    pub max_run_duration: std::time::Duration,
    /// How long past its fire time a pending job may stay unclaimed before
    /// the cleanup cancels it
    pub lapsed_grace: Duration,
    /// When set the service also triggers itself on this interval
    pub scheduler_interval: Option<std::time::Duration>,
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match std::env::var(key) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "The given {}: {} is not valid, falling back to the default value: {}.",
                    key, value, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_tiers(key: &str) -> TierTable {
    match std::env::var(key) {
        Ok(value) => match value.parse::<TierTable>() {
            Ok(tiers) if !tiers.is_empty() => tiers,
            Ok(_) => {
                warn!("{} is empty, falling back to the default reminder tiers.", key);
                TierTable::default()
            }
            Err(e) => {
                warn!("{}. Falling back to the default reminder tiers.", e);
                TierTable::default()
            }
        },
        Err(_) => TierTable::default(),
    }
}

impl Config {
    pub fn new() -> Self {
        let trigger_secret = std::env::var("REMINDER_TRIGGER_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty());
        if trigger_secret.is_none() {
            warn!("Did not find REMINDER_TRIGGER_SECRET environment variable. Reminder triggers will be rejected until it is set.");
        }

        let timezone = parse_env("EVENT_TIMEZONE", chrono_tz::UTC);
        let scheduler_interval_secs = parse_env("REMINDER_SCHEDULER_INTERVAL_SECS", 0u64);
        let scheduler_interval = if scheduler_interval_secs > 0 {
            info!(
                "Reminder job scheduler will run every {} seconds",
                scheduler_interval_secs
            );
            Some(std::time::Duration::from_secs(scheduler_interval_secs))
        } else {
            None
        };

        Self {
            port: parse_env("PORT", 5000),
            trigger_secret,
            lookahead: Duration::hours(parse_env("REMINDER_LOOKAHEAD_HOURS", 24i64).max(0)),
            tiers: parse_tiers("REMINDER_TIERS"),
            timezone,
            catch_up_lapsed_tier: parse_env("REMINDER_CATCH_UP_LAPSED_TIER", true),
            worker_concurrency: parse_env("REMINDER_WORKER_CONCURRENCY", 8usize).max(1),
            store_timeout: std::time::Duration::from_millis(parse_env(
                "REMINDER_STORE_TIMEOUT_MS",
                5000,
            )),
            store_max_retries: parse_env("REMINDER_STORE_MAX_RETRIES", 3),
            store_retry_base_delay: std::time::Duration::from_millis(parse_env(
                "REMINDER_STORE_RETRY_BASE_DELAY_MS",
                200,
            )),
            max_run_duration: std::time::Duration::from_secs(parse_env(
                "REMINDER_MAX_RUN_SECS",
                300,
            )),
            lapsed_grace: Duration::minutes(
                parse_env("REMINDER_LAPSED_GRACE_MINUTES", 15i64).max(0),
            ),
            scheduler_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
