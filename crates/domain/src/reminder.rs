use crate::{
    shared::entity::ID,
    window::LookaheadWindow,
};
use chrono::{DateTime, Duration, Utc};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Identifier of a `ReminderTier`, e.g. "1h" or "1d"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TierId(String);

impl TierId {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named offset before the start of an `Event` at which subscribers
/// should be reminded
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderTier {
    pub id: TierId,
    pub offset: Duration,
}

impl ReminderTier {
    pub fn new<T: Into<String>>(id: T, offset: Duration) -> Self {
        Self {
            id: TierId::new(id),
            offset,
        }
    }

    pub fn fire_at(&self, event_start: DateTime<Utc>) -> DateTime<Utc> {
        event_start - self.offset
    }
}

/// The static reminder policy of the service
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable(Vec<ReminderTier>);

impl TierTable {
    pub fn new(tiers: Vec<ReminderTier>) -> Self {
        Self(tiers)
    }

    pub fn tiers(&self) -> &[ReminderTier] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The tiers that should fire within `window` for an event starting at
    /// `event_start`, together with their fire time.
    ///
    /// A fire time at or before the start of the window is never returned, and
    /// neither is one past its end. The latter is picked up by a later run.
    pub fn due_within(
        &self,
        event_start: DateTime<Utc>,
        window: &LookaheadWindow,
    ) -> Vec<(&ReminderTier, DateTime<Utc>)> {
        self.0
            .iter()
            .map(|tier| (tier, tier.fire_at(event_start)))
            .filter(|(_, fire_at)| window.admits_fire_time(fire_at))
            .collect()
    }

    /// The tier with the smallest offset, if its fire time already lapsed
    /// while the event is still upcoming.
    ///
    /// When this tier lapsed every other tier did as well, so a subscriber
    /// that was picked up late would otherwise never be reminded.
    pub fn catch_up_tier(
        &self,
        event_start: DateTime<Utc>,
        window: &LookaheadWindow,
    ) -> Option<&ReminderTier> {
        if event_start <= window.start() {
            return None;
        }
        self.0
            .iter()
            .min_by_key(|tier| tier.offset)
            .filter(|tier| tier.fire_at(event_start) <= window.start())
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self(vec![
            ReminderTier::new("1h", Duration::hours(1)),
            ReminderTier::new("1d", Duration::days(1)),
        ])
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum InvalidTierTableError {
    #[error("Malformed reminder tier entry: `{0}`. Expected `<tier_id>=<offset_minutes>`")]
    Malformed(String),
    #[error("Reminder tier `{0}` has a negative offset")]
    NegativeOffset(String),
    #[error("Reminder tier `{0}` is defined more than once")]
    Duplicate(String),
}

/// Parses a table in the form `1h=60,1d=1440` where the values are
/// offsets in minutes
impl FromStr for TierTable {
    type Err = InvalidTierTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tiers: Vec<ReminderTier> = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(2, '=');
            let id = parts.next().map(str::trim).unwrap_or_default();
            let minutes = parts
                .next()
                .and_then(|m| m.trim().parse::<i64>().ok())
                .ok_or_else(|| InvalidTierTableError::Malformed(entry.to_string()))?;
            if id.is_empty() {
                return Err(InvalidTierTableError::Malformed(entry.to_string()));
            }
            if minutes < 0 {
                return Err(InvalidTierTableError::NegativeOffset(id.to_string()));
            }
            if tiers.iter().any(|t| t.id.as_str() == id) {
                return Err(InvalidTierTableError::Duplicate(id.to_string()));
            }
            tiers.push(ReminderTier::new(id, Duration::minutes(minutes)));
        }
        Ok(Self(tiers))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Sent,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
        }
    }

    /// `Sent` and `Cancelled` are terminal
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sent) | (Self::Pending, Self::Cancelled)
        )
    }

    /// Whether a job in this status occupies its `DedupKey`
    pub fn is_active(&self) -> bool {
        *self != Self::Cancelled
    }
}

#[derive(Error, Debug)]
#[error("Unknown job status: {0}")]
pub struct InvalidJobStatusError(String);

impl FromStr for JobStatus {
    type Err = InvalidJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(InvalidJobStatusError(s.to_string())),
        }
    }
}

/// Deterministic identity of a reminder: at most one non cancelled
/// `ReminderJob` can exist per key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(event_id: &ID, user_id: &ID, tier_id: &TierId) -> Self {
        Self(format!("{}:{}:{}", event_id, user_id, tier_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DedupKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Reminder job {job_id} cannot transition from {from:?} to {to:?}")]
pub struct InvalidTransitionError {
    pub job_id: ID,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A pending notification for a downstream delivery worker
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderJob {
    pub id: ID,
    pub event_id: ID,
    pub user_id: ID,
    pub tier_id: TierId,
    /// When the delivery worker should send the notification
    pub fire_at: DateTime<Utc>,
    pub dedup_key: DedupKey,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl ReminderJob {
    pub fn new_pending(
        event_id: ID,
        user_id: ID,
        tier_id: TierId,
        fire_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let dedup_key = DedupKey::new(&event_id, &user_id, &tier_id);
        Self {
            id: Default::default(),
            event_id,
            user_id,
            tier_id,
            fire_at,
            dedup_key,
            status: JobStatus::Pending,
            created_at,
        }
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), InvalidTransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransitionError {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_sent(&mut self) -> Result<(), InvalidTransitionError> {
        self.transition(JobStatus::Sent)
    }

    pub fn cancel(&mut self) -> Result<(), InvalidTransitionError> {
        self.transition(JobStatus::Cancelled)
    }
}

/// Result of the idempotent insert of a `ReminderJob`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// A non cancelled job with the same `DedupKey` already exists
    Duplicate,
}
