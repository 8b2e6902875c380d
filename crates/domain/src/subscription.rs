use crate::shared::entity::ID;
use std::{collections::BTreeSet, str::FromStr};
use thiserror::Error;

/// How a user expressed interest in an `Event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionSource {
    Favorite,
    RsvpGoing,
}

impl SubscriptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::RsvpGoing => "rsvp_going",
        }
    }
}

#[derive(Error, Debug)]
#[error("Unknown subscription source: {0}")]
pub struct InvalidSubscriptionSourceError(String);

impl FromStr for SubscriptionSource {
    type Err = InvalidSubscriptionSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "favorite" => Ok(Self::Favorite),
            "rsvp_going" => Ok(Self::RsvpGoing),
            _ => Err(InvalidSubscriptionSourceError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub event_id: ID,
    pub user_id: ID,
    pub source: SubscriptionSource,
}

/// Collapses the `Subscription`s of an `Event` into the set of interested users.
///
/// A user that both favorited and RSVP'd counts once. The result is ordered so
/// that repeated runs fan out over users in the same order.
pub fn resolve_subscribers(event_id: &ID, subscriptions: &[Subscription]) -> Vec<ID> {
    subscriptions
        .iter()
        .filter(|s| s.event_id == *event_id)
        .map(|s| s.user_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
