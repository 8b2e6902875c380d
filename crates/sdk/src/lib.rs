mod base;
mod reminder;
mod status;

pub use base::APIError;
pub(crate) use base::{APIResponse, BaseClient};
use reminder::ReminderClient;
use status::StatusClient;
use std::sync::Arc;

/// Event Reminder Scheduler SDK
///
/// The SDK contains methods for triggering the event reminder scheduler
/// over its HTTP API.
#[derive(Clone)]
pub struct ReminderSDK {
    pub reminder: ReminderClient,
    pub status: StatusClient,
}

impl ReminderSDK {
    /// `address` is the base url of the api, e.g. `http://localhost:5000/api/v1`
    pub fn new(address: String, trigger_secret: Option<String>) -> Self {
        let mut base = BaseClient::new(address);
        if let Some(secret) = trigger_secret {
            base.set_trigger_secret(secret);
        }
        let base = Arc::new(base);
        let reminder = ReminderClient::new(base.clone());
        let status = StatusClient::new(base);

        Self { reminder, status }
    }
}
