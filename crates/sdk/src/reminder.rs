use crate::{APIResponse, BaseClient};
use event_reminder_api_structs::*;
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReminderClient {
    base: Arc<BaseClient>,
}

impl ReminderClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    /// Runs the reminder scheduler once
    pub async fn schedule(&self) -> APIResponse<schedule_reminders::APIResponse> {
        self.base
            .post("reminders/schedule".into(), StatusCode::OK)
            .await
    }

    /// Cancels the pending reminders that can no longer be delivered
    pub async fn cleanup(&self) -> APIResponse<cancel_stale_reminders::APIResponse> {
        self.base
            .post("reminders/cleanup".into(), StatusCode::OK)
            .await
    }
}
