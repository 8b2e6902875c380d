use crate::Config;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tracing::warn;

/// A store operation that kept failing after every retry
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation `{operation}` timed out after {attempts} attempt(s)")]
    Timeout {
        operation: &'static str,
        attempts: u32,
    },
    #[error("Store operation `{operation}` failed after {attempts} attempt(s): {source}")]
    Failed {
        operation: &'static str,
        attempts: u32,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Timeout of every single attempt
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.store_timeout,
            max_retries: config.store_max_retries,
            base_delay: config.store_retry_base_delay,
        }
    }

    /// Delay before retry number `retry` (starting at 1)
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(retry.saturating_sub(1)))
            .unwrap_or(self.base_delay)
    }
}

/// Runs `op` until it succeeds, bounding every attempt by the policy timeout
/// and backing off exponentially between attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let err = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(res)) => return Ok(res),
            Ok(Err(e)) => StoreError::Failed {
                operation,
                attempts,
                source: e,
            },
            Err(_) => StoreError::Timeout {
                operation,
                attempts,
            },
        };

        if attempts > policy.max_retries {
            return Err(err);
        }

        let delay = policy.backoff(attempts);
        warn!("{}. Retrying in {} ms", err, delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
