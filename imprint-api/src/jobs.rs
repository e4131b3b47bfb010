use std::time::Duration;
use uuid::Uuid;

use imprint_core::fulfillment::SubmissionAck;
use imprint_order::SubmitError;
use imprint_shared::Actor;
use imprint_store::app_config::RetryConfig;

use crate::state::AppState;

/// System-wide policy for outbound provider calls: bounded attempts with
/// exponential backoff. Providers are never retried inside the domain
/// services, only here at the invoking edge.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Submit an order for fulfillment under the retry policy. Only provider
/// failures are retried; a validation rejection is final until the order is
/// completed. When all attempts are spent the failure is handed to the
/// compensator, which leaves the order in a terminal, explained status.
pub async fn submit_with_retry(
    state: &AppState,
    order_id: Uuid,
) -> Result<SubmissionAck, SubmitError> {
    let mut attempt = 1u32;
    loop {
        match state
            .fulfillment
            .submit(order_id, Actor::Job("pod-submit".into()))
            .await
        {
            Ok(ack) => return Ok(ack),
            Err(SubmitError::Provider(e)) if attempt < state.retry.max_attempts => {
                let delay = state.retry.delay_for(attempt);
                tracing::warn!(
                    %order_id,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "fulfillment submission failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(SubmitError::Provider(e)) => {
                tracing::error!(
                    %order_id,
                    attempts = attempt,
                    error = %e,
                    "fulfillment submission exhausted retries"
                );
                state
                    .compensator
                    .handle_fulfillment_failure(
                        order_id,
                        &format!("submission failed after {attempt} attempts: {e}"),
                    )
                    .await;
                return Err(SubmitError::Provider(e));
            }
            Err(other) => return Err(other),
        }
    }
}
