use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::error::JobError;
use super::events::UploadEvent;
use super::pipeline::TranscodePipeline;
use crate::config::settings::QueueConfig;

/// Longest pause before a retried job is requeued.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Lifecycle of one delivered job message.
///
/// `Received → Processing → Succeeded`, or on failure either
/// `Retrying → Requeued` (transient, attempts left) or `DeadLettered`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Received { attempt: u32 },
    Processing { attempt: u32 },
    Succeeded { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Requeued { next_attempt: u32 },
    DeadLettered { attempt: u32, reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Requeued { .. } | JobState::DeadLettered { .. }
        )
    }

    /// `Retrying(n)` becomes `Requeued(n + 1)` once the message is back on the
    /// queue. Other states are returned unchanged.
    pub fn requeued(self) -> JobState {
        match self {
            JobState::Retrying { attempt, .. } => JobState::Requeued {
                next_attempt: attempt + 1,
            },
            other => other,
        }
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at five minutes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base: Duration::from_secs(config.backoff_base_secs),
            jitter: true,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exp).min(MAX_BACKOFF)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        // Up to 10% extra so redelivered jobs do not stampede together.
        let spread = (delay.as_millis() as u64 / 10).max(1);
        delay + Duration::from_millis(rand::random::<u64>() % spread)
    }

    /// Next state after `attempt` failed with `err`.
    pub fn on_failure(&self, err: &JobError, attempt: u32) -> JobState {
        if err.is_permanent() {
            return JobState::DeadLettered {
                attempt,
                reason: format!("permanent: {}", err),
            };
        }
        if attempt >= self.max_attempts {
            return JobState::DeadLettered {
                attempt,
                reason: format!("exhausted {} attempts: {}", attempt, err),
            };
        }
        JobState::Retrying {
            attempt,
            delay: self.delay(attempt),
        }
    }
}

/// Turns a raw message body into a terminal or retrying [`JobState`].
pub struct JobConsumer {
    pipeline: Arc<TranscodePipeline>,
    policy: RetryPolicy,
}

impl JobConsumer {
    pub fn new(pipeline: Arc<TranscodePipeline>, policy: RetryPolicy) -> Self {
        Self { pipeline, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn process(&self, payload: &[u8], attempt: u32) -> JobState {
        let state = JobState::Received { attempt };
        info!(?state, "📦 Received transcoding job");

        let event = match UploadEvent::parse(payload) {
            Ok(event) => event,
            Err(e) => {
                let next = self.policy.on_failure(&e, attempt);
                error!(error = %e, ?next, "❌ Rejecting upload event");
                return next;
            }
        };

        let state = JobState::Processing { attempt };
        info!(upload_id = %event.upload_id, user_id = %event.user_id, ?state, "Processing job");

        match self.pipeline.run(&event).await {
            Ok(completion) => {
                info!(
                    upload_id = %completion.upload_id,
                    master = %completion.hls.master_url,
                    "✅ Job completed"
                );
                JobState::Succeeded { attempt }
            }
            Err(e) => {
                let next = self.policy.on_failure(&e, attempt);
                match &next {
                    JobState::Retrying { delay, .. } => warn!(
                        upload_id = %event.upload_id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Job failed, will retry"
                    ),
                    _ => error!(upload_id = %event.upload_id, attempt, error = %e, "❌ Job dead-lettered"),
                }
                next
            }
        }
    }
}
