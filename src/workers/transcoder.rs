use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::settings::QueueConfig;
use crate::infrastructure::queue::rabbitmq::{
    RabbitMqService, attempt_from_properties, dead_letter_headers, dead_letter_queue, retry_queue,
};
use crate::modules::transcode::consumer::{JobConsumer, JobState};

/// Broker action for a job that reached a terminal or retrying state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    Ack,
    Requeue {
        retry_queue: String,
        delay: Duration,
        next_attempt: u32,
    },
    DeadLetter {
        queue: String,
        attempt: u32,
        reason: String,
    },
}

fn disposition(queue: &str, state: &JobState) -> Disposition {
    match state {
        JobState::Retrying { attempt, delay } => Disposition::Requeue {
            retry_queue: retry_queue(queue, attempt + 1),
            delay: *delay,
            next_attempt: attempt + 1,
        },
        JobState::DeadLettered { attempt, reason } => Disposition::DeadLetter {
            queue: dead_letter_queue(queue),
            attempt: *attempt,
            reason: reason.clone(),
        },
        _ => Disposition::Ack,
    }
}

pub async fn start_transcoder_worker(
    queue: RabbitMqService,
    jobs: Arc<JobConsumer>,
    config: QueueConfig,
) -> Result<()> {
    info!("🎥 Starting Transcoder Worker...");

    let concurrency = config.concurrency.max(1);
    let consumer_tag = format!("transcoder-{}", Uuid::new_v4());
    let consumer = queue
        .consume(&config.transcode_queue, &consumer_tag, concurrency)
        .await?;

    info!(
        queue = %config.transcode_queue,
        concurrency,
        max_attempts = jobs.policy().max_attempts,
        "🎥 Transcoder Worker listening"
    );

    let queue_name = config.transcode_queue.as_str();
    consumer
        .for_each_concurrent(usize::from(concurrency), |delivery| {
            let queue = queue.clone();
            let jobs = jobs.clone();
            async move {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        error!(error = %e, "Failed to receive delivery");
                        return;
                    }
                };

                let attempt = attempt_from_properties(&delivery.properties);
                let state = jobs.process(&delivery.data, attempt).await;

                if let Err(e) = settle(&queue, queue_name, &delivery, state).await {
                    error!(error = %e, "Failed to settle job, returning it to the queue");
                    let requeue = BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    };
                    if let Err(e) = delivery.nack(requeue).await {
                        error!(error = %e, "Failed to nack message");
                    }
                }
            }
        })
        .await;

    warn!(queue = %config.transcode_queue, "Transcoder consumer stream ended");
    Ok(())
}

async fn settle(queue: &RabbitMqService, queue_name: &str, delivery: &Delivery, state: JobState) -> Result<()> {
    match disposition(queue_name, &state) {
        Disposition::Ack => {}
        Disposition::Requeue {
            retry_queue: parked_on,
            delay,
            next_attempt,
        } => {
            queue
                .publish_delayed(queue_name, &delivery.data, next_attempt, delay)
                .await?;
            info!(
                ?state,
                next = ?state.clone().requeued(),
                retry_queue = %parked_on,
                "🔁 Job parked for retry"
            );
        }
        Disposition::DeadLetter {
            queue: dlq,
            attempt,
            reason,
        } => {
            queue
                .publish_with_headers(&dlq, &delivery.data, dead_letter_headers(attempt, &reason))
                .await?;
            warn!(dlq = %dlq, attempt, reason = %reason, "☠️ Job moved to dead-letter queue");
        }
    }

    delivery
        .ack(BasicAckOptions::default())
        .await
        .map(|_| ())
        .map_err(|e| anyhow!("Failed to ack message: {}", e))
}
