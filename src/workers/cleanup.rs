use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::playback::purge::AssetPurger;
use crate::modules::transcode::events::VideoDeletedEvent;

/// Purges assets of deleted videos, one message at a time.
pub async fn start_cleanup_worker(queue: RabbitMqService, purger: Arc<AssetPurger>, queue_name: String) -> Result<()> {
    info!("🧹 Starting Cleanup Worker...");

    let consumer_tag = format!("cleanup-{}", Uuid::new_v4());
    let mut consumer = queue.consume(&queue_name, &consumer_tag, 1).await?;

    info!(queue = %queue_name, "🧹 Cleanup Worker listening");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(error = %e, "Failed to receive delivery");
                continue;
            }
        };

        match serde_json::from_slice::<VideoDeletedEvent>(&delivery.data) {
            Ok(event) => match event.validate() {
                Ok(()) => {
                    purger.purge(&event).await;
                }
                Err(e) => warn!(error = %e, "Dropping invalid delete event"),
            },
            Err(e) => warn!(error = %e, "Dropping malformed delete event"),
        }

        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!(error = %e, "Failed to ack message");
        }
    }

    warn!(queue = %queue_name, "Cleanup consumer stream ended");
    Ok(())
}
