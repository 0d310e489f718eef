use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lapin::{
    options::*,
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Header carrying the 1-based attempt number of a job message.
pub const ATTEMPT_HEADER: &str = "x-attempt";
/// Header carrying the reason a message was dead-lettered.
pub const DEATH_REASON_HEADER: &str = "x-death-reason";
/// Idle retry queues are dropped by the broker after this long.
const RETRY_QUEUE_EXPIRY: Duration = Duration::from_secs(900);

/// Publishes a JSON payload to a named durable queue.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_json(&self, queue: &str, payload: &[u8]) -> Result<()>;
}

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn declare(channel: &Channel, queue: &str, arguments: &FieldTable) -> Result<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                arguments.clone(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;
        Ok(())
    }

    async fn publish_internal(&self, queue: &str, payload: &[u8], options: &PublishOptions) -> Result<()> {
        let channel = self.channel.lock().await;

        // Ensure queue exists
        Self::declare(&channel, queue, &options.queue_arguments).await?;

        let mut properties = BasicProperties::default()
            .with_delivery_mode(2) // Persistent
            .with_content_type(ShortString::from("application/json"))
            .with_headers(options.headers.clone());
        if let Some(ttl) = options.expiration {
            properties = properties.with_expiration(ShortString::from(ttl.as_millis().to_string()));
        }

        channel
            .basic_publish("", queue, BasicPublishOptions::default(), payload, properties)
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    async fn publish_with_options(&self, queue: &str, payload: &[u8], options: PublishOptions) -> Result<()> {
        if let Err(e) = self.publish_internal(queue, payload, &options).await {
            warn!(queue, error = %e, "RabbitMQ publish failed. Retrying after reconnect.");
            self.reconnect().await?;
            self.publish_internal(queue, payload, &options).await?;
        }

        Ok(())
    }

    pub async fn publish_with_headers(&self, queue: &str, payload: &[u8], headers: FieldTable) -> Result<()> {
        let options = PublishOptions {
            headers,
            ..PublishOptions::default()
        };
        self.publish_with_options(queue, payload, options).await
    }

    /// Parks a message on the retry queue for `attempt`. The broker moves it
    /// back onto `queue` once `delay` has elapsed, so no consumer slot is held
    /// while it waits.
    pub async fn publish_delayed(
        &self,
        queue: &str,
        payload: &[u8],
        attempt: u32,
        delay: Duration,
    ) -> Result<()> {
        let options = PublishOptions {
            headers: attempt_headers(attempt),
            queue_arguments: retry_queue_arguments(queue),
            expiration: Some(delay),
        };
        self.publish_with_options(&retry_queue(queue, attempt), payload, options)
            .await
    }

    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.publish_with_headers(queue, payload, FieldTable::default())
            .await
    }

    /// Declares `queue`, limits unacknowledged deliveries to `prefetch`, and
    /// starts a consumer on it.
    pub async fn consume(&self, queue: &str, consumer_tag: &str, prefetch: u16) -> Result<Consumer> {
        let channel = self.channel.lock().await;

        Self::declare(&channel, queue, &FieldTable::default()).await?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        info!(queue, consumer_tag, prefetch, "Consumer started");
        Ok(consumer)
    }
}

#[async_trait]
impl EventPublisher for RabbitMqService {
    async fn publish_json(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.publish(queue, payload).await
    }
}

#[derive(Default)]
struct PublishOptions {
    headers: FieldTable,
    queue_arguments: FieldTable,
    expiration: Option<Duration>,
}

/// Holding queue for messages waiting to retry as `attempt`. One queue per
/// attempt keeps per-message TTLs close together, so an expired message is
/// never stuck behind a much longer one.
pub fn retry_queue(queue: &str, attempt: u32) -> String {
    format!("{}.retry.{}", queue, attempt)
}

/// Retry queues have no consumers: expired messages dead-letter through the
/// default exchange straight back onto `queue`.
fn retry_queue_arguments(queue: &str) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        ShortString::from("x-dead-letter-exchange"),
        AMQPValue::LongString("".into()),
    );
    args.insert(
        ShortString::from("x-dead-letter-routing-key"),
        AMQPValue::LongString(queue.into()),
    );
    args.insert(
        ShortString::from("x-expires"),
        AMQPValue::LongLongInt(RETRY_QUEUE_EXPIRY.as_millis() as i64),
    );
    args
}

/// Dead-letter queue paired with `queue`.
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{}.dlq", queue)
}

/// Headers for a retried job message.
pub fn attempt_headers(attempt: u32) -> FieldTable {
    let mut headers = FieldTable::default();
    headers.insert(ShortString::from(ATTEMPT_HEADER), AMQPValue::LongUInt(attempt));
    headers
}

/// Headers for a dead-lettered message.
pub fn dead_letter_headers(attempt: u32, reason: &str) -> FieldTable {
    let mut headers = attempt_headers(attempt);
    headers.insert(
        ShortString::from(DEATH_REASON_HEADER),
        AMQPValue::LongString(reason.into()),
    );
    headers
}

/// Attempt number carried by a delivery; first deliveries have no header
/// and count as attempt 1.
pub fn attempt_from_properties(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| {
            headers
                .inner()
                .iter()
                .find(|(key, _)| key.as_str() == ATTEMPT_HEADER)
                .and_then(|(_, value)| match value {
                    AMQPValue::LongUInt(n) => Some(*n),
                    AMQPValue::LongInt(n) => u32::try_from(*n).ok(),
                    AMQPValue::LongLongInt(n) => u32::try_from(*n).ok(),
                    AMQPValue::ShortUInt(n) => Some(u32::from(*n)),
                    _ => None,
                })
        })
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_defaults_to_one_without_header() {
        assert_eq!(attempt_from_properties(&BasicProperties::default()), 1);
    }

    #[test]
    fn retry_queue_routes_back_to_the_job_queue() {
        assert_eq!(retry_queue("video_uploaded", 3), "video_uploaded.retry.3");

        let args = retry_queue_arguments("video_uploaded");
        let lookup = |name: &str| {
            args.inner()
                .iter()
                .find(|(key, _)| key.as_str() == name)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(
            lookup("x-dead-letter-routing-key"),
            Some(AMQPValue::LongString("video_uploaded".into()))
        );
        assert_eq!(lookup("x-dead-letter-exchange"), Some(AMQPValue::LongString("".into())));
        assert!(lookup("x-expires").is_some());
    }

    #[test]
    fn attempt_round_trips_through_headers() {
        let props = BasicProperties::default().with_headers(attempt_headers(3));
        assert_eq!(attempt_from_properties(&props), 3);

        let props = BasicProperties::default().with_headers(dead_letter_headers(5, "exhausted"));
        assert_eq!(attempt_from_properties(&props), 5);
    }
}
