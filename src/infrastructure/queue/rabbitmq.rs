use anyhow::{Result, anyhow};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, options::*,
    types::FieldTable,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const JSON_CONTENT_TYPE: &str = "application/json";
const PERSISTENT: u8 = 2;

/// Durable work queue shared by the API (publisher) and the workers (consumers).
///
/// The connection is re-established once on a failed publish or consume; a
/// second failure is returned to the caller.
#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    link: Arc<Mutex<Link>>,
}

struct Link {
    // Held so the channel's connection stays open.
    _conn: Connection,
    channel: Channel,
}

impl Link {
    async fn open(url: &str) -> Result<Self> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("✅ Connected to RabbitMQ");
        Ok(Self {
            _conn: conn,
            channel,
        })
    }

    async fn declare_durable(&self, queue: &str) -> Result<()> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.declare_durable(queue).await?;

        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type(JSON_CONTENT_TYPE.into());

        self.channel
            .basic_publish("", queue, BasicPublishOptions::default(), payload, properties)
            .await
            .map_err(|e| anyhow!("Failed to publish to {}: {}", queue, e))?
            .await
            .map_err(|e| anyhow!("Broker did not confirm publication: {}", e))?;
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer> {
        self.declare_durable(queue).await?;

        // one unacked job per worker
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        self.channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to consume {}: {}", queue, e))
    }
}

impl RabbitMqService {
    pub async fn new(url: &str) -> Result<Self> {
        let link = Link::open(url).await?;
        Ok(Self {
            url: url.to_string(),
            link: Arc::new(Mutex::new(link)),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let fresh = Link::open(&self.url).await?;
        *self.link.lock().await = fresh;
        Ok(())
    }

    /// Publishes `payload` as a persistent JSON message on the durable `queue`.
    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let first = self.link.lock().await.publish(queue, payload).await;
        if let Err(e) = first {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect().await?;
            self.link.lock().await.publish(queue, payload).await?;
        }
        debug!("Published {} bytes to {}", payload.len(), queue);
        Ok(())
    }

    pub async fn publish_json<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish(queue, &payload).await
    }

    /// Declares `queue` and starts consuming it, one unacked delivery at a time.
    pub async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer> {
        let first = self.link.lock().await.consume(queue, consumer_tag).await;
        match first {
            Ok(consumer) => Ok(consumer),
            Err(e) => {
                warn!("RabbitMQ consume failed: {}. Retrying after reconnect.", e);
                self.reconnect().await?;
                self.link.lock().await.consume(queue, consumer_tag).await
            }
        }
    }
}
