use anyhow::{Result, anyhow};
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;

        // Test connection
        let _conn = client.get_multiplexed_async_connection().await?;

        info!("✅ Connected to Redis");
        Ok(Self { client })
    }

    pub async fn get_conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Stores `value` as JSON under `key`, expiring after `ttl_secs`.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.get_conn().await?;
        let _: () = conn
            .set_ex(key, payload, ttl_secs)
            .await
            .map_err(|e| anyhow!("Redis SET {} failed: {}", key, e))?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| anyhow!("Redis GET {} failed: {}", key, e))?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
