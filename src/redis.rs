use crate::error::Result;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RedisClient {
    manager: Arc<Mutex<ConnectionManager>>,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.lock().await;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Write several keys in one MULTI/EXEC so readers never observe half an update.
    pub async fn set_many_atomic(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut conn = self.manager.lock().await;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.set(*key, value).ignore();
        }

        let _: () = pipe.query_async(&mut *conn).await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}
