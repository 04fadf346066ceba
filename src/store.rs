use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    config::{Config, StorageBackend},
    error::Result,
    ledger::LedgerSnapshot,
    models::{Issue, VoteRecord},
    redis::RedisClient,
};

pub const ISSUES_KEY: &str = "reportify.issues.v1";
pub const VOTES_KEY: &str = "reportify.votes.v1";

/// Where ledger state lives between runs. Loading never fails: missing or
/// corrupt data yields an empty snapshot.
#[derive(Clone)]
pub enum LedgerStore {
    File(FileStore),
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl LedgerStore {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = match config.storage_backend {
            StorageBackend::File => LedgerStore::File(FileStore::new(config.data_file.clone())),
            StorageBackend::Redis => {
                let client = RedisClient::new(&config.redis_url).await?;
                client.ping().await?;
                LedgerStore::Redis(RedisStore::new(Arc::new(client)))
            }
            StorageBackend::Memory => LedgerStore::Memory(MemoryStore::default()),
        };
        Ok(store)
    }

    pub async fn load(&self) -> LedgerSnapshot {
        match self {
            LedgerStore::File(store) => store.load().await,
            LedgerStore::Redis(store) => store.load().await,
            LedgerStore::Memory(store) => store.load().await,
        }
    }

    pub async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        match self {
            LedgerStore::File(store) => store.save(snapshot).await,
            LedgerStore::Redis(store) => store.save(snapshot).await,
            LedgerStore::Memory(store) => store.save(snapshot).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> LedgerSnapshot {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No ledger file at {}, starting empty", self.path.display());
                return LedgerSnapshot::default();
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                return LedgerSnapshot::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(
                "Ignoring corrupt ledger file {}: {}",
                self.path.display(),
                e
            );
            LedgerSnapshot::default()
        })
    }

    pub async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        Ok(())
    }
}

/// Mirrors the browser layout: issues and votes under two separate keys.
#[derive(Clone)]
pub struct RedisStore {
    redis: Arc<RedisClient>,
}

impl RedisStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    pub async fn load(&self) -> LedgerSnapshot {
        match self.try_load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Failed to load ledger from Redis, starting empty: {}", e);
                LedgerSnapshot::default()
            }
        }
    }

    async fn try_load(&self) -> Result<LedgerSnapshot> {
        let issues: Vec<Issue> = match self.redis.get_string(ISSUES_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        let votes: Vec<VoteRecord> = match self.redis.get_string(VOTES_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        Ok(LedgerSnapshot { issues, votes })
    }

    pub async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let issues = serde_json::to_string(&snapshot.issues)?;
        let votes = serde_json::to_string(&snapshot.votes)?;

        self.redis
            .set_many_atomic(&[(ISSUES_KEY, issues), (VOTES_KEY, votes)])
            .await
    }
}

/// Keeps the serialized snapshot in process. Used by tests and `STORAGE_BACKEND=memory`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            data: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    pub async fn raw(&self) -> Option<String> {
        self.data.lock().await.clone()
    }

    pub async fn load(&self) -> LedgerSnapshot {
        let data = self.data.lock().await;
        data.as_deref()
            .and_then(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| tracing::warn!("Ignoring corrupt in-memory ledger: {}", e))
                    .ok()
            })
            .unwrap_or_default()
    }

    pub async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot)?;
        *self.data.lock().await = Some(raw);
        Ok(())
    }
}
