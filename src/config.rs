use std::{env, path::PathBuf, str::FromStr};

use crate::error::{AppError, Result};

/// Rule-engine settings. Different deployments ran with different thresholds,
/// so none of these are hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub upvote_threshold: u32,
    pub downvote_threshold: u32,
    pub allow_opinions_when_open_only: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            upvote_threshold: 5,
            downvote_threshold: 3,
            allow_opinions_when_open_only: false,
        }
    }
}

impl LedgerConfig {
    pub fn new(upvote_threshold: u32, downvote_threshold: u32) -> Result<Self> {
        if upvote_threshold == 0 || downvote_threshold == 0 {
            return Err(AppError::Config(
                "Vote thresholds must be positive integers".to_string(),
            ));
        }

        Ok(Self {
            upvote_threshold,
            downvote_threshold,
            allow_opinions_when_open_only: false,
        })
    }

    pub fn with_opinions_when_open_only(mut self, enabled: bool) -> Self {
        self.allow_opinions_when_open_only = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Redis,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file" | "File" => Ok(StorageBackend::File),
            "redis" | "Redis" => Ok(StorageBackend::Redis),
            "memory" | "Memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Unknown StorageBackend: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub ledger: LedgerConfig,

    // Storage
    pub storage_backend: StorageBackend,
    pub data_file: PathBuf,
    pub redis_url: String,
    pub max_attachment_size: usize,

    // Summarizer, disabled when the endpoint or its key is missing
    pub summarizer: Option<SummarizerConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let ledger = LedgerConfig::new(
            parse_var("UPVOTE_THRESHOLD", 5)?,
            parse_var("DOWNVOTE_THRESHOLD", 3)?,
        )?
        .with_opinions_when_open_only(parse_var("ALLOW_OPINIONS_WHEN_OPEN_ONLY", false)?);

        let summarizer = match (
            env::var("SUMMARIZER_API_URL").ok(),
            env::var("SUMMARIZER_API_KEY").ok(),
        ) {
            (Some(api_url), Some(api_key)) if !api_url.is_empty() && !api_key.is_empty() => {
                Some(SummarizerConfig {
                    api_url,
                    api_key,
                    model: env::var("SUMMARIZER_MODEL")
                        .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                    timeout_secs: parse_var("SUMMARIZER_TIMEOUT_SECS", 30)?,
                })
            }
            _ => None,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3000)?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            ledger,

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "file".to_string())
                .parse()
                .map_err(AppError::Config)?,
            data_file: env::var("DATA_FILE")
                .unwrap_or_else(|_| "./data/reportify.json".to_string())
                .into(),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            max_attachment_size: parse_var("MAX_ATTACHMENT_SIZE", 5 * 1024 * 1024)?, // 5MB default

            summarizer,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
