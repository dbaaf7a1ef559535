use andro_core::config::{StorageBackend, StorageConfig};
use andro_core::DurableState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::json::JsonFileStore;
use crate::sqlite::SqliteStateStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not serialize durable state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load/save of the single durable record.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The stored record, or defaults when nothing usable is stored.
    async fn load(&self) -> Result<DurableState, StoreError>;

    /// Overwrite the stored record with `state`.
    async fn save(&self, state: &DurableState) -> Result<(), StoreError>;
}

/// Open the store selected by config.
pub async fn open_store(cfg: &StorageConfig) -> Result<Box<dyn StateStore>> {
    let store: Box<dyn StateStore> = match cfg.backend {
        StorageBackend::Json => Box::new(JsonFileStore::new(&cfg.path)),
        StorageBackend::Sqlite => Box::new(
            SqliteStateStore::open(&cfg.path)
                .await
                .with_context(|| format!("Failed to open state database {}", cfg.path))?,
        ),
    };
    tracing::info!("State store: {:?} at {}", cfg.backend, cfg.path);
    Ok(store)
}

/// In-process store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded with a raw stored document, as another writer might have left it.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub async fn raw(&self) -> Option<String> {
        self.raw.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<DurableState, StoreError> {
        Ok(match self.raw.lock().await.as_deref() {
            Some(raw) => DurableState::from_json(raw),
            None => DurableState::default(),
        })
    }

    async fn save(&self, state: &DurableState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        *self.raw.lock().await = Some(json);
        Ok(())
    }
}
