use crate::store::{StateStore, StoreError};
use andro_core::DurableState;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Durable state as a single JSON document on disk.
///
/// Saves go through a sibling temp file and a rename, so a crash mid-write
/// leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<DurableState, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(DurableState::from_json(&raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No stored state at {}, starting fresh", self.path.display());
                Ok(DurableState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &DurableState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("Durable state saved to {}", self.path.display());
        Ok(())
    }
}
