//! Checkpoint store implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use super::CheckpointStore;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    last_id: u64,
    #[serde(default)]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Checkpoint kept in a small JSON file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get_last_id(&self) -> Result<Option<u64>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let file: CheckpointFile = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse checkpoint {:?}", self.path))?;
                Ok(Some(file.last_id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read checkpoint {:?}", self.path)),
        }
    }

    async fn put_last_id(&self, id: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create checkpoint directory")?;
        }
        let file = CheckpointFile {
            last_id: id,
            updated_at: Some(chrono::Utc::now()),
        };
        let content = serde_json::to_string_pretty(&file).context("Failed to serialize checkpoint")?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write checkpoint {:?}", self.path))?;
        Ok(())
    }
}

/// In-memory checkpoint, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    last_id: Mutex<Option<u64>>,
    writes: Mutex<Vec<u64>>,
}

impl MemoryCheckpointStore {
    pub fn new(last_id: Option<u64>) -> Self {
        Self {
            last_id: Mutex::new(last_id),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub async fn last_id(&self) -> Option<u64> {
        *self.last_id.lock().await
    }

    /// Every id written, in order.
    pub async fn writes(&self) -> Vec<u64> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get_last_id(&self) -> Result<Option<u64>> {
        Ok(*self.last_id.lock().await)
    }

    async fn put_last_id(&self, id: u64) -> Result<()> {
        *self.last_id.lock().await = Some(id);
        self.writes.lock().await.push(id);
        Ok(())
    }
}
