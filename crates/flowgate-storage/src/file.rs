//! File-backed context store
//!
//! Each store namespace is one JSON object on disk (`<dir>/<store>.json`).
//! Writes go to a temp file which is then renamed over the target, so a
//! crash never leaves a half-written namespace behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flowgate_types::{Error, Result};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::traits::ContextStore;

/// Store that survives process restarts
pub struct FileStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;
        info!(dir = %dir.display(), "Initializing file context store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, store: &str) -> Result<PathBuf> {
        if store.is_empty() || store.contains(['/', '\\']) || store.starts_with('.') {
            return Err(Error::Storage(format!("invalid store name: {}", store)));
        }
        Ok(self.dir.join(format!("{}.json", store)))
    }

    async fn read_namespace(&self, path: &Path) -> Result<Map<String, Value>> {
        let contents = match fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(io_error(path, e)),
        };
        match serde_json::from_slice(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Storage(format!(
                "{} does not contain a JSON object",
                path.display()
            ))),
        }
    }
}

async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| io_error(&temp_path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| io_error(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| io_error(&temp_path, e))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| io_error(path, e))?;
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    Error::Storage(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl ContextStore for FileStore {
    async fn get(&self, key: &str, store: &str) -> Result<Option<Value>> {
        let path = self.path_for(store)?;
        let mut namespace = self.read_namespace(&path).await?;
        Ok(namespace.remove(key))
    }

    async fn set(&self, key: &str, value: Value, store: &str) -> Result<()> {
        let path = self.path_for(store)?;
        let _guard = self.write_lock.lock().await;

        let mut namespace = self.read_namespace(&path).await?;
        namespace.insert(key.to_string(), value);
        let data = serde_json::to_vec_pretty(&Value::Object(namespace))?;
        atomic_write(&path, &data).await?;

        debug!(store = %store, key = %key, "Value written to disk");
        Ok(())
    }
}
