//! Durable storage for the publish state blob.
//!
//! Stores only move opaque JSON; decoding and default-filling live in
//! [`PublishState::from_blob`](crate::models::PublishState::from_blob). The
//! server uses [`FileStateStore`]; tests use an in-memory store.

use serde_json::Value;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::error::Result;

/// Get/set access to one JSON blob.
pub trait StateStore: Send + Sync {
    /// The stored blob, or `None` when nothing was ever written.
    fn get(&self) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Replace the stored blob.
    fn set(&self, blob: Value) -> impl Future<Output = Result<()>> + Send;
}

/// Keeps the blob in process memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    blob: std::sync::Mutex<Option<Value>>,
}

#[cfg(test)]
impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Value) -> Self {
        Self {
            blob: std::sync::Mutex::new(Some(blob)),
        }
    }
}

#[cfg(test)]
impl StateStore for MemoryStateStore {
    async fn get(&self) -> Result<Option<Value>> {
        Ok(self.blob.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn set(&self, blob: Value) -> Result<()> {
        *self.blob.lock().unwrap_or_else(|p| p.into_inner()) = Some(blob);
        Ok(())
    }
}

/// Keeps the blob in a JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write never leaves a half-written state file behind.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "publish_state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn get(&self) -> Result<Option<Value>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(error = %e, "State file is not valid JSON; starting from defaults");
                Ok(None)
            }
        }
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn set(&self, blob: Value) -> Result<()> {
        let json = serde_json::to_string_pretty(&blob)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Wrote state file");
        Ok(())
    }
}
