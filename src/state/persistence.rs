//! # Durable Preferences
//!
//! Key/value storage that survives restarts, plus the [`PreferenceWriter`] actor
//! that applies writes in the background so callers never wait on I/O.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait Preferences: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// `None` removes the key.
    async fn write(&self, key: &str, value: Option<String>) -> Result<(), StorageError>;
}

/// Preferences kept in a single JSON object file.
///
/// Writes go to a sibling temp file first and are renamed into place.
pub struct FilePreferences {
    path: PathBuf,
    lock: AsyncMutex<()>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: AsyncMutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Preferences for FilePreferences {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn write(&self, key: &str, value: Option<String>) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        match value {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&values)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// In-memory preferences. `set_failing(true)` makes every call fail with an I/O error.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Reads a value directly, bypassing failure simulation.
    pub fn snapshot(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("simulated storage failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl Preferences for MemoryPreferences {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.snapshot(key))
    }

    async fn write(&self, key: &str, value: Option<String>) -> Result<(), StorageError> {
        self.check()?;
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) enum PreferenceCommand {
    Write { key: String, value: Option<String> },
    Flush { respond_to: oneshot::Sender<()> },
}

/// Applies durable writes one at a time, in submission order.
///
/// Failures are logged and dropped; nothing is reported back to the writer's callers.
pub struct PreferenceWriter {
    receiver: mpsc::UnboundedReceiver<PreferenceCommand>,
    preferences: Arc<dyn Preferences>,
}

impl PreferenceWriter {
    pub(crate) fn new(
        preferences: Arc<dyn Preferences>,
    ) -> (Self, mpsc::UnboundedSender<PreferenceCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { receiver, preferences }, sender)
    }

    pub async fn run(mut self) {
        info!("Preference writer started");
        let mut written = 0usize;

        while let Some(command) = self.receiver.recv().await {
            match command {
                PreferenceCommand::Write { key, value } => {
                    match self.preferences.write(&key, value).await {
                        Ok(()) => {
                            written += 1;
                            debug!(key, "Durable write ok");
                        }
                        Err(e) => warn!(key, error = %e, "Durable write failed"),
                    }
                }
                PreferenceCommand::Flush { respond_to } => {
                    let _ = respond_to.send(());
                }
            }
        }

        info!(written, "Preference writer stopped");
    }
}
