//! # Module Installer Interface
//!
//! The loader does not download or install anything itself. It drives an
//! implementation of [`ModuleInstaller`] and listens to the session updates it
//! broadcasts. See [`crate::mock::MockModuleInstaller`] for a scriptable one.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// The installer's handle for one install attempt.
pub type SessionId = i32;

/// Status of an install session as reported by the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Unknown,
    Pending,
    RequiresUserConfirmation,
    Downloading,
    Downloaded,
    Installing,
    Installed,
    Failed,
    Canceling,
    Canceled,
}

/// One entry of the installer's session update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    /// Installer-native error code; `0` when there is no error.
    pub native_error_code: i32,
    pub module_names: Vec<String>,
}

impl SessionUpdate {
    pub fn new(session_id: SessionId, status: SessionStatus) -> Self {
        Self {
            session_id,
            status,
            bytes_downloaded: 0,
            total_bytes: 0,
            native_error_code: 0,
            module_names: Vec::new(),
        }
    }

    pub fn with_progress(mut self, bytes_downloaded: u64, total_bytes: u64) -> Self {
        self.bytes_downloaded = bytes_downloaded;
        self.total_bytes = total_bytes;
        self
    }

    pub fn with_error(mut self, native_error_code: i32) -> Self {
        self.native_error_code = native_error_code;
        self
    }

    pub fn for_module(mut self, module: impl Into<String>) -> Self {
        self.module_names.push(module.into());
        self
    }
}

/// Payload needed to resume a session that is waiting on the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub feature_id: String,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
}

impl SessionInfo {
    pub fn from_update(feature_id: &str, update: &SessionUpdate) -> Self {
        Self {
            session_id: update.session_id,
            feature_id: feature_id.to_string(),
            bytes_downloaded: update.bytes_downloaded,
            total_bytes: update.total_bytes,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InstallerError {
    #[error("Install request rejected with native code {0}")]
    Rejected(i32),
    #[error("Installer unavailable: {0}")]
    Unavailable(String),
}

/// Installs modules on request and reports progress through a broadcast stream.
///
/// Implementations should run blocking work on their own threads; the loader
/// awaits these calls from its job tasks.
#[async_trait]
pub trait ModuleInstaller: Send + Sync {
    async fn request_install(&self, feature_id: &str) -> Result<SessionId, InstallerError>;

    /// A fresh subscription to every session's updates.
    fn session_updates(&self) -> broadcast::Receiver<SessionUpdate>;

    async fn is_installed(&self, feature_id: &str) -> bool;

    /// Starts the user confirmation flow for a waiting session. The decision is
    /// fed back through [`ControllerClient::user_confirmation_result`](crate::orchestrator::ControllerClient::user_confirmation_result).
    async fn start_confirmation(&self, session: &SessionInfo) -> Result<(), InstallerError>;
}
