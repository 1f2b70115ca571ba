//! # State Store
//!
//! Observable installation and interceptor state, pending confirmation payloads,
//! and the durable "last attempted feature" record.
//!
//! ## Observation
//!
//! Each key owns a [`watch`] channel. A receiver obtained from
//! [`StateStore::observe_installation_state`] can `borrow()` the current value
//! immediately and `changed().await` for every later write, which gives
//! replay-latest semantics without a global lock: the [`DashMap`] only locks the
//! shard holding the key being written.
//!
//! ## Durability
//!
//! Only the last attempted identifier is durable. Writes are queued to the
//! [`PreferenceWriter`] and never awaited by the caller; failed reads degrade to
//! "nothing attempted".

pub mod persistence;

pub use persistence::*;

use crate::installer::SessionInfo;
use crate::registry::Phase;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

/// Durable key holding the last identifier whose load was initiated.
pub const LAST_ATTEMPTED_KEY: &str = "last_attempted_feature_uri";

/// Domain error codes for installation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,
    ActiveSessionsLimitExceeded,
    ModuleUnavailable,
    InvalidRequest,
    SessionNotFound,
    ApiNotAvailable,
    NetworkError,
    AccessDenied,
    IncompatibleWithExistingSession,
    InsufficientStorage,
    VerificationError,
    EmulationError,
    CopyError,
    StoreNotFound,
    AppNotOwned,
    InternalError,
    UnknownError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ActiveSessionsLimitExceeded => "ACTIVE_SESSIONS_LIMIT_EXCEEDED",
            ErrorCode::ModuleUnavailable => "MODULE_UNAVAILABLE",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::ApiNotAvailable => "API_NOT_AVAILABLE",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::IncompatibleWithExistingSession => "INCOMPATIBLE_WITH_EXISTING_SESSION",
            ErrorCode::InsufficientStorage => "INSUFFICIENT_STORAGE",
            ErrorCode::VerificationError => "VERIFICATION_ERROR",
            ErrorCode::EmulationError => "EMULATION_ERROR",
            ErrorCode::CopyError => "COPY_ERROR",
            ErrorCode::StoreNotFound => "STORE_NOT_FOUND",
            ErrorCode::AppNotOwned => "APP_NOT_OWNED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        };
        f.write_str(name)
    }
}

/// Installation state of one feature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstallationState {
    #[default]
    NotInstalled,
    Pending,
    Downloading { bytes_downloaded: u64, total_bytes: u64 },
    Installing,
    Installed,
    RequiresConfirmation(SessionInfo),
    Failed(ErrorCode),
}

impl InstallationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallationState::Installed | InstallationState::Failed(_))
    }
}

/// Run state of one interceptor instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InterceptorRunState {
    #[default]
    Inactive,
    Active,
    Completed,
    Failed(String),
}

/// Identifies one interceptor instance; displays as `feature:phase:index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterceptorId {
    pub feature_id: String,
    pub phase: Phase,
    pub index: usize,
}

impl InterceptorId {
    pub fn new(feature_id: impl Into<String>, phase: Phase, index: usize) -> Self {
        Self {
            feature_id: feature_id.into(),
            phase,
            index,
        }
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.feature_id, self.phase, self.index)
    }
}

pub struct StateStore {
    installations: DashMap<String, watch::Sender<InstallationState>>,
    interceptors: DashMap<InterceptorId, watch::Sender<InterceptorRunState>>,
    pending_confirmations: DashMap<String, SessionInfo>,
    preferences: Arc<dyn Preferences>,
    writer: mpsc::UnboundedSender<PreferenceCommand>,
    // Mirrors writes made by this process so reads don't race the writer.
    last_attempted: RwLock<Option<String>>,
}

impl StateStore {
    /// Creates the store and the writer actor that must be spawned alongside it.
    pub fn new(preferences: Arc<dyn Preferences>) -> (Self, PreferenceWriter) {
        let (writer, sender) = PreferenceWriter::new(preferences.clone());
        let store = Self {
            installations: DashMap::new(),
            interceptors: DashMap::new(),
            pending_confirmations: DashMap::new(),
            preferences,
            writer: sender,
            last_attempted: RwLock::new(None),
        };
        (store, writer)
    }

    pub fn get_installation_state(&self, feature_id: &str) -> InstallationState {
        self.installations
            .get(feature_id)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default()
    }

    pub fn set_installation_state(&self, feature_id: &str, state: InstallationState) {
        debug!(feature_id, ?state, "Installation state");
        self.installations
            .entry(feature_id.to_string())
            .or_insert_with(|| watch::channel(InstallationState::default()).0)
            .send_replace(state);
    }

    pub fn observe_installation_state(&self, feature_id: &str) -> watch::Receiver<InstallationState> {
        self.installations
            .entry(feature_id.to_string())
            .or_insert_with(|| watch::channel(InstallationState::default()).0)
            .subscribe()
    }

    pub fn get_interceptor_state(&self, id: &InterceptorId) -> InterceptorRunState {
        self.interceptors
            .get(id)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default()
    }

    pub fn set_interceptor_state(&self, id: &InterceptorId, state: InterceptorRunState) {
        debug!(interceptor = %id, ?state, "Interceptor state");
        self.interceptors
            .entry(id.clone())
            .or_insert_with(|| watch::channel(InterceptorRunState::default()).0)
            .send_replace(state);
    }

    pub fn observe_interceptor_state(&self, id: &InterceptorId) -> watch::Receiver<InterceptorRunState> {
        self.interceptors
            .entry(id.clone())
            .or_insert_with(|| watch::channel(InterceptorRunState::default()).0)
            .subscribe()
    }

    pub fn store_pending_confirmation(&self, feature_id: &str, session: SessionInfo) {
        self.pending_confirmations.insert(feature_id.to_string(), session);
    }

    pub fn pending_confirmation(&self, feature_id: &str) -> Option<SessionInfo> {
        self.pending_confirmations.get(feature_id).map(|entry| entry.value().clone())
    }

    pub fn clear_pending_confirmation(&self, feature_id: &str) -> Option<SessionInfo> {
        self.pending_confirmations.remove(feature_id).map(|(_, session)| session)
    }

    /// Records the identifier and queues the durable write; returns immediately.
    pub fn set_last_attempted_feature(&self, identifier: &str) {
        *self.last_attempted.write().unwrap_or_else(PoisonError::into_inner) = Some(identifier.to_string());

        let command = PreferenceCommand::Write {
            key: LAST_ATTEMPTED_KEY.to_string(),
            value: Some(identifier.to_string()),
        };
        if self.writer.send(command).is_err() {
            warn!(identifier, "Preference writer is gone, durable write skipped");
        }
    }

    pub async fn get_last_attempted_feature(&self) -> Option<String> {
        let cached = self.last_attempted.read().unwrap_or_else(PoisonError::into_inner).clone();
        if cached.is_some() {
            return cached;
        }

        match self.preferences.read(LAST_ATTEMPTED_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Durable read failed, assuming nothing was attempted");
                None
            }
        }
    }

    /// Waits until every durable write queued so far has been applied (or dropped).
    pub async fn flush(&self) {
        let (respond_to, done) = oneshot::channel();
        if self.writer.send(PreferenceCommand::Flush { respond_to }).is_ok() {
            let _ = done.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(prefs: Arc<MemoryPreferences>) -> StateStore {
        let (store, writer) = StateStore::new(prefs);
        tokio::spawn(writer.run());
        store
    }

    #[tokio::test]
    async fn test_installation_state_defaults_and_updates() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        assert_eq!(store.get_installation_state("plants"), InstallationState::NotInstalled);

        let mut rx = store.observe_installation_state("plants");
        assert_eq!(*rx.borrow(), InstallationState::NotInstalled);

        store.set_installation_state("plants", InstallationState::Installing);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), InstallationState::Installing);
        assert_eq!(store.get_installation_state("plants"), InstallationState::Installing);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_latest_value() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        store.set_installation_state("plants", InstallationState::Pending);
        store.set_installation_state("plants", InstallationState::Installed);

        let rx = store.observe_installation_state("plants");
        assert_eq!(*rx.borrow(), InstallationState::Installed);
        assert_eq!(store.get_installation_state("other"), InstallationState::NotInstalled);
    }

    #[tokio::test]
    async fn test_interceptor_state() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        let id = InterceptorId::new("plants", Phase::PreInstall, 0);
        assert_eq!(id.to_string(), "plants:pre-install:0");
        assert_eq!(store.get_interceptor_state(&id), InterceptorRunState::Inactive);

        let rx = store.observe_interceptor_state(&id);
        store.set_interceptor_state(&id, InterceptorRunState::Failed("boom".into()));
        assert_eq!(*rx.borrow(), InterceptorRunState::Failed("boom".into()));
    }

    #[tokio::test]
    async fn test_pending_confirmation_lifecycle() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        let session = SessionInfo {
            session_id: 3,
            feature_id: "plants".into(),
            bytes_downloaded: 0,
            total_bytes: 10,
        };
        store.store_pending_confirmation("plants", session.clone());
        assert_eq!(store.pending_confirmation("plants"), Some(session.clone()));
        assert_eq!(store.clear_pending_confirmation("plants"), Some(session));
        assert_eq!(store.pending_confirmation("plants"), None);
    }

    #[tokio::test]
    async fn test_last_attempted_is_persisted() {
        let prefs = Arc::new(MemoryPreferences::new());
        let store = store_with(prefs.clone());
        assert_eq!(store.get_last_attempted_feature().await, None);

        store.set_last_attempted_feature("scheme://host/chase/df/route/plants");
        assert_eq!(
            store.get_last_attempted_feature().await.as_deref(),
            Some("scheme://host/chase/df/route/plants")
        );
        store.flush().await;
        assert_eq!(
            prefs.snapshot(LAST_ATTEMPTED_KEY).as_deref(),
            Some("scheme://host/chase/df/route/plants")
        );

        // A new process reads the durable value.
        let restarted = store_with(prefs);
        assert_eq!(
            restarted.get_last_attempted_feature().await.as_deref(),
            Some("scheme://host/chase/df/route/plants")
        );
    }

    #[tokio::test]
    async fn test_storage_failures_degrade() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set_failing(true);
        let store = store_with(prefs.clone());

        assert_eq!(store.get_last_attempted_feature().await, None);
        store.set_last_attempted_feature("scheme://host/chase/df/route/plants");
        store.flush().await;
        assert_eq!(prefs.snapshot(LAST_ATTEMPTED_KEY), None);
    }
}
