//! # Mock Collaborators
//!
//! In-memory stand-ins for the [`ModuleInstaller`] and [`ComponentLocator`] so the
//! whole loader can be driven deterministically in tests and demos.
//!
//! ## Expectations
//!
//! ```ignore
//! let installer = Arc::new(MockModuleInstaller::new());
//! installer.expect_install("plants").return_ok_with(7, vec![
//!     SessionUpdate::new(7, SessionStatus::Downloading).with_progress(10, 100),
//!     SessionUpdate::new(7, SessionStatus::Installed),
//! ]);
//! // ... drive the loader ...
//! installer.verify(); // every expectation was consumed
//! ```
//!
//! A session created with [`InstallExpectationBuilder::return_ok`] stays open
//! until the test pushes updates itself with [`MockModuleInstaller::emit`].

use crate::installer::{InstallerError, ModuleInstaller, SessionId, SessionInfo, SessionStatus, SessionUpdate};
use crate::locator::{Artifact, ComponentLocator};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct InstallExpectation {
    feature_id: String,
    response: Result<SessionId, InstallerError>,
    script: Vec<SessionUpdate>,
}

/// A scriptable [`ModuleInstaller`].
pub struct MockModuleInstaller {
    updates: broadcast::Sender<SessionUpdate>,
    expectations: Arc<Mutex<VecDeque<InstallExpectation>>>,
    installed: Arc<Mutex<HashSet<String>>>,
    sessions: Arc<Mutex<HashMap<SessionId, String>>>,
    requests: Mutex<Vec<String>>,
    confirmations: Mutex<Vec<SessionInfo>>,
}

impl Default for MockModuleInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModuleInstaller {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            updates,
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            installed: Arc::new(Mutex::new(HashSet::new())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            requests: Mutex::new(Vec::new()),
            confirmations: Mutex::new(Vec::new()),
        }
    }

    /// Expects an install request for `feature_id`.
    pub fn expect_install(&self, feature_id: impl Into<String>) -> InstallExpectationBuilder {
        InstallExpectationBuilder {
            feature_id: feature_id.into(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn mark_installed(&self, feature_id: impl Into<String>) {
        lock(&self.installed).insert(feature_id.into());
    }

    /// Broadcasts an update as if the installer had produced it.
    pub fn emit(&self, update: SessionUpdate) {
        publish(&self.updates, &self.sessions, &self.installed, update);
    }

    pub fn request_count(&self, feature_id: &str) -> usize {
        lock(&self.requests).iter().filter(|f| *f == feature_id).count()
    }

    /// Sessions handed to [`ModuleInstaller::start_confirmation`], in call order.
    pub fn confirmations(&self) -> Vec<SessionInfo> {
        lock(&self.confirmations).clone()
    }

    /// Panics if any expectation was never consumed.
    pub fn verify(&self) {
        let remaining = lock(&self.expectations).len();
        if remaining != 0 {
            panic!("Not all install expectations were met. {remaining} remaining");
        }
    }
}

fn publish(
    updates: &broadcast::Sender<SessionUpdate>,
    sessions: &Mutex<HashMap<SessionId, String>>,
    installed: &Mutex<HashSet<String>>,
    update: SessionUpdate,
) {
    if update.status == SessionStatus::Installed {
        if let Some(feature_id) = lock(sessions).get(&update.session_id) {
            lock(installed).insert(feature_id.clone());
        }
    }
    // No subscribers is fine: nobody is tracking this session any more.
    let _ = updates.send(update);
}

#[async_trait]
impl ModuleInstaller for MockModuleInstaller {
    async fn request_install(&self, feature_id: &str) -> Result<SessionId, InstallerError> {
        lock(&self.requests).push(feature_id.to_string());

        let expectation = {
            let mut expectations = lock(&self.expectations);
            expectations
                .iter()
                .position(|e| e.feature_id == feature_id)
                .and_then(|index| expectations.remove(index))
        };
        let Some(expectation) = expectation else {
            warn!(feature_id, "Unexpected install request");
            return Err(InstallerError::Unavailable(format!("unexpected install request for {feature_id}")));
        };

        let session_id = expectation.response?;
        lock(&self.sessions).insert(session_id, feature_id.to_string());
        debug!(feature_id, session_id, steps = expectation.script.len(), "Session started");

        let updates = self.updates.clone();
        let sessions = self.sessions.clone();
        let installed = self.installed.clone();
        tokio::spawn(async move {
            for update in expectation.script {
                tokio::task::yield_now().await;
                publish(&updates, &sessions, &installed, update);
            }
        });
        Ok(session_id)
    }

    fn session_updates(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    async fn is_installed(&self, feature_id: &str) -> bool {
        lock(&self.installed).contains(feature_id)
    }

    async fn start_confirmation(&self, session: &SessionInfo) -> Result<(), InstallerError> {
        lock(&self.confirmations).push(session.clone());
        Ok(())
    }
}

/// Builder for install expectations.
pub struct InstallExpectationBuilder {
    feature_id: String,
    expectations: Arc<Mutex<VecDeque<InstallExpectation>>>,
}

impl InstallExpectationBuilder {
    /// Starts a session that only progresses through [`MockModuleInstaller::emit`].
    pub fn return_ok(self, session_id: SessionId) {
        self.push(Ok(session_id), Vec::new());
    }

    /// Starts a session and plays `script` right after the request.
    pub fn return_ok_with(self, session_id: SessionId, script: Vec<SessionUpdate>) {
        self.push(Ok(session_id), script);
    }

    pub fn return_err(self, error: InstallerError) {
        self.push(Err(error), Vec::new());
    }

    fn push(self, response: Result<SessionId, InstallerError>, script: Vec<SessionUpdate>) {
        lock(&self.expectations).push_back(InstallExpectation {
            feature_id: self.feature_id,
            response,
            script,
        });
    }
}

/// A [`ComponentLocator`] backed by a fixed table.
#[derive(Default)]
pub struct MockComponentLocator {
    artifacts: Mutex<HashMap<String, Artifact>>,
    lookups: AtomicUsize,
}

impl MockComponentLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&self, artifact: Artifact) {
        lock(&self.artifacts).insert(artifact.feature_id().to_string(), artifact);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentLocator for MockComponentLocator {
    async fn locate(&self, feature_id: &str, _params: &[String]) -> Option<Artifact> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        lock(&self.artifacts).get(feature_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_session_reaches_subscribers() {
        let installer = MockModuleInstaller::new();
        installer
            .expect_install("plants")
            .return_ok_with(4, vec![SessionUpdate::new(4, SessionStatus::Installed)]);

        let mut updates = installer.session_updates();
        assert_eq!(installer.request_install("plants").await, Ok(4));
        assert_eq!(updates.recv().await.unwrap().status, SessionStatus::Installed);
        assert!(installer.is_installed("plants").await);
        installer.verify();
    }

    #[tokio::test]
    async fn test_unexpected_request_is_refused() {
        let installer = MockModuleInstaller::new();
        assert!(installer.request_install("ghost").await.is_err());
        assert_eq!(installer.request_count("ghost"), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "Not all install expectations were met")]
    async fn test_verify_reports_leftovers() {
        let installer = MockModuleInstaller::new();
        installer.expect_install("plants").return_ok(1);
        installer.verify();
    }

    #[tokio::test]
    async fn test_locator_table() {
        let locator = MockComponentLocator::new();
        locator.provide(Artifact::new("plants", |_| "plants".to_string()));

        assert!(locator.locate("plants", &[]).await.is_some());
        assert!(locator.locate("ghost", &[]).await.is_none());
        assert_eq!(locator.lookup_count(), 2);
    }
}
