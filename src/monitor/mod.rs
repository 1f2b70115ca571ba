//! # Installation Monitor
//!
//! Bridges a [`ModuleInstaller`] session to the loader's domain. For each
//! [`InstallationMonitor::track`] call a tracker task:
//!
//! 1. subscribes to the installer's session updates (before requesting, so no
//!    update can be missed),
//! 2. short-circuits to [`MonitoringEvent::TriggerPostInstallSteps`] if the
//!    module is already installed, otherwise requests the install,
//! 3. translates every update of *its* session into an [`InstallationState`],
//!    records it in the [`StateStore`], and forwards a [`MonitoringEvent`].
//!
//! Dropping the returned receiver stops the events, not the tracking: the
//! installer session keeps running, so the tracker keeps recording its states
//! until the session ends. A terminal state already in the store (a declined
//! confirmation) is not overwritten by a detached tracker.
//!
//! If the update stream lags, the tracker asks the installer whether the module
//! got installed meanwhile, since the skipped updates may have included it.

pub mod error_codes;

pub use error_codes::*;

use crate::installer::{InstallerError, ModuleInstaller, SessionInfo, SessionStatus, SessionUpdate};
use crate::state::{ErrorCode, InstallationState, StateStore};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

/// What the controller hears about an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitoringEvent {
    UiProgress(InstallationState),
    StorePendingConfirmation(SessionInfo),
    TriggerPostInstallSteps,
    TerminalFailure { code: ErrorCode, message: String },
    Cancelled { code: ErrorCode },
}

impl MonitoringEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitoringEvent::TriggerPostInstallSteps
                | MonitoringEvent::TerminalFailure { .. }
                | MonitoringEvent::Cancelled { .. }
        )
    }
}

/// Maps one session update to the state to record and the event to emit.
pub fn translate(feature_id: &str, update: &SessionUpdate) -> (InstallationState, MonitoringEvent) {
    match update.status {
        SessionStatus::Pending | SessionStatus::Canceling => {
            (InstallationState::Pending, MonitoringEvent::UiProgress(InstallationState::Pending))
        }
        SessionStatus::RequiresUserConfirmation => {
            let session = SessionInfo::from_update(feature_id, update);
            (
                InstallationState::RequiresConfirmation(session.clone()),
                MonitoringEvent::StorePendingConfirmation(session),
            )
        }
        SessionStatus::Downloading => {
            let state = InstallationState::Downloading {
                bytes_downloaded: update.bytes_downloaded,
                total_bytes: update.total_bytes,
            };
            (state.clone(), MonitoringEvent::UiProgress(state))
        }
        SessionStatus::Downloaded | SessionStatus::Installing => {
            (InstallationState::Installing, MonitoringEvent::UiProgress(InstallationState::Installing))
        }
        SessionStatus::Installed => (InstallationState::Installed, MonitoringEvent::TriggerPostInstallSteps),
        SessionStatus::Canceled => {
            let code = map_native_error(update.native_error_code);
            (InstallationState::Failed(code), MonitoringEvent::Cancelled { code })
        }
        SessionStatus::Failed => {
            let code = map_native_error(update.native_error_code);
            (
                InstallationState::Failed(code),
                MonitoringEvent::TerminalFailure {
                    code,
                    message: format!("Installation of {feature_id} failed: {code}"),
                },
            )
        }
        SessionStatus::Unknown => (
            InstallationState::Failed(ErrorCode::UnknownError),
            MonitoringEvent::TerminalFailure {
                code: ErrorCode::UnknownError,
                message: format!("Installation of {feature_id} reported an unknown status"),
            },
        ),
    }
}

pub struct InstallationMonitor {
    installer: Arc<dyn ModuleInstaller>,
    state: Arc<StateStore>,
    buffer: usize,
}

impl InstallationMonitor {
    pub fn new(installer: Arc<dyn ModuleInstaller>, state: Arc<StateStore>, buffer: usize) -> Self {
        Self {
            installer,
            state,
            buffer: buffer.max(1),
        }
    }

    pub fn installer(&self) -> &Arc<dyn ModuleInstaller> {
        &self.installer
    }

    /// Starts tracking `feature_id`; events arrive in emission order.
    pub fn track(&self, feature_id: &str, params: &[String]) -> mpsc::Receiver<MonitoringEvent> {
        let (events, receiver) = mpsc::channel(self.buffer);
        let tracker = SessionTracker {
            feature_id: feature_id.to_string(),
            installer: self.installer.clone(),
            state: self.state.clone(),
            events,
            detached: false,
        };
        debug!(feature_id, ?params, "Tracking");
        tokio::spawn(tracker.run().instrument(info_span!("track", feature_id)));
        receiver
    }
}

struct SessionTracker {
    feature_id: String,
    installer: Arc<dyn ModuleInstaller>,
    state: Arc<StateStore>,
    events: mpsc::Sender<MonitoringEvent>,
    // Set once the subscriber is gone; the session is still followed and recorded.
    detached: bool,
}

impl SessionTracker {
    async fn run(mut self) {
        let mut updates = self.installer.session_updates();

        if self.installer.is_installed(&self.feature_id).await {
            info!("Already installed");
            self.record(InstallationState::Installed, MonitoringEvent::TriggerPostInstallSteps).await;
            return;
        }

        self.record(InstallationState::Pending, MonitoringEvent::UiProgress(InstallationState::Pending))
            .await;
        if self.detached {
            debug!("Subscriber gone before the install was requested");
            return;
        }

        let session_id = match self.installer.request_install(&self.feature_id).await {
            Ok(session_id) => session_id,
            Err(e) => {
                let code = match e {
                    InstallerError::Rejected(native) => map_native_error(native),
                    InstallerError::Unavailable(_) => ErrorCode::ApiNotAvailable,
                };
                warn!(error = %e, %code, "Install request failed");
                let message = format!("Install request for {} failed: {e}", self.feature_id);
                self.record(InstallationState::Failed(code), MonitoringEvent::TerminalFailure { code, message })
                    .await;
                return;
            }
        };
        info!(session_id, "Install requested");

        loop {
            let received = tokio::select! {
                _ = self.events.closed(), if !self.detached => None,
                received = updates.recv() => Some(received),
            };
            let Some(received) = received else {
                debug!(session_id, "Subscriber gone, recording session outcome only");
                self.detached = true;
                continue;
            };

            let update = match received {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(session_id, skipped, "Session updates lagged");
                    if self.installer.is_installed(&self.feature_id).await {
                        info!(session_id, "Installed while updates were skipped");
                        self.record(InstallationState::Installed, MonitoringEvent::TriggerPostInstallSteps)
                            .await;
                        return;
                    }
                    continue;
                }
                Err(RecvError::Closed) => {
                    let code = ErrorCode::UnknownError;
                    let message = format!("Installer closed the session stream for {}", self.feature_id);
                    self.record(InstallationState::Failed(code), MonitoringEvent::TerminalFailure { code, message })
                        .await;
                    return;
                }
            };

            if update.session_id != session_id {
                continue;
            }

            debug!(session_id, status = ?update.status, detached = self.detached, "Session update");
            let (state, event) = translate(&self.feature_id, &update);
            let terminal = event.is_terminal();
            self.record(state, event).await;
            if terminal {
                return;
            }
        }
    }

    /// Persists `state` then emits `event`.
    ///
    /// Once detached nothing is emitted, and a terminal state already in the
    /// store (such as a declined confirmation) is kept.
    async fn record(&mut self, state: InstallationState, event: MonitoringEvent) {
        if !self.detached && self.events.is_closed() {
            debug!("Subscriber gone, recording session outcome only");
            self.detached = true;
        }
        if self.detached {
            let current = self.state.get_installation_state(&self.feature_id);
            if current.is_terminal() {
                debug!(?current, ignored = ?state, "Keeping terminal state");
            } else {
                self.state.set_installation_state(&self.feature_id, state);
            }
            return;
        }

        self.state.set_installation_state(&self.feature_id, state);
        if self.events.send(event).await.is_err() {
            debug!("Subscriber gone, recording session outcome only");
            self.detached = true;
        }
    }
}
