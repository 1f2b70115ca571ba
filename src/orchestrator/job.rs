//! # Load Jobs
//!
//! A [`LoadJob`] carries one feature from pre-install checks to a located
//! artifact. It runs in its own task and reports to the controller through
//! [`JobEvent`]s tagged with its id. The controller alone turns those into UI
//! state, and it ignores events from jobs it has already cancelled.

use super::state::ErrorKind;
use crate::installer::SessionInfo;
use crate::interceptor::InterceptorRunner;
use crate::locator::{Artifact, ComponentLocator};
use crate::monitor::{InstallationMonitor, MonitoringEvent};
use crate::registry::{FeatureRegistry, Phase};
use crate::state::{ErrorCode, InstallationState, StateStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything a job (and the controller) needs, shared by reference.
#[derive(Clone)]
pub struct ControllerDeps {
    pub registry: Arc<FeatureRegistry>,
    pub state: Arc<StateStore>,
    pub runner: Arc<InterceptorRunner>,
    pub monitor: Arc<InstallationMonitor>,
    pub locator: Arc<dyn ComponentLocator>,
}

#[derive(Debug)]
pub(crate) struct JobEvent {
    pub job_id: u64,
    pub kind: JobEventKind,
}

#[derive(Debug)]
pub(crate) enum JobEventKind {
    Progress(InstallationState),
    ConfirmationRequired(SessionInfo),
    Failed {
        kind: ErrorKind,
        message: String,
        code: Option<ErrorCode>,
    },
    Succeeded {
        artifact: Artifact,
        installation: InstallationState,
    },
}

impl JobEventKind {
    fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        JobEventKind::Failed {
            kind,
            message: message.into(),
            code: None,
        }
    }

    fn installation_failed(code: ErrorCode, message: String) -> Self {
        let kind = match code {
            ErrorCode::UnknownError => ErrorKind::Unknown,
            _ => ErrorKind::Installation,
        };
        JobEventKind::Failed {
            kind,
            message,
            code: Some(code),
        }
    }
}

pub(crate) struct LoadJob {
    id: u64,
    feature_id: String,
    params: Vec<String>,
    deps: ControllerDeps,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl LoadJob {
    pub fn new(
        id: u64,
        feature_id: String,
        params: Vec<String>,
        deps: ControllerDeps,
        events: mpsc::UnboundedSender<JobEvent>,
    ) -> Self {
        Self {
            id,
            feature_id,
            params,
            deps,
            events,
        }
    }

    pub async fn run(self) {
        info!("Job started");
        let outcome = self.execute().await;
        debug!(?outcome, "Job finished");
        self.report(outcome);
    }

    fn report(&self, kind: JobEventKind) {
        if self.events.send(JobEvent { job_id: self.id, kind }).is_err() {
            debug!("Controller gone, event dropped");
        }
    }

    async fn execute(&self) -> JobEventKind {
        let feature_id = &self.feature_id;

        if !self.deps.runner.run(feature_id, Phase::PreInstall).await {
            return JobEventKind::failed(
                ErrorKind::Validation,
                format!("Pre-install checks failed for {feature_id}"),
            );
        }

        if self.deps.state.get_installation_state(feature_id) == InstallationState::Installed {
            info!("Already installed, skipping installation");
        } else if let Some(failure) = self.install().await {
            return failure;
        }

        self.post_install().await
    }

    /// Follows the monitor until the feature is installed; `Some` on failure.
    async fn install(&self) -> Option<JobEventKind> {
        let feature_id = &self.feature_id;
        let mut events = self.deps.monitor.track(feature_id, &self.params);

        while let Some(event) = events.recv().await {
            match event {
                MonitoringEvent::UiProgress(state) => self.report(JobEventKind::Progress(state)),
                MonitoringEvent::StorePendingConfirmation(session) => {
                    info!(session_id = session.session_id, "Waiting for user confirmation");
                    self.report(JobEventKind::ConfirmationRequired(session));
                }
                MonitoringEvent::TriggerPostInstallSteps => return None,
                MonitoringEvent::TerminalFailure { code, message } => {
                    warn!(%code, %message, "Installation failed");
                    return Some(JobEventKind::installation_failed(code, message));
                }
                MonitoringEvent::Cancelled { code } => {
                    warn!(%code, "Installation cancelled");
                    return Some(JobEventKind::installation_failed(
                        code,
                        format!("Installation of {feature_id} was cancelled"),
                    ));
                }
            }
        }

        Some(JobEventKind::failed(
            ErrorKind::Installation,
            format!("Installation monitor for {feature_id} stopped unexpectedly"),
        ))
    }

    async fn post_install(&self) -> JobEventKind {
        let feature_id = &self.feature_id;

        if !self.deps.runner.run(feature_id, Phase::PostInstall).await {
            return JobEventKind::failed(
                ErrorKind::Validation,
                format!("Post-install setup failed for {feature_id}"),
            );
        }

        match self.deps.locator.locate(feature_id, &self.params).await {
            Some(artifact) => JobEventKind::Succeeded {
                artifact,
                installation: self.deps.state.get_installation_state(feature_id),
            },
            None => JobEventKind::failed(
                ErrorKind::Setup,
                format!("Feature {feature_id} is installed but exposes no entry point"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unknown_error_code_is_unknown_kind() {
        for code in [ErrorCode::NoError, ErrorCode::NetworkError, ErrorCode::InternalError] {
            let event = JobEventKind::installation_failed(code, "failed".to_string());
            assert!(
                matches!(event, JobEventKind::Failed { kind: ErrorKind::Installation, code: Some(c), .. } if c == code),
                "{code} should be an installation failure"
            );
        }

        let event = JobEventKind::installation_failed(ErrorCode::UnknownError, "closed".to_string());
        assert!(matches!(
            event,
            JobEventKind::Failed { kind: ErrorKind::Unknown, code: Some(ErrorCode::UnknownError), .. }
        ));
    }
}
