//! # Controller Actor
//!
//! The single sequencing context of the loader. It owns the active job, the UI
//! state and the artifact slot, and processes two inputs one at a time:
//!
//! - [`ControllerRequest`]s from clients (new identifiers, user decisions, retry),
//! - [`JobEvent`]s from the job it spawned.
//!
//! Because both are handled on this one task, no locking is needed around the
//! "at most one active job" rule: starting a job always cancels the previous
//! one first, and events from a cancelled job are recognised by their id and
//! dropped.

use super::client::ControllerClient;
use super::error::LoaderError;
use super::job::{ControllerDeps, JobEvent, JobEventKind, LoadJob};
use super::message::ControllerRequest;
use super::state::{ConfirmationRequest, ErrorKind, JobInfo, UiState};
use crate::locator::Artifact;
use crate::route::RouteResolver;
use crate::state::{ErrorCode, InstallationState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

struct ActiveJob {
    info: JobInfo,
    handle: JoinHandle<()>,
}

impl ActiveJob {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub struct ControllerActor {
    receiver: mpsc::Receiver<ControllerRequest>,
    job_events: mpsc::UnboundedReceiver<JobEvent>,
    job_sender: mpsc::UnboundedSender<JobEvent>,
    resolver: RouteResolver,
    deps: ControllerDeps,
    ui_state: watch::Sender<UiState>,
    artifact: watch::Sender<Option<Artifact>>,
    confirmations: mpsc::Sender<ConfirmationRequest>,
    active: Option<ActiveJob>,
    next_job_id: u64,
}

impl ControllerActor {
    /// Creates the actor, its client, and the single receiver of confirmation requests.
    ///
    /// # Arguments
    ///
    /// * `buffer_size` - Capacity of the request channel. Clients wait when it is full.
    /// * `confirmation_buffer` - Capacity of the confirmation request channel. Requests
    ///   that do not fit are dropped with a warning.
    pub fn new(
        buffer_size: usize,
        confirmation_buffer: usize,
        resolver: RouteResolver,
        deps: ControllerDeps,
    ) -> (Self, ControllerClient, mpsc::Receiver<ConfirmationRequest>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let (job_sender, job_events) = mpsc::unbounded_channel();
        let (ui_state, ui_state_rx) = watch::channel(UiState::default());
        let (artifact, artifact_rx) = watch::channel(None);
        let (confirmations, confirmations_rx) = mpsc::channel(confirmation_buffer.max(1));

        let actor = Self {
            receiver,
            job_events,
            job_sender,
            resolver,
            deps,
            ui_state,
            artifact,
            confirmations,
            active: None,
            next_job_id: 0,
        };
        let client = ControllerClient::new(sender, ui_state_rx, artifact_rx);
        (actor, client, confirmations_rx)
    }

    /// Runs until every client has been dropped, then cancels the active job.
    pub async fn run(mut self) {
        info!("Controller started");

        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                Some(event) = self.job_events.recv() => self.handle_job_event(event),
            }
        }

        self.cancel_active("controller shutting down");
        info!(jobs = self.next_job_id, "Controller shutdown");
    }

    async fn handle_request(&mut self, request: ControllerRequest) {
        match request {
            ControllerRequest::ProcessUri { raw, respond_to } => {
                self.process_uri(raw);
                let _ = respond_to.send(Ok(()));
            }
            ControllerRequest::ConfirmationResult {
                feature_id,
                confirmed,
                respond_to,
            } => {
                let _ = respond_to.send(self.confirmation_result(&feature_id, confirmed));
            }
            ControllerRequest::Retry { respond_to } => {
                self.retry().await;
                let _ = respond_to.send(Ok(()));
            }
            ControllerRequest::StartConfirmation { feature_id, respond_to } => {
                let _ = respond_to.send(self.start_confirmation(&feature_id).await);
            }
            ControllerRequest::ActiveJob { respond_to } => {
                let info = self
                    .active
                    .as_ref()
                    .filter(|job| job.is_running())
                    .map(|job| job.info.clone());
                let _ = respond_to.send(Ok(info));
            }
            ControllerRequest::ClearArtifact { respond_to } => {
                debug!("Artifact cleared");
                self.artifact.send_replace(None);
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    fn process_uri(&mut self, raw: String) {
        let route = self.resolver.resolve(&raw);
        let Some(route_name) = route.feature_id().map(str::to_string) else {
            self.cancel_active("superseded by an invalid identifier");
            let reason = route.failure_reason().unwrap_or("unrecognised identifier");
            self.publish(UiState::Error {
                message: format!("Cannot open {raw}: {reason}"),
                kind: ErrorKind::UriInvalid,
                feature_id: None,
            });
            return;
        };

        if let Some(active) = self.active.as_ref().filter(|job| job.is_running()) {
            if active.info.raw_uri == raw {
                info!(job_id = active.info.job_id, %raw, "Duplicate request ignored");
                return;
            }
        }
        self.cancel_active("superseded by a new request");

        // An alias addresses the registered feature; unregistered names are used as-is.
        let feature_id = self
            .deps
            .registry
            .get_by_route(&route_name)
            .map(|config| config.feature_id.clone())
            .unwrap_or(route_name);

        self.deps.state.set_last_attempted_feature(&raw);
        self.next_job_id += 1;
        let info = JobInfo {
            job_id: self.next_job_id,
            feature_id: feature_id.clone(),
            raw_uri: raw,
            params: route.params,
        };
        info!(job_id = info.job_id, %feature_id, params = ?info.params, "Loading feature");
        self.publish(UiState::Loading {
            feature_id: Some(feature_id.clone()),
            installation: None,
        });

        let job = LoadJob::new(
            info.job_id,
            feature_id.clone(),
            info.params.clone(),
            self.deps.clone(),
            self.job_sender.clone(),
        );
        let span = info_span!("job", job_id = info.job_id, %feature_id);
        let handle = tokio::spawn(job.run().instrument(span));
        self.active = Some(ActiveJob { info, handle });
    }

    fn cancel_active(&mut self, reason: &str) {
        if let Some(active) = self.active.take() {
            if active.is_running() {
                info!(job_id = active.info.job_id, feature_id = %active.info.feature_id, reason, "Cancelling job");
                active.handle.abort();
            }
        }
    }

    fn handle_job_event(&mut self, event: JobEvent) {
        let Some(active) = self.active.as_ref().filter(|job| job.info.job_id == event.job_id) else {
            debug!(job_id = event.job_id, "Dropping event from inactive job");
            return;
        };
        let feature_id = active.info.feature_id.clone();

        match event.kind {
            JobEventKind::Progress(installation) => self.publish(UiState::Loading {
                feature_id: Some(feature_id),
                installation: Some(installation),
            }),
            JobEventKind::ConfirmationRequired(session) => {
                self.deps.state.store_pending_confirmation(&feature_id, session.clone());
                self.publish(UiState::RequiresConfirmation {
                    feature_id: feature_id.clone(),
                });
                if let Err(e) = self.confirmations.try_send(ConfirmationRequest { feature_id, session }) {
                    warn!(error = %e, "Confirmation request dropped");
                }
            }
            JobEventKind::Failed { kind, message, code } => {
                if let Some(code) = code {
                    self.deps
                        .state
                        .set_installation_state(&feature_id, InstallationState::Failed(code));
                }
                self.active = None;
                warn!(%feature_id, %kind, %message, "Load failed");
                self.publish(UiState::Error {
                    message,
                    kind,
                    feature_id: Some(feature_id),
                });
            }
            JobEventKind::Succeeded { artifact, installation } => {
                let params = self.active.take().map(|job| job.info.params).unwrap_or_default();
                info!(%feature_id, "Load succeeded");
                self.artifact.send_replace(Some(artifact.clone()));
                self.publish(UiState::Success {
                    feature_id,
                    params,
                    artifact,
                    installation,
                });
            }
        }
    }

    fn confirmation_result(&mut self, feature_id: &str, confirmed: bool) -> Result<(), LoaderError> {
        let awaiting = matches!(
            &*self.ui_state.borrow(),
            UiState::RequiresConfirmation { feature_id: waiting } if waiting == feature_id
        );
        if !awaiting {
            warn!(feature_id, confirmed, "No confirmation pending");
            return Err(LoaderError::NoPendingConfirmation(feature_id.to_string()));
        }
        self.deps.state.clear_pending_confirmation(feature_id);

        if confirmed {
            info!(feature_id, "User confirmed installation");
            self.publish(UiState::Loading {
                feature_id: Some(feature_id.to_string()),
                installation: None,
            });
        } else {
            info!(feature_id, "User declined installation");
            self.cancel_active("declined by user");
            // Recorded as a failure with NO_ERROR so a decline can be told apart from a fault.
            self.deps
                .state
                .set_installation_state(feature_id, InstallationState::Failed(ErrorCode::NoError));
            self.publish(UiState::Error {
                message: format!("Installation of {feature_id} was declined"),
                kind: ErrorKind::Installation,
                feature_id: Some(feature_id.to_string()),
            });
        }
        Ok(())
    }

    async fn retry(&mut self) {
        match self.deps.state.get_last_attempted_feature().await {
            Some(raw) => {
                info!(%raw, "Retrying last attempted feature");
                self.process_uri(raw);
            }
            None => self.publish(UiState::Error {
                message: "No feature to retry".to_string(),
                kind: ErrorKind::Validation,
                feature_id: None,
            }),
        }
    }

    async fn start_confirmation(&self, feature_id: &str) -> Result<(), LoaderError> {
        let session = self
            .deps
            .state
            .pending_confirmation(feature_id)
            .ok_or_else(|| LoaderError::NoPendingConfirmation(feature_id.to_string()))?;

        self.deps
            .monitor
            .installer()
            .start_confirmation(&session)
            .await
            .map_err(|e| LoaderError::Installer(e.to_string()))
    }

    fn publish(&self, state: UiState) {
        debug!(?state, "UI state");
        self.ui_state.send_replace(state);
    }
}
