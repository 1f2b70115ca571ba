//! # Controller Client
//!
//! The typed front door to the [`ControllerActor`](super::ControllerActor).
//! Cheap to clone; every clone talks to the same actor.

use super::error::LoaderError;
use super::message::{ControllerRequest, Response};
use super::state::{JobInfo, UiState};
use crate::locator::Artifact;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct ControllerClient {
    sender: mpsc::Sender<ControllerRequest>,
    ui_state: watch::Receiver<UiState>,
    artifact: watch::Receiver<Option<Artifact>>,
}

impl ControllerClient {
    pub(crate) fn new(
        sender: mpsc::Sender<ControllerRequest>,
        ui_state: watch::Receiver<UiState>,
        artifact: watch::Receiver<Option<Artifact>>,
    ) -> Self {
        Self {
            sender,
            ui_state,
            artifact,
        }
    }

    async fn call<T>(&self, request: impl FnOnce(Response<T>) -> ControllerRequest) -> Result<T, LoaderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(request(respond_to))
            .await
            .map_err(|_| LoaderError::ControllerClosed)?;
        response.await.map_err(|_| LoaderError::ControllerDropped)?
    }

    /// Submits a raw identifier. Returns once the controller has accepted (or
    /// ignored) it; follow progress through [`ControllerClient::ui_state`].
    #[instrument(skip(self))]
    pub async fn process_uri(&self, raw: &str) -> Result<(), LoaderError> {
        debug!("Sending request");
        let raw = raw.to_string();
        self.call(|respond_to| ControllerRequest::ProcessUri { raw, respond_to }).await
    }

    /// Delivers the user's answer to a pending confirmation.
    #[instrument(skip(self))]
    pub async fn user_confirmation_result(&self, feature_id: &str, confirmed: bool) -> Result<(), LoaderError> {
        debug!("Sending request");
        let feature_id = feature_id.to_string();
        self.call(|respond_to| ControllerRequest::ConfirmationResult {
            feature_id,
            confirmed,
            respond_to,
        })
        .await
    }

    /// Re-submits the last attempted identifier, if any.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<(), LoaderError> {
        debug!("Sending request");
        self.call(|respond_to| ControllerRequest::Retry { respond_to }).await
    }

    /// Hands the pending session of `feature_id` to the installer's confirmation flow.
    #[instrument(skip(self))]
    pub async fn start_confirmation(&self, feature_id: &str) -> Result<(), LoaderError> {
        debug!("Sending request");
        let feature_id = feature_id.to_string();
        self.call(|respond_to| ControllerRequest::StartConfirmation { feature_id, respond_to })
            .await
    }

    /// The job currently being loaded, if it is still running.
    #[instrument(skip(self))]
    pub async fn active_job(&self) -> Result<Option<JobInfo>, LoaderError> {
        debug!("Sending request");
        self.call(|respond_to| ControllerRequest::ActiveJob { respond_to }).await
    }

    /// Empties the artifact slot once the rendering layer no longer shows it.
    #[instrument(skip(self))]
    pub async fn clear_artifact(&self) -> Result<(), LoaderError> {
        debug!("Sending request");
        self.call(|respond_to| ControllerRequest::ClearArtifact { respond_to }).await
    }

    pub fn ui_state(&self) -> watch::Receiver<UiState> {
        self.ui_state.clone()
    }

    pub fn current_state(&self) -> UiState {
        self.ui_state.borrow().clone()
    }

    pub fn artifact(&self) -> watch::Receiver<Option<Artifact>> {
        self.artifact.clone()
    }
}
