//! # Controller Messages
//!
//! Requests sent from [`ControllerClient`](super::ControllerClient) to
//! [`ControllerActor`](super::ControllerActor). Each carries a one-shot
//! responder; the actor answers once the request has been applied to its state,
//! not once the load it may start has finished.

use super::error::LoaderError;
use super::state::JobInfo;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the controller.
pub type Response<T> = oneshot::Sender<Result<T, LoaderError>>;

#[derive(Debug)]
pub enum ControllerRequest {
    ProcessUri {
        raw: String,
        respond_to: Response<()>,
    },
    ConfirmationResult {
        feature_id: String,
        confirmed: bool,
        respond_to: Response<()>,
    },
    Retry {
        respond_to: Response<()>,
    },
    StartConfirmation {
        feature_id: String,
        respond_to: Response<()>,
    },
    ActiveJob {
        respond_to: Response<Option<JobInfo>>,
    },
    ClearArtifact {
        respond_to: Response<()>,
    },
}
