//! Errors returned by [`ControllerClient`](super::ControllerClient) calls.
//!
//! These cover talking to the controller. Load failures are not errors here:
//! they are reported as [`UiState::Error`](super::UiState::Error).

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoaderError {
    #[error("Controller closed")]
    ControllerClosed,
    #[error("Controller dropped response channel")]
    ControllerDropped,
    #[error("No confirmation pending for {0}")]
    NoPendingConfirmation(String),
    #[error("Installer error: {0}")]
    Installer(String),
}
