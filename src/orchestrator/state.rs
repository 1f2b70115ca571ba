//! Values the controller publishes to the rendering layer.

use crate::installer::SessionInfo;
use crate::locator::Artifact;
use crate::state::InstallationState;
use std::fmt;

/// Why a load ended in [`UiState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The identifier could not be resolved to a route.
    UriInvalid,
    /// Registry or interceptor checks failed.
    Validation,
    /// The installer failed, or the user declined.
    Installation,
    /// The feature installed but exposes no entry point.
    Setup,
    /// An installation failure whose code is `UNKNOWN_ERROR`: a native code
    /// with no domain mapping, an unknown session status, or a closed update
    /// stream. Every other installer failure or cancellation is [`ErrorKind::Installation`].
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UriInvalid => "URI_INVALID",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Installation => "INSTALLATION",
            ErrorKind::Setup => "SETUP",
            ErrorKind::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// The controller's observable state.
#[derive(Debug, Clone, PartialEq)]
pub enum UiState {
    Loading {
        feature_id: Option<String>,
        installation: Option<InstallationState>,
    },
    RequiresConfirmation {
        feature_id: String,
    },
    Error {
        message: String,
        kind: ErrorKind,
        feature_id: Option<String>,
    },
    Success {
        feature_id: String,
        params: Vec<String>,
        artifact: Artifact,
        installation: InstallationState,
    },
}

impl Default for UiState {
    fn default() -> Self {
        UiState::Loading {
            feature_id: None,
            installation: None,
        }
    }
}

impl UiState {
    /// `true` for states a load can end in.
    pub fn is_settled(&self) -> bool {
        matches!(self, UiState::Error { .. } | UiState::Success { .. })
    }
}

/// One-shot request for the rendering layer to show a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub feature_id: String,
    pub session: SessionInfo,
}

/// Snapshot of the active job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub job_id: u64,
    pub feature_id: String,
    pub raw_uri: String,
    pub params: Vec<String>,
}
