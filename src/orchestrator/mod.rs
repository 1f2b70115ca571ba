//! # Orchestration Controller
//!
//! Ties the resolver, registry, interceptors, state store and monitor together.
//!
//! ## Flow
//!
//! ```text
//! process_uri(raw)
//!   -> resolve             (invalid -> Error(URI_INVALID))
//!   -> dedup / cancel      (same raw identifier active -> ignored)
//!   -> pre-install checks  (fail -> Error(VALIDATION))
//!   -> installed?          (yes -> skip to post-install)
//!   -> monitor install     (progress -> Loading, user action -> RequiresConfirmation,
//!                           failure -> Error(INSTALLATION))
//!   -> post-install checks (fail -> Error(VALIDATION))
//!   -> locate artifact     (none -> Error(SETUP))
//!   -> Success
//! ```
//!
//! ## Key Types
//!
//! - [`ControllerActor`]: owns all job state; runs in its own task.
//! - [`ControllerClient`]: cloneable handle used by callers.
//! - [`UiState`]: what the rendering layer observes.

pub mod actor;
pub mod client;
pub mod error;
pub mod job;
pub mod message;
pub mod state;

pub use actor::ControllerActor;
pub use client::ControllerClient;
pub use error::LoaderError;
pub use job::ControllerDeps;
pub use message::{ControllerRequest, Response};
pub use state::{ConfirmationRequest, ErrorKind, JobInfo, UiState};
