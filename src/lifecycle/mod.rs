//! # Loader Lifecycle
//!
//! Wiring and teardown for the loader's components.
//!
//! Components are built leaf-first and shared through `Arc`s:
//!
//! ```text
//! FeatureRegistry   StateStore (+ PreferenceWriter task)
//!        \            /      \
//!    InterceptorRunner     InstallationMonitor <- ModuleInstaller
//!               \            /
//!              ControllerActor <- ComponentLocator
//! ```
//!
//! [`LoaderSystem`] does this wiring, spawns the two long-lived tasks (the
//! controller and the preference writer) and shuts them down in order.
//! [`setup_tracing`] configures logging for binaries.

pub mod loader_system;
pub mod tracing;

pub use self::loader_system::*;
pub use self::tracing::*;
