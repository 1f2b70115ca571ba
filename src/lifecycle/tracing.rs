//! # Observability & Tracing
//!
//! The loader logs through `tracing` with structured fields. Nothing here is
//! required by the library; binaries call [`setup_tracing`] once at startup.
//!
//! ## What Gets Traced
//!
//! - **Controller lifecycle**: startup, shutdown, job start/cancel/finish
//! - **Jobs**: every job runs inside a `job{job_id, feature_id}` span
//! - **Install sessions**: each tracker runs inside a `track{feature_id}` span
//! - **Degraded paths**: failed durable writes, dropped confirmation prompts,
//!   lagging session streams (all `WARN`)
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run            # job lifecycle only
//! RUST_LOG=debug cargo run           # every state transition
//! RUST_LOG=feature_loader::monitor=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` a fresh install reads roughly:
//!
//! ```text
//! INFO Loading feature job_id=1 feature_id=plants params=[]
//! INFO job:run: Job started
//! INFO job:track: Install requested session_id=7
//! INFO job: Phase passed
//! INFO Load succeeded feature_id=plants
//! ```

/// Initializes the tracing subscriber, filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
