//! # Feature Loader
//!
//! > **On-demand installation of optional feature modules, addressed by URI.**
//!
//! An application hands the loader a routable identifier such as
//! `app://host/chase/df/route/plants`. The loader resolves it to a feature,
//! runs the feature's pre-install checks, installs the module if it is missing,
//! runs post-install setup and finally exposes the feature's UI artifact. Every
//! step is observable, cancellable, and survives partial failure.
//!
//! ## 🏗️ Design
//!
//! ### One sequencing context
//! All decisions are made by a single actor, the [`ControllerActor`](orchestrator::ControllerActor).
//! It processes client requests and job events one at a time, so the rule "at most
//! one active job" needs no locks: a new request cancels the previous job before
//! the next one is spawned, and late events from cancelled jobs are dropped.
//!
//! ### Blocking work stays off that context
//! Interceptor tasks run on Tokio's blocking pool, and installer calls happen in
//! job and tracker tasks. The controller never waits on them directly.
//!
//! ### Push, not poll
//! Installation and interceptor state live in [`state::StateStore`] behind
//! per-key `watch` channels (replay-latest). The controller's own state is a
//! `watch` of [`UiState`](orchestrator::UiState); confirmation prompts are a
//! separate single-consumer queue so a stale prompt is never replayed.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. Addressing ([`route`], [`registry`])
//! - [`RouteResolver`](route::RouteResolver) parses identifiers and never fails hard.
//! - [`FeatureRegistry`](registry::FeatureRegistry) maps feature ids to their interceptors.
//!
//! ### 2. State ([`state`], [`interceptor`], [`monitor`])
//! - [`StateStore`](state::StateStore): observable state plus the durable last-attempted record.
//! - [`InterceptorRunner`](interceptor::InterceptorRunner): ordered, first-failure-wins checks.
//! - [`InstallationMonitor`](monitor::InstallationMonitor): installer sessions to domain events.
//!
//! ### 3. Orchestration ([`orchestrator`], [`lifecycle`])
//! - [`ControllerActor`](orchestrator::ControllerActor) / [`ControllerClient`](orchestrator::ControllerClient).
//! - [`LoaderSystem`](lifecycle::LoaderSystem) wires everything and shuts it down.
//!
//! ### 4. Boundaries ([`installer`], [`locator`], [`mock`])
//! - Traits for the module installer and component locator, and scriptable mocks.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo with info logs
//! RUST_LOG=info cargo run
//!
//! # With a config file
//! RUST_LOG=debug cargo run -- loader.yaml
//! ```

pub mod config;
pub mod installer;
pub mod interceptor;
pub mod lifecycle;
pub mod locator;
pub mod mock;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod route;
pub mod state;
