//! # Feature Loader Demo
//!
//! Loads the `plants` feature through a scripted installer:
//!
//! 1. Wire a [`LoaderSystem`] from the config (first CLI argument, optional).
//! 2. Register `plants` with one pre-install and one post-install interceptor.
//! 3. Submit `route/plants` and follow the UI state until it settles.

use feature_loader::config::LoaderConfig;
use feature_loader::installer::{SessionStatus, SessionUpdate};
use feature_loader::lifecycle::{setup_tracing, LoaderSystem};
use feature_loader::locator::Artifact;
use feature_loader::mock::{MockComponentLocator, MockModuleInstaller};
use feature_loader::orchestrator::UiState;
use feature_loader::registry::{FeatureConfig, Interceptor};
use std::sync::Arc;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => LoaderConfig::load(&path).map_err(|e| e.to_string())?,
        None => LoaderConfig::default(),
    };
    info!(?config, "Starting feature loader demo");

    let installer = Arc::new(MockModuleInstaller::new());
    installer.expect_install("plants").return_ok_with(
        1,
        vec![
            SessionUpdate::new(1, SessionStatus::Pending),
            SessionUpdate::new(1, SessionStatus::Downloading).with_progress(512, 2048),
            SessionUpdate::new(1, SessionStatus::Downloading).with_progress(2048, 2048),
            SessionUpdate::new(1, SessionStatus::Installing),
            SessionUpdate::new(1, SessionStatus::Installed),
        ],
    );

    let locator = Arc::new(MockComponentLocator::new());
    locator.provide(Artifact::new("plants", |params| format!("Plants screen {params:?}")));

    let system = LoaderSystem::with_state_file(&config, installer, locator);
    system
        .registry
        .register(
            FeatureConfig::new("plants")
                .with_interceptor(Interceptor::pre_install(|| true))
                .with_interceptor(Interceptor::post_install(|| true)),
        )
        .map_err(|e| e.to_string())?;

    let uri = format!("app://demo{}/route/plants?source=demo", config.path_prefix);
    let span = tracing::info_span!("demo_load");
    let final_state = async {
        info!(%uri, "Submitting identifier");
        system.client.process_uri(&uri).await.map_err(|e| e.to_string())?;

        let mut ui = system.client.ui_state();
        let settled = ui.wait_for(UiState::is_settled).await.map_err(|e| e.to_string())?;
        Ok::<UiState, String>(settled.clone())
    }
    .instrument(span)
    .await?;

    match final_state {
        UiState::Success { feature_id, params, artifact, installation } => {
            info!(%feature_id, ?installation, "Feature ready");
            info!(content = %artifact.produce(&params), "Rendered");
        }
        UiState::Error { message, kind, .. } => error!(%kind, %message, "Feature failed to load"),
        other => error!(?other, "Unexpected state"),
    }

    system.shutdown().await?;
    info!("Demo completed");
    Ok(())
}
