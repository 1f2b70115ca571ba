use crate::config::LoaderConfig;
use crate::installer::ModuleInstaller;
use crate::interceptor::InterceptorRunner;
use crate::locator::ComponentLocator;
use crate::monitor::InstallationMonitor;
use crate::orchestrator::{ConfirmationRequest, ControllerActor, ControllerClient, ControllerDeps};
use crate::registry::FeatureRegistry;
use crate::route::RouteResolver;
use crate::state::{FilePreferences, Preferences, StateStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The wired-up loader: registry, state store, monitor and controller.
///
/// # Example
///
/// ```ignore
/// let mut system = LoaderSystem::new(&config, installer, locator, preferences);
/// system.registry.register(FeatureConfig::new("plants"))?;
///
/// system.client.process_uri("app://host/chase/df/route/plants").await?;
/// let mut ui = system.client.ui_state();
/// ui.wait_for(UiState::is_settled).await?;
///
/// system.shutdown().await?;
/// ```
pub struct LoaderSystem {
    /// Client for the controller actor.
    pub client: ControllerClient,

    /// Shared registry; modules may register at any time.
    pub registry: Arc<FeatureRegistry>,

    pub state: Arc<StateStore>,

    /// One-shot confirmation prompts for the rendering layer (single consumer).
    pub confirmations: mpsc::Receiver<ConfirmationRequest>,

    controller_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl LoaderSystem {
    /// Creates every component and spawns the controller and preference writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &LoaderConfig,
        installer: Arc<dyn ModuleInstaller>,
        locator: Arc<dyn ComponentLocator>,
        preferences: Arc<dyn Preferences>,
    ) -> Self {
        // 1. Leaf components
        let registry = Arc::new(FeatureRegistry::new());
        let (state, writer) = StateStore::new(preferences);
        let state = Arc::new(state);

        // 2. Components that share the registry and store
        let runner = Arc::new(InterceptorRunner::new(registry.clone(), state.clone()));
        let monitor = Arc::new(InstallationMonitor::new(installer, state.clone(), config.monitor_buffer));

        // 3. The controller on top
        let deps = ControllerDeps {
            registry: registry.clone(),
            state: state.clone(),
            runner,
            monitor,
            locator,
        };
        let (controller, client, confirmations) = ControllerActor::new(
            config.command_buffer,
            config.confirmation_buffer,
            RouteResolver::new(&config.path_prefix),
            deps,
        );

        let writer_handle = tokio::spawn(writer.run());
        let controller_handle = tokio::spawn(controller.run());
        info!(prefix = %config.path_prefix, "Loader system started");

        Self {
            client,
            registry,
            state,
            confirmations,
            controller_handle,
            writer_handle,
        }
    }

    /// Same as [`LoaderSystem::new`] with durable state in `config.state_file`.
    pub fn with_state_file(
        config: &LoaderConfig,
        installer: Arc<dyn ModuleInstaller>,
        locator: Arc<dyn ComponentLocator>,
    ) -> Self {
        let preferences = Arc::new(FilePreferences::new(config.state_file.clone()));
        Self::new(config, installer, locator, preferences)
    }

    /// Gracefully shuts down the loader.
    ///
    /// 1. Drops this system's client; the controller stops once every other
    ///    clone is gone too, cancelling its active job.
    /// 2. Flushes queued durable writes and stops the writer.
    ///
    /// Returns an error if the controller task panicked.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down loader...");

        drop(self.client);
        if let Err(e) = self.controller_handle.await {
            error!("Controller task failed: {:?}", e);
            return Err(format!("Controller task failed: {:?}", e));
        }

        self.state.flush().await;
        self.writer_handle.abort();

        info!("Loader shutdown complete.");
        Ok(())
    }
}
