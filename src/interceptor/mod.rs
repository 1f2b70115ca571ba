//! # Interceptor Runner
//!
//! Executes a feature's interceptors for one [`Phase`], strictly in order.
//! The first task that returns `false` (or panics) ends the phase; later tasks
//! never run. Tasks are blocking closures, so each one runs on Tokio's blocking
//! pool and never on the task that drives state transitions.

use crate::registry::{FeatureRegistry, Phase};
use crate::state::{InterceptorId, InterceptorRunState, StateStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct InterceptorRunner {
    registry: Arc<FeatureRegistry>,
    state: Arc<StateStore>,
}

impl InterceptorRunner {
    pub fn new(registry: Arc<FeatureRegistry>, state: Arc<StateStore>) -> Self {
        Self { registry, state }
    }

    /// Runs every interceptor of `phase`; `true` when all of them passed.
    ///
    /// An unregistered feature passes [`Phase::PreInstall`] (it may register once
    /// installed) and fails [`Phase::PostInstall`].
    #[instrument(skip(self))]
    pub async fn run(&self, feature_id: &str, phase: Phase) -> bool {
        let Some(config) = self.registry.get_by_route(feature_id) else {
            return match phase {
                Phase::PreInstall => {
                    debug!("No config registered, nothing to check");
                    true
                }
                Phase::PostInstall => {
                    warn!("No config registered, cannot complete setup");
                    false
                }
            };
        };

        for (index, interceptor) in config.interceptors_for(phase).enumerate() {
            let id = InterceptorId::new(&config.feature_id, phase, index);
            self.state.set_interceptor_state(&id, InterceptorRunState::Active);

            let task = interceptor.task.clone();
            let outcome = match tokio::task::spawn_blocking(move || task()).await {
                Ok(true) => InterceptorRunState::Completed,
                Ok(false) => InterceptorRunState::Failed("Interceptor returned false".to_string()),
                Err(e) => InterceptorRunState::Failed(format!("Interceptor faulted: {e}")),
            };

            let passed = outcome == InterceptorRunState::Completed;
            self.state.set_interceptor_state(&id, outcome);
            if !passed {
                warn!(interceptor = %id, "Interceptor failed, stopping phase");
                return false;
            }
        }

        info!("Phase passed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FeatureConfig, Interceptor};
    use crate::state::MemoryPreferences;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn runner() -> (InterceptorRunner, Arc<FeatureRegistry>, Arc<StateStore>) {
        let registry = Arc::new(FeatureRegistry::new());
        let (store, _writer) = StateStore::new(Arc::new(MemoryPreferences::new()));
        let store = Arc::new(store);
        (InterceptorRunner::new(registry.clone(), store.clone()), registry, store)
    }

    fn counted(counter: &Arc<AtomicUsize>, result: bool) -> Interceptor {
        let counter = counter.clone();
        Interceptor::pre_install(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    #[tokio::test]
    async fn test_all_pass() {
        let (runner, registry, store) = runner();
        let calls = Arc::new(AtomicUsize::new(0));
        registry
            .register(
                FeatureConfig::new("plants")
                    .with_interceptor(counted(&calls, true))
                    .with_interceptor(counted(&calls, true)),
            )
            .unwrap();

        assert!(runner.run("plants", Phase::PreInstall).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            store.get_interceptor_state(&InterceptorId::new("plants", Phase::PreInstall, 1)),
            InterceptorRunState::Completed
        );
    }

    #[tokio::test]
    async fn test_first_failure_stops_phase() {
        let (runner, registry, store) = runner();
        let first = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        registry
            .register(
                FeatureConfig::new("plants")
                    .with_interceptor(counted(&first, true))
                    .with_interceptor(counted(&failing, false))
                    .with_interceptor(counted(&after, true)),
            )
            .unwrap();

        assert!(!runner.run("plants", Phase::PreInstall).await);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(failing.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert!(matches!(
            store.get_interceptor_state(&InterceptorId::new("plants", Phase::PreInstall, 1)),
            InterceptorRunState::Failed(_)
        ));
        assert_eq!(
            store.get_interceptor_state(&InterceptorId::new("plants", Phase::PreInstall, 2)),
            InterceptorRunState::Inactive
        );
    }

    #[tokio::test]
    async fn test_panicking_task_counts_as_failure() {
        let (runner, registry, store) = runner();
        registry
            .register(FeatureConfig::new("plants").with_interceptor(Interceptor::post_install(|| panic!("broken check"))))
            .unwrap();

        assert!(!runner.run("plants", Phase::PostInstall).await);
        assert!(matches!(
            store.get_interceptor_state(&InterceptorId::new("plants", Phase::PostInstall, 0)),
            InterceptorRunState::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_phases_are_independent() {
        let (runner, registry, _store) = runner();
        registry
            .register(
                FeatureConfig::new("plants")
                    .with_interceptor(Interceptor::pre_install(|| true))
                    .with_interceptor(Interceptor::post_install(|| false)),
            )
            .unwrap();

        assert!(runner.run("plants", Phase::PreInstall).await);
        assert!(!runner.run("plants", Phase::PostInstall).await);
    }

    #[tokio::test]
    async fn test_missing_config() {
        let (runner, _registry, _store) = runner();
        assert!(runner.run("ghost", Phase::PreInstall).await);
        assert!(!runner.run("ghost", Phase::PostInstall).await);
    }
}
