//! # Feature Registry
//!
//! Maps feature ids to their [`FeatureConfig`]. Modules may register from any
//! thread (typically right after they are installed) while the controller reads
//! concurrently, so both maps are sharded [`DashMap`]s: reads take no global
//! lock and writes only serialize per shard.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by [`FeatureRegistry::register`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Invalid feature config: {0}")]
    InvalidConfig(String),
}

/// When an interceptor runs relative to installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreInstall,
    PostInstall,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreInstall => write!(f, "pre-install"),
            Phase::PostInstall => write!(f, "post-install"),
        }
    }
}

/// Blocking check or side effect gating a phase. Returns `false` to stop it.
pub type InterceptorTask = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Interceptor {
    pub phase: Phase,
    pub task: InterceptorTask,
}

impl Interceptor {
    pub fn new(phase: Phase, task: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            phase,
            task: Arc::new(task),
        }
    }

    pub fn pre_install(task: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::new(Phase::PreInstall, task)
    }

    pub fn post_install(task: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::new(Phase::PostInstall, task)
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor").field("phase", &self.phase).finish_non_exhaustive()
    }
}

/// Registration record for one feature.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub feature_id: String,
    /// Optional alias under which routes may address the feature.
    pub route_name: Option<String>,
    pub interceptors: Vec<Interceptor>,
}

impl FeatureConfig {
    pub fn new(feature_id: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            route_name: None,
            interceptors: Vec::new(),
        }
    }

    pub fn with_route_name(mut self, route_name: impl Into<String>) -> Self {
        self.route_name = Some(route_name.into());
        self
    }

    pub fn with_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Interceptors of one phase, in registration order.
    pub fn interceptors_for(&self, phase: Phase) -> impl Iterator<Item = &Interceptor> {
        self.interceptors.iter().filter(move |i| i.phase == phase)
    }
}

#[derive(Default)]
pub struct FeatureRegistry {
    features: DashMap<String, Arc<FeatureConfig>>,
    routes: DashMap<String, String>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers are used as keys in interceptor state ids (`feature:phase:index`),
    /// so they must be non-blank and free of whitespace and `:`.
    pub fn is_valid(config: &FeatureConfig) -> bool {
        let valid_name = |name: &str| {
            !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c == ':')
        };
        valid_name(&config.feature_id) && config.route_name.as_deref().map_or(true, valid_name)
    }

    /// Registers a config; a later registration for the same id replaces it.
    pub fn register(&self, config: FeatureConfig) -> Result<(), RegistryError> {
        if !Self::is_valid(&config) {
            warn!(feature_id = %config.feature_id, "Rejected invalid config");
            return Err(RegistryError::InvalidConfig(config.feature_id));
        }

        let feature_id = config.feature_id.clone();
        let alias = config.route_name.clone();
        if let Some(route_name) = &alias {
            self.routes.insert(route_name.clone(), feature_id.clone());
        }

        let previous = self.features.insert(feature_id.clone(), Arc::new(config));
        let replaced = previous.is_some();
        if let Some(stale) = previous.and_then(|p| p.route_name.clone()) {
            if alias.as_deref() != Some(stale.as_str()) {
                self.routes.remove_if(&stale, |_, owner| *owner == feature_id);
            }
        }
        info!(%feature_id, replaced, size = self.features.len(), "Registered");
        Ok(())
    }

    pub fn unregister(&self, feature_id: &str) -> bool {
        match self.features.remove(feature_id) {
            Some((_, config)) => {
                if let Some(route_name) = &config.route_name {
                    self.routes.remove_if(route_name, |_, owner| owner == feature_id);
                }
                info!(feature_id, size = self.features.len(), "Unregistered");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, feature_id: &str) -> Option<Arc<FeatureConfig>> {
        let config = self.features.get(feature_id).map(|entry| entry.value().clone());
        debug!(feature_id, found = config.is_some(), "Get");
        config
    }

    /// Looks up by route alias first, then by feature id.
    pub fn get_by_route(&self, route_name: &str) -> Option<Arc<FeatureConfig>> {
        let aliased = self.routes.get(route_name).map(|entry| entry.value().clone());
        match aliased {
            Some(feature_id) => self.get(&feature_id).or_else(|| self.get(route_name)),
            None => self.get(route_name),
        }
    }

    pub fn feature_ids(&self) -> Vec<String> {
        self.features.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_and_get() {
        let registry = FeatureRegistry::new();
        registry
            .register(FeatureConfig::new("plants").with_interceptor(Interceptor::pre_install(|| true)))
            .unwrap();

        let config = registry.get("plants").unwrap();
        assert_eq!(config.interceptors.len(), 1);
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = FeatureRegistry::new();
        registry.register(FeatureConfig::new("plants")).unwrap();
        registry
            .register(
                FeatureConfig::new("plants")
                    .with_interceptor(Interceptor::pre_install(|| true))
                    .with_interceptor(Interceptor::post_install(|| true)),
            )
            .unwrap();

        assert_eq!(registry.get("plants").unwrap().interceptors.len(), 2);
        assert_eq!(registry.feature_ids(), vec!["plants".to_string()]);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let registry = FeatureRegistry::new();
        for id in ["", "has space", "a:b"] {
            let result = registry.register(FeatureConfig::new(id));
            assert_eq!(result, Err(RegistryError::InvalidConfig(id.to_string())));
        }
        assert!(!FeatureRegistry::is_valid(&FeatureConfig::new("ok").with_route_name("bad route")));
        assert!(registry.feature_ids().is_empty());
    }

    #[test]
    fn test_get_by_route_prefers_alias() {
        let registry = FeatureRegistry::new();
        registry.register(FeatureConfig::new("garden").with_route_name("plants")).unwrap();

        assert_eq!(registry.get_by_route("plants").unwrap().feature_id, "garden");
        assert_eq!(registry.get_by_route("garden").unwrap().feature_id, "garden");
        assert!(registry.get_by_route("ghost").is_none());
    }

    #[test]
    fn test_unregister() {
        let registry = FeatureRegistry::new();
        registry.register(FeatureConfig::new("garden").with_route_name("plants")).unwrap();

        assert!(registry.unregister("garden"));
        assert!(!registry.unregister("garden"));
        assert!(registry.get_by_route("plants").is_none());
    }

    #[test]
    fn test_interceptors_for_keeps_order_within_phase() {
        let config = FeatureConfig::new("plants")
            .with_interceptor(Interceptor::pre_install(|| true))
            .with_interceptor(Interceptor::post_install(|| false))
            .with_interceptor(Interceptor::pre_install(|| false));

        let pre: Vec<bool> = config.interceptors_for(Phase::PreInstall).map(|i| (i.task)()).collect();
        assert_eq!(pre, vec![true, false]);
        assert_eq!(config.interceptors_for(Phase::PostInstall).count(), 1);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(FeatureRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.register(FeatureConfig::new(format!("feature_{i}"))).unwrap();
                    registry.get(&format!("feature_{i}")).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.feature_ids().len(), 8);
    }
}
