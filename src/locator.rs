//! # Component Locator Interface
//!
//! Finds the UI entry point a freshly installed feature exports. How entry
//! points are discovered (static tables, plugin manifests...) is up to the
//! implementation.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

type EntryPoint = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

/// A feature's UI-producing unit.
///
/// Cheap to clone. Two artifacts are equal when they share the same entry point.
#[derive(Clone)]
pub struct Artifact {
    feature_id: String,
    entry: EntryPoint,
}

impl Artifact {
    pub fn new(feature_id: impl Into<String>, entry: impl Fn(&[String]) -> String + Send + Sync + 'static) -> Self {
        Self {
            feature_id: feature_id.into(),
            entry: Arc::new(entry),
        }
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    /// Produces the feature's content for the given route params.
    pub fn produce(&self, params: &[String]) -> String {
        (self.entry)(params)
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.feature_id == other.feature_id && Arc::ptr_eq(&self.entry, &other.entry)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact").field("feature_id", &self.feature_id).finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ComponentLocator: Send + Sync {
    /// Called only once the feature is installed and its post-install checks passed.
    async fn locate(&self, feature_id: &str, params: &[String]) -> Option<Artifact>;
}
