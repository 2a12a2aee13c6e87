//! Builder for [`Huginn`] instances.

use std::sync::Arc;

use tracing::warn;

use super::Huginn;
use crate::analyzer::{Analyzer, AnalyzerRegistry};
use crate::batch::BatchCoordinator;
use crate::cache::CacheManager;
use crate::config::Config;
use crate::{HuginnError, Result};

/// Builder for configuring a [`Huginn`] service.
#[derive(Default)]
pub struct HuginnBuilder {
    config: Option<Config>,
    registry: AnalyzerRegistry,
    cache_manager: Option<Arc<CacheManager>>,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of [`Config::default()`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Register an analyzer under its own name.
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.registry.register(analyzer);
        self
    }

    /// Replace the whole registry.
    pub fn registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share an existing cache manager instead of building one from config.
    pub fn cache_manager(mut self, manager: Arc<CacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    /// Build the service.
    ///
    /// Fails when no analyzer is registered. Suspicious configuration and
    /// default frameworks with no analyzer are logged, not rejected.
    pub fn build(self) -> Result<Huginn> {
        if self.registry.is_empty() {
            return Err(HuginnError::Configuration(
                "at least one analyzer must be registered".to_string(),
            ));
        }

        let config = self.config.unwrap_or_default();
        for warning in config.warnings() {
            warn!(%warning, "configuration");
        }
        for framework in &config.batch.default_frameworks {
            if !self.registry.contains(framework) {
                warn!(%framework, "default framework has no registered analyzer");
            }
        }

        let caches = self
            .cache_manager
            .unwrap_or_else(|| Arc::new(CacheManager::new(config.cache.clone())));
        let coordinator = BatchCoordinator::new(
            config.batch.clone(),
            Arc::new(self.registry),
            Arc::clone(&caches),
        );

        Ok(Huginn {
            config,
            caches,
            coordinator,
        })
    }
}
