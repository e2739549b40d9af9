//! Entity registry
//!
//! Maps entity names to their default [`StreamConfig`]. Registration happens
//! once at startup; afterwards the registry is read-only and engines look
//! their configuration up explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use rowstream_core::{
    effective_batch_size, RegistryConfig, Store, StreamConfig, StreamError, StreamResult,
    DEFAULT_BATCH_SIZE,
};

use crate::engine::StreamEngine;
use crate::metrics::StreamMetrics;

/// Entity name → default stream configuration
#[derive(Debug, Default)]
pub struct EntityRegistry {
    defaults: StreamConfig,
    entities: BTreeMap<String, StreamConfig>,
    metrics: Arc<StreamMetrics>,
}

impl EntityRegistry {
    /// Empty registry whose entities start from `defaults`
    pub fn new(defaults: StreamConfig) -> Self {
        Self {
            defaults,
            entities: BTreeMap::new(),
            metrics: Arc::new(StreamMetrics::new()),
        }
    }

    /// Register entities in one step.
    ///
    /// Each entry carries the entity's own batch size, if it declares one.
    /// An explicit `default_batch_size` is applied to every entity;
    /// otherwise an entity keeps its own size, falling back to
    /// [`DEFAULT_BATCH_SIZE`].
    pub fn init<I, N>(entities: I, default_batch_size: Option<usize>) -> Self
    where
        I: IntoIterator<Item = (N, Option<usize>)>,
        N: Into<String>,
    {
        let mut registry = Self::new(StreamConfig::default());
        for (name, own) in entities {
            let batch_size = match (default_batch_size, own) {
                (Some(default), _) => effective_batch_size(default),
                (None, Some(own)) => effective_batch_size(own),
                (None, None) => DEFAULT_BATCH_SIZE,
            };
            let config = registry.defaults.clone().with_batch_size(batch_size);
            registry.register(name, config);
        }
        registry
    }

    /// Build a registry from parsed TOML config for the named entities
    pub fn from_config<I, N>(config: &RegistryConfig, entities: I) -> StreamResult<Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut registry = Self::new(config.defaults.clone());
        for name in entities {
            let name = name.into();
            let resolved = config.resolve(&name);
            resolved
                .validate()
                .map_err(|e| StreamError::config(format!("entity '{}': {}", name, e)))?;
            registry.register(name, resolved);
        }
        Ok(registry)
    }

    /// Register or replace one entity's config
    pub fn register(&mut self, entity: impl Into<String>, config: StreamConfig) {
        let entity = entity.into();
        debug!(
            target: "rowstream::stream",
            entity = %entity,
            batch_size = config.batch_size,
            object_mode = config.object_mode,
            single_array = config.single_array,
            "Entity registered"
        );
        self.entities.insert(entity, config);
    }

    /// Config of a registered entity
    pub fn config_for(&self, entity: &str) -> StreamResult<&StreamConfig> {
        self.entities
            .get(entity)
            .ok_or_else(|| StreamError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// Registered entity names, sorted
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Metrics shared by every engine this registry creates
    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    /// Engine for a registered entity bound to `store`
    pub fn engine<S: Store + 'static>(
        &self,
        entity: &str,
        store: Arc<S>,
    ) -> StreamResult<StreamEngine<S>> {
        let config = self.config_for(entity)?.clone();
        Ok(StreamEngine::new(entity, store, config).with_metrics(Arc::clone(&self.metrics)))
    }
}
