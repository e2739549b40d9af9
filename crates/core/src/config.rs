//! Stream configuration
//!
//! [`StreamConfig`] is the per-entity default configuration handed to a
//! stream engine. [`RegistryConfig`] is its TOML form: a `[defaults]` table
//! plus optional `[entities.<name>]` overrides.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// Batch size used when none is configured or a non-positive one is given
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of chunks buffered between a driver and its consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Default streaming configuration for one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Rows fetched or mutated per store call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Emit native records instead of JSON text
    #[serde(default)]
    pub object_mode: bool,
    /// In text mode, concatenate every batch into one JSON array
    #[serde(default)]
    pub single_array: bool,
    /// Chunks buffered before the driver waits for the consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            object_mode: false,
            single_array: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl StreamConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size; zero falls back to [`DEFAULT_BATCH_SIZE`]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = effective_batch_size(batch_size);
        self
    }

    /// Emit native records
    pub fn with_object_mode(mut self, object_mode: bool) -> Self {
        self.object_mode = object_mode;
        self
    }

    /// Concatenate text batches into one array
    pub fn with_single_array(mut self, single_array: bool) -> Self {
        self.single_array = single_array;
        self
    }

    /// Set the channel buffer size
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> StreamResult<()> {
        if self.channel_capacity == 0 {
            return Err(StreamError::config("channel_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Clamp a requested batch size to a positive value
pub fn effective_batch_size(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        requested
    }
}

/// Per-entity overrides; unset fields inherit from `[defaults]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOverrides {
    /// Batch size override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Object mode override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_mode: Option<bool>,
    /// Single-array override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_array: Option<bool>,
    /// Channel capacity override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

impl EntityOverrides {
    /// Apply the overrides on top of `base`
    pub fn apply(&self, base: &StreamConfig) -> StreamConfig {
        StreamConfig {
            batch_size: self
                .batch_size
                .map(effective_batch_size)
                .unwrap_or(base.batch_size),
            object_mode: self.object_mode.unwrap_or(base.object_mode),
            single_array: self.single_array.unwrap_or(base.single_array),
            channel_capacity: self.channel_capacity.unwrap_or(base.channel_capacity),
        }
    }
}

/// Registration config loaded from TOML.
///
/// # Example
///
/// ```toml
/// [defaults]
/// batch_size = 100
/// single_array = true
///
/// [entities.user]
/// batch_size = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Defaults shared by every entity
    #[serde(default)]
    pub defaults: StreamConfig,
    /// Per-entity overrides keyed by entity name
    #[serde(default)]
    pub entities: BTreeMap<String, EntityOverrides>,
}

impl RegistryConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# rowstream configuration
#
# Defaults applied to every registered entity.
[defaults]
# Rows per store call (0 falls back to 100)
batch_size = 100
# Emit native records instead of JSON text
object_mode = false
# In text mode, emit one JSON array across all batches
single_array = false
# Chunks buffered ahead of a slow consumer
channel_capacity = 16

# Per-entity overrides.
# [entities.user]
# batch_size = 500
"#
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> StreamResult<Self> {
        let mut config: RegistryConfig = toml::from_str(content)
            .map_err(|e| StreamError::config(format!("Failed to parse config: {}", e)))?;
        config.defaults.batch_size = effective_batch_size(config.defaults.batch_size);
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> StreamResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StreamResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StreamError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StreamError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Effective config for one entity
    pub fn resolve(&self, entity: &str) -> StreamConfig {
        match self.entities.get(entity) {
            Some(overrides) => overrides.apply(&self.defaults),
            None => self.defaults.clone(),
        }
    }

    fn validate(&self) -> StreamResult<()> {
        self.defaults.validate()?;
        for (name, overrides) in &self.entities {
            overrides.apply(&self.defaults).validate().map_err(|e| {
                StreamError::config(format!("entity '{}': {}", name, e))
            })?;
        }
        Ok(())
    }
}
