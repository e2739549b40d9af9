//! Stream requests
//!
//! A [`StreamRequest`] carries the per-call parameters of one stream. Any
//! field left unset falls back to the entity's [`StreamConfig`].

use std::fmt;

use serde::{Deserialize, Serialize};

use rowstream_core::{effective_batch_size, Filter, OrderBy, StreamConfig};

use crate::encoding::OutputMode;

/// What a stream does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Paged read
    Search,
    /// Chunked insert
    BulkCreate,
    /// Key-set scoped update
    Update,
    /// Key-set scoped delete
    Destroy,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Search => "search",
            Intent::BulkCreate => "bulk_create",
            Intent::Update => "update",
            Intent::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Parameters of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Rows per store call; `0` falls back to the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// End position of the stream (exclusive), in place of the counted total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Rows to skip before the first batch
    #[serde(default)]
    pub offset: u64,
    /// Row predicate
    #[serde(default)]
    pub filter: Filter,
    /// Explicit ordering for reads
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<OrderBy>,
    /// Override the entity's object mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_mode: Option<bool>,
    /// Override the entity's single-array mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_array: Option<bool>,
    /// Run a search inside one serializable transaction
    #[serde(default)]
    pub transactional: bool,
}

impl StreamRequest {
    /// Request with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Cap the number of rows
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip rows before the first batch
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the row predicate
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the read ordering
    pub fn order(mut self, order: Vec<OrderBy>) -> Self {
        self.order = order;
        self
    }

    /// Emit native records
    pub fn object_mode(mut self, object_mode: bool) -> Self {
        self.object_mode = Some(object_mode);
        self
    }

    /// Emit one JSON array across all batches
    pub fn single_array(mut self, single_array: bool) -> Self {
        self.single_array = Some(single_array);
        self
    }

    /// Wrap a search in a serializable transaction
    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// Merge with the entity defaults
    pub fn resolve(&self, config: &StreamConfig) -> Settings {
        let batch_size = self
            .batch_size
            .map(effective_batch_size)
            .unwrap_or_else(|| effective_batch_size(config.batch_size));
        let mode = OutputMode::from_flags(
            self.object_mode.unwrap_or(config.object_mode),
            self.single_array.unwrap_or(config.single_array),
        );
        Settings { batch_size, mode }
    }
}

/// Effective per-stream settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Rows per store call, always positive
    pub batch_size: usize,
    /// Output mode
    pub mode: OutputMode,
}
