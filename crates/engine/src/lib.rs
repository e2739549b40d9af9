//! Streaming engine for rowstream
//!
//! This crate turns a [`Store`](rowstream_core::Store) into backpressured
//! streams of batches:
//! - Channel: cancelable bounded output channel (writer / consumer halves)
//! - Planner: offset vs keyset paging and lazy page windows
//! - Fetch: the search driver, optionally inside one serializable transaction
//! - Mutation: chunked bulk create and key-set scoped update / destroy
//! - Encoding: native records, JSON fragments, or one concatenated JSON array
//! - Engine / Registry: per-entity entry points and their default configs
//!
//! Every stream runs as one tokio task issuing store calls serially, in
//! window order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod context;
pub mod encoding;
pub mod engine;
pub mod fetch;
pub mod metrics;
pub mod mutation;
pub mod planner;
pub mod registry;
pub mod request;

pub use channel::{channel, CancelHandle, ChannelState, ChannelWriter, RecordStream, StreamEvent};
pub use context::{DriverContext, Flow};
pub use encoding::{BatchEncoder, Chunk, MutationReport, OutputMode};
pub use engine::StreamEngine;
pub use metrics::{Completion, MetricsSnapshot, StreamMetrics};
pub use mutation::MutationKind;
pub use planner::{
    select_strategy, KeysetCursor, OffsetPlan, PagePlan, PageWindow, PagingStrategy,
};
pub use registry::EntityRegistry;
pub use request::{Intent, Settings, StreamRequest};
