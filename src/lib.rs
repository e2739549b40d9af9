//! rowstream - batch streaming for large result sets and bulk mutations
//!
//! Given a row store that can count, page and bulk-write, rowstream produces
//! backpressured streams of batches without materializing the full result
//! set: paged reads (search) and chunked bulk create / update / destroy.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use rowstream::{EntityRegistry, MemoryStore, StreamRequest};
//!
//! let registry = EntityRegistry::init([("user", None)], Some(500));
//! let users = registry.engine("user", Arc::new(store))?;
//!
//! // One JSON array, fetched 500 rows at a time
//! let json = users.search(StreamRequest::new().single_array(true)).collect_text().await?;
//! ```
//!
//! # Architecture
//!
//! - `rowstream-core`: records, queries, schema descriptors, the `Store`
//!   trait, errors and configuration
//! - `rowstream-storage`: in-memory `Store` with snapshot transactions
//! - `rowstream-engine`: output channel, paging planner, drivers, engines

#![warn(missing_docs)]

pub mod logging;

pub use rowstream_core::*;
pub use rowstream_engine::*;
pub use rowstream_storage::{CallKind, MemoryStore, StoreCall, StoredRow};
