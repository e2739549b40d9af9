//! Core types and traits for rowstream
//!
//! This crate defines the foundational types used throughout the system:
//! - Record: plain field mapping produced by every store row
//! - Filter / FindQuery / OrderBy: the paged query model
//! - SchemaDescriptor / PrimaryKey: typed schema capability
//! - Store: the row store collaborator trait
//! - StreamConfig / RegistryConfig: per-entity configuration
//! - Error: StoreError and StreamError

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod schema;
pub mod traits;

pub use config::{
    effective_batch_size, EntityOverrides, RegistryConfig, StreamConfig, DEFAULT_BATCH_SIZE,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use error::{StoreError, StoreResult, StreamError, StreamResult};
pub use query::{
    compare_by, Condition, CreateOptions, Direction, Filter, FindQuery, IsolationLevel, Op,
    OrderBy, TxnId, UpdateOutcome,
};
pub use record::{compare_values, record, IntoRecord, Record};
pub use schema::{FieldDescriptor, PrimaryKey, SchemaDescriptor};
pub use traits::Store;

// Store implementors need the same macro the trait is declared with
pub use async_trait::async_trait;
