//! Storage layer for rowstream
//!
//! This crate implements the reference row store:
//! - MemoryStore: BTreeMap-backed `Store` with auto-increment keys,
//!   filter evaluation, ordering, projection and snapshot transactions
//! - CallLog: ordered record of every store call, with fault injection
//!
//! Production deployments bind the engine to their own `Store`; the memory
//! store backs embedded use and the test suites.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calls;
pub mod memory;

pub use calls::{CallKind, CallLog, StoreCall};
pub use memory::{MemoryStore, StoredRow};
