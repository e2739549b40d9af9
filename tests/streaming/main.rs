//! Streaming integration tests
//!
//! End-to-end runs of every stream intent against the in-memory store:
//! - search: paging strategies, output modes, limits, idempotence
//! - mutation: chunked create, key-set scoped update / destroy
//! - lifecycle: cancellation, failures, transactions
//! - properties: batch partitioning over random sizes
//! - config: TOML registration

#[path = "../common/mod.rs"]
mod common;

mod config;
mod lifecycle;
mod mutation;
mod properties;
