//! The row store collaborator
//!
//! This module defines the [`Store`] trait: the narrow counted/paged query
//! and bulk write interface the streaming drivers run against. A store is
//! bound to one entity type (one table).

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::query::{CreateOptions, Filter, FindQuery, IsolationLevel, TxnId, UpdateOutcome};
use crate::record::{IntoRecord, Record};
use crate::schema::SchemaDescriptor;

/// Row store abstraction for one entity type
///
/// Every method is an asynchronous boundary; drivers never issue two calls
/// for the same stream concurrently.
///
/// Thread safety: implementations are shared across streams behind an
/// `Arc` and must be `Send + Sync`.
///
/// Transactions are optional. The default `begin` reports
/// [`StoreError::Unsupported`]; reads issued with `txn = Some(..)` must
/// observe the transaction's view.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store-specific row type, flattened into a [`Record`] before encoding
    type Row: IntoRecord + Send;

    /// Number of rows matching `filter`
    async fn count(&self, filter: &Filter, txn: Option<TxnId>) -> StoreResult<u64>;

    /// Rows matching the query, in query order
    async fn find(&self, query: &FindQuery, txn: Option<TxnId>) -> StoreResult<Vec<Self::Row>>;

    /// Insert rows, returning the inserted rows (with generated keys)
    async fn bulk_create(
        &self,
        records: Vec<Record>,
        options: &CreateOptions,
    ) -> StoreResult<Vec<Self::Row>>;

    /// Apply `fields` to every row matching `filter`
    async fn update(&self, fields: &Record, filter: &Filter) -> StoreResult<UpdateOutcome>;

    /// Delete every row matching `filter`, returning the affected count
    async fn destroy(&self, filter: &Filter) -> StoreResult<u64>;

    /// Field descriptors of the bound entity
    async fn describe_schema(&self) -> StoreResult<SchemaDescriptor>;

    /// Open a transaction
    async fn begin(&self, isolation: IsolationLevel) -> StoreResult<TxnId> {
        let _ = isolation;
        Err(StoreError::unsupported("begin transaction"))
    }

    /// Commit an open transaction
    async fn commit(&self, txn: TxnId) -> StoreResult<()> {
        Err(StoreError::unsupported(format!("commit {}", txn)))
    }

    /// Roll back an open transaction
    async fn rollback(&self, txn: TxnId) -> StoreResult<()> {
        Err(StoreError::unsupported(format!("rollback {}", txn)))
    }
}
