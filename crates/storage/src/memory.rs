//! MemoryStore: in-memory row store for one entity type
//!
//! This module implements the `Store` trait using:
//! - `BTreeMap<u64, Record>` keyed by an internal row id (insertion order)
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` counters for row ids, auto-increment keys and transactions
//! - Cloned snapshots for transactional reads
//!
//! # Design Notes
//!
//! - **Insertion order**: unordered reads return rows in insertion order
//! - **Auto-increment**: when the schema declares a single auto-increment
//!   key, missing keys are assigned from a monotonically increasing counter
//! - **Snapshot transactions**: `begin` clones the table; reads carrying the
//!   transaction id see that clone until commit or rollback. Writes are not
//!   transactional.
//! - **Call log**: every call is recorded before it runs; armed faults make
//!   chosen calls fail

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use rowstream_core::{
    compare_by, compare_values, CreateOptions, Filter, FindQuery, IntoRecord, IsolationLevel,
    PrimaryKey, Record, SchemaDescriptor, Store, StoreError, StoreResult, TxnId, UpdateOutcome,
};

use crate::calls::{CallKind, CallLog, StoreCall};

/// A stored row: the user-visible fields plus storage metadata
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Internal row id (insertion order)
    pub rowid: u64,
    /// Number of writes applied to this row
    pub revision: u64,
    /// Field values
    pub fields: Record,
}

impl IntoRecord for StoredRow {
    fn into_record(self) -> Record {
        self.fields
    }
}

type Table = BTreeMap<u64, StoredRow>;

/// In-memory row store
///
/// Cloning the handle is cheap; clones share the same table.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    schema: SchemaDescriptor,
    /// Main data: row id → row
    rows: RwLock<Table>,
    /// Open transactions: id → snapshot of the table at `begin`
    snapshots: Mutex<HashMap<TxnId, Table>>,
    next_rowid: AtomicU64,
    next_key: AtomicU64,
    next_txn: AtomicU64,
    latency: Mutex<Option<Duration>>,
    log: CallLog,
}

impl MemoryStore {
    /// Create an empty store with the given schema
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self {
            inner: Arc::new(Inner {
                schema,
                rows: RwLock::new(BTreeMap::new()),
                snapshots: Mutex::new(HashMap::new()),
                next_rowid: AtomicU64::new(1),
                next_key: AtomicU64::new(1),
                next_txn: AtomicU64::new(1),
                latency: Mutex::new(None),
                log: CallLog::new(),
            }),
        }
    }

    /// Sleep this long inside every call
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock() = latency;
    }

    /// Make the `nth` (1-based) call of `kind` fail with `error`
    pub fn fail_on(&self, kind: CallKind, nth: usize, error: StoreError) {
        self.inner.log.arm(kind, nth, error);
    }

    /// All calls so far, in issue order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.log.calls()
    }

    /// Number of calls of one kind
    pub fn count_calls(&self, kind: CallKind) -> usize {
        self.inner.log.count(kind)
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.inner.log.clear();
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.inner.rows.read().len()
    }

    /// True if the store holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open transactions
    pub fn open_transactions(&self) -> usize {
        self.inner.snapshots.lock().len()
    }

    /// All rows in insertion order, bypassing the call log
    pub fn rows(&self) -> Vec<Record> {
        self.inner
            .rows
            .read()
            .values()
            .map(|r| r.fields.clone())
            .collect()
    }

    /// Insert rows without recording a call (test fixtures, concurrent writers)
    pub fn seed(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.insert(records, &CreateOptions::default())
            .map(|rows| rows.into_iter().map(|r| r.fields).collect())
    }

    /// Delete rows matching `filter` without recording a call
    pub fn remove_where(&self, filter: &Filter) -> u64 {
        let mut rows = self.inner.rows.write();
        let before = rows.len();
        rows.retain(|_, row| !filter.matches(&row.fields));
        (before - rows.len()) as u64
    }

    async fn enter(&self, call: StoreCall) -> StoreResult<()> {
        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.inner.log.record(call)
    }

    fn read_view<R>(&self, txn: Option<TxnId>, f: impl FnOnce(&Table) -> R) -> StoreResult<R> {
        match txn {
            Some(id) => {
                let snapshots = self.inner.snapshots.lock();
                let table = snapshots.get(&id).ok_or_else(|| StoreError::NotFound {
                    what: format!("transaction {}", id),
                })?;
                Ok(f(table))
            }
            None => Ok(f(&self.inner.rows.read())),
        }
    }

    fn insert(&self, records: Vec<Record>, options: &CreateOptions) -> StoreResult<Vec<StoredRow>> {
        let pk = self.inner.schema.primary_key();
        let mut rows = self.inner.rows.write();
        let mut inserted = Vec::with_capacity(records.len());

        for mut fields in records {
            match &pk {
                PrimaryKey::Single {
                    name,
                    auto_increment: true,
                } => match fields.get(name).and_then(Value::as_u64) {
                    Some(explicit) => {
                        self.inner.next_key.fetch_max(explicit.saturating_add(1), Ordering::SeqCst);
                    }
                    None => {
                        let key = self.inner.next_key.fetch_add(1, Ordering::SeqCst);
                        fields.insert(name.clone(), Value::from(key));
                    }
                },
                PrimaryKey::Single { name, .. } if !fields.contains_key(name) => {
                    return Err(StoreError::backend(format!(
                        "missing primary key field '{}'",
                        name
                    )));
                }
                _ => {}
            }

            if let Some(name) = pk.name() {
                let key = &fields[name];
                let exists = rows
                    .values()
                    .chain(inserted.iter())
                    .any(|r: &StoredRow| {
                        r.fields
                            .get(name)
                            .is_some_and(|v| compare_values(v, key).is_eq())
                    });
                if exists {
                    if options.ignore_duplicates {
                        continue;
                    }
                    return Err(StoreError::conflict(format!(
                        "duplicate key {}={}",
                        name, key
                    )));
                }
            }

            let rowid = self.inner.next_rowid.fetch_add(1, Ordering::SeqCst);
            inserted.push(StoredRow {
                rowid,
                revision: 1,
                fields,
            });
        }

        for row in &inserted {
            rows.insert(row.rowid, row.clone());
        }
        Ok(inserted)
    }
}

fn select(table: &Table, query: &FindQuery) -> Vec<StoredRow> {
    let mut matched: Vec<&StoredRow> = table
        .values()
        .filter(|r| query.filter.matches(&r.fields))
        .collect();
    if !query.order.is_empty() {
        matched.sort_by(|a, b| compare_by(&query.order, &a.fields, &b.fields));
    }
    let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    matched
        .into_iter()
        .skip(query.offset as usize)
        .take(limit)
        .map(|r| {
            let mut row = r.clone();
            if let Some(attributes) = &query.attributes {
                row.fields.retain(|k, _| attributes.contains(k));
            }
            row
        })
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    type Row = StoredRow;

    async fn count(&self, filter: &Filter, txn: Option<TxnId>) -> StoreResult<u64> {
        self.enter(StoreCall::Count {
            filter: filter.clone(),
            txn,
        })
        .await?;
        self.read_view(txn, |table| {
            table.values().filter(|r| filter.matches(&r.fields)).count() as u64
        })
    }

    async fn find(&self, query: &FindQuery, txn: Option<TxnId>) -> StoreResult<Vec<StoredRow>> {
        self.enter(StoreCall::Find {
            query: query.clone(),
            txn,
        })
        .await?;
        self.read_view(txn, |table| select(table, query))
    }

    async fn bulk_create(
        &self,
        records: Vec<Record>,
        options: &CreateOptions,
    ) -> StoreResult<Vec<StoredRow>> {
        self.enter(StoreCall::BulkCreate {
            rows: records.len(),
        })
        .await?;
        self.insert(records, options)
    }

    async fn update(&self, fields: &Record, filter: &Filter) -> StoreResult<UpdateOutcome> {
        self.enter(StoreCall::Update {
            filter: filter.clone(),
        })
        .await?;
        if let Some(name) = self.inner.schema.primary_key().name() {
            if fields.contains_key(name) {
                return Err(StoreError::InvalidQuery {
                    reason: format!("cannot update primary key field '{}'", name),
                });
            }
        }
        let mut rows = self.inner.rows.write();
        let mut outcome = UpdateOutcome::default();
        for row in rows.values_mut().filter(|r| filter.matches(&r.fields)) {
            for (k, v) in fields {
                row.fields.insert(k.clone(), v.clone());
            }
            row.revision += 1;
            outcome.affected += 1;
            outcome.rows.push(row.fields.clone());
        }
        Ok(outcome)
    }

    async fn destroy(&self, filter: &Filter) -> StoreResult<u64> {
        self.enter(StoreCall::Destroy {
            filter: filter.clone(),
        })
        .await?;
        Ok(self.remove_where(filter))
    }

    async fn describe_schema(&self) -> StoreResult<SchemaDescriptor> {
        self.enter(StoreCall::DescribeSchema).await?;
        Ok(self.inner.schema.clone())
    }

    async fn begin(&self, isolation: IsolationLevel) -> StoreResult<TxnId> {
        let id = TxnId(self.inner.next_txn.fetch_add(1, Ordering::SeqCst));
        self.enter(StoreCall::Begin(id)).await?;
        // Clone under the read lock so the snapshot never sees a partial write
        let snapshot = self.inner.rows.read().clone();
        self.inner.snapshots.lock().insert(id, snapshot);
        debug!(target: "rowstream::txn", txn = %id, ?isolation, "Snapshot transaction opened");
        Ok(id)
    }

    async fn commit(&self, txn: TxnId) -> StoreResult<()> {
        self.enter(StoreCall::Commit(txn)).await?;
        self.release(txn)
    }

    async fn rollback(&self, txn: TxnId) -> StoreResult<()> {
        self.enter(StoreCall::Rollback(txn)).await?;
        self.release(txn)
    }
}

impl MemoryStore {
    fn release(&self, txn: TxnId) -> StoreResult<()> {
        match self.inner.snapshots.lock().remove(&txn) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                what: format!("transaction {}", txn),
            }),
        }
    }
}
