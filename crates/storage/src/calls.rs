//! Call log and fault injection for the memory store
//!
//! Every store call is appended to a [`CallLog`] before it executes, so
//! tests can assert exactly which calls a driver issued and in what order.

use parking_lot::Mutex;

use rowstream_core::{Filter, FindQuery, StoreError, TxnId};

/// Discriminant of a store call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `count`
    Count,
    /// `find`
    Find,
    /// `bulk_create`
    BulkCreate,
    /// `update`
    Update,
    /// `destroy`
    Destroy,
    /// `describe_schema`
    DescribeSchema,
    /// `begin`
    Begin,
    /// `commit`
    Commit,
    /// `rollback`
    Rollback,
}

/// One recorded store call with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// Count over a filter
    Count {
        /// Filter
        filter: Filter,
        /// Transaction, if any
        txn: Option<TxnId>,
    },
    /// Paged read
    Find {
        /// Full query
        query: FindQuery,
        /// Transaction, if any
        txn: Option<TxnId>,
    },
    /// Bulk insert
    BulkCreate {
        /// Number of input records
        rows: usize,
    },
    /// Update
    Update {
        /// Filter the update was scoped to
        filter: Filter,
    },
    /// Delete
    Destroy {
        /// Filter the delete was scoped to
        filter: Filter,
    },
    /// Schema lookup
    DescribeSchema,
    /// Transaction opened
    Begin(TxnId),
    /// Transaction committed
    Commit(TxnId),
    /// Transaction rolled back
    Rollback(TxnId),
}

impl StoreCall {
    /// The call's discriminant
    pub fn kind(&self) -> CallKind {
        match self {
            StoreCall::Count { .. } => CallKind::Count,
            StoreCall::Find { .. } => CallKind::Find,
            StoreCall::BulkCreate { .. } => CallKind::BulkCreate,
            StoreCall::Update { .. } => CallKind::Update,
            StoreCall::Destroy { .. } => CallKind::Destroy,
            StoreCall::DescribeSchema => CallKind::DescribeSchema,
            StoreCall::Begin(_) => CallKind::Begin,
            StoreCall::Commit(_) => CallKind::Commit,
            StoreCall::Rollback(_) => CallKind::Rollback,
        }
    }
}

#[derive(Debug)]
struct Fault {
    kind: CallKind,
    nth: usize,
    error: StoreError,
}

/// Ordered log of store calls plus armed faults
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<StoreCall>>,
    faults: Mutex<Vec<Fault>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and return the injected error, if one is armed for it
    pub fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        let kind = call.kind();
        let nth = {
            let mut calls = self.calls.lock();
            calls.push(call);
            calls.iter().filter(|c| c.kind() == kind).count()
        };
        let faults = self.faults.lock();
        match faults.iter().find(|f| f.kind == kind && f.nth == nth) {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }

    /// Make the `nth` (1-based) call of `kind` fail with `error`
    pub fn arm(&self, kind: CallKind, nth: usize, error: StoreError) {
        self.faults.lock().push(Fault { kind, nth, error });
    }

    /// All calls so far, in issue order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of calls of one kind
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.lock().iter().filter(|c| c.kind() == kind).count()
    }

    /// Forget recorded calls (armed faults stay)
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}
