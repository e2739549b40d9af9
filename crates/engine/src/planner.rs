//! Pagination planning
//!
//! Two strategies exist:
//!
//! - **Offset paging**: windows `{start + k·b, min(b, end - offset)}` while
//!   `offset < end`, where `end` comes from the request limit or a store
//!   count. A short page ends the plan early, so rows deleted after the
//!   count never produce empty trailing windows.
//! - **Keyset paging**: rows with `key > last_key` ordered by key, `b` at a
//!   time, starting after the key type's zero value. Only possible when the
//!   entity has a single auto-increment primary key.
//!
//! Windows are produced lazily; neither strategy materializes its window
//! list.

use serde_json::Value;

use rowstream_core::{Filter, FindQuery, Op, OrderBy, PrimaryKey, Record};

/// Chosen paging strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagingStrategy {
    /// Offset/limit windows
    Offset,
    /// Cursor windows on an auto-increment key
    Keyset {
        /// Key column
        key: String,
    },
}

/// Pick the strategy for a read stream.
///
/// Keyset paging requires a single auto-increment primary key. It also
/// imposes key order and cannot skip rows, so a request with a start
/// offset or an explicit ordering falls back to offset paging.
pub fn select_strategy(pk: &PrimaryKey, start: u64, order: &[OrderBy]) -> PagingStrategy {
    match pk {
        PrimaryKey::Single {
            name,
            auto_increment: true,
        } if start == 0 && order.is_empty() => PagingStrategy::Keyset { key: name.clone() },
        _ => PagingStrategy::Offset,
    }
}

/// One page request
#[derive(Debug, Clone, PartialEq)]
pub enum PageWindow {
    /// `offset`/`limit` window
    Offset {
        /// Rows to skip
        offset: u64,
        /// Rows to fetch
        limit: u64,
    },
    /// Rows with `key > after`, ascending
    Keyset {
        /// Key column
        key: String,
        /// Exclusive lower bound
        after: Value,
        /// Rows to fetch
        limit: u64,
    },
}

impl PageWindow {
    /// Rows requested by this window
    pub fn limit(&self) -> u64 {
        match self {
            PageWindow::Offset { limit, .. } | PageWindow::Keyset { limit, .. } => *limit,
        }
    }

    /// Build the store query for this window
    pub fn to_query(&self, filter: &Filter, order: &[OrderBy]) -> FindQuery {
        match self {
            PageWindow::Offset { offset, limit } => FindQuery::new(filter.clone())
                .window(*offset, *limit)
                .order(order.to_vec()),
            PageWindow::Keyset { key, after, limit } => {
                FindQuery::new(filter.clone().and(key.clone(), Op::Gt(after.clone())))
                    .window(0, *limit)
                    .order(vec![OrderBy::asc(key.clone())])
            }
        }
    }
}

/// Lazy offset window sequence
#[derive(Debug, Clone)]
pub struct OffsetPlan {
    next: u64,
    end: u64,
    batch_size: u64,
    exhausted: bool,
}

impl OffsetPlan {
    /// Windows from `start` (inclusive) to `end` (exclusive)
    pub fn new(start: u64, end: u64, batch_size: usize) -> Self {
        Self {
            next: start,
            end,
            batch_size: batch_size.max(1) as u64,
            exhausted: false,
        }
    }

    /// Report a fetch result; a short page ends the plan
    pub fn observe(&mut self, requested: u64, returned: usize) {
        if (returned as u64) < requested {
            self.exhausted = true;
        }
    }

    /// True once no more windows will be produced
    pub fn is_exhausted(&self) -> bool {
        self.exhausted || self.next >= self.end
    }
}

impl Iterator for OffsetPlan {
    type Item = PageWindow;

    fn next(&mut self) -> Option<PageWindow> {
        if self.is_exhausted() {
            return None;
        }
        let offset = self.next;
        let limit = self.batch_size.min(self.end - offset);
        self.next = offset.saturating_add(self.batch_size);
        Some(PageWindow::Offset { offset, limit })
    }
}

/// Keyset cursor state
#[derive(Debug, Clone)]
pub struct KeysetCursor {
    key: String,
    last_key: Value,
    batch_size: u64,
    remaining: Option<u64>,
    exhausted: bool,
}

impl KeysetCursor {
    /// Cursor on `key` starting before the first positive key, capped at
    /// `limit` rows in total
    pub fn new(key: impl Into<String>, batch_size: usize, limit: Option<u64>) -> Self {
        Self {
            key: key.into(),
            last_key: Value::from(0),
            batch_size: batch_size.max(1) as u64,
            remaining: limit,
            exhausted: false,
        }
    }

    /// Key column
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last key seen
    pub fn last_key(&self) -> &Value {
        &self.last_key
    }

    /// Next window, or `None` once exhausted
    pub fn next_window(&self) -> Option<PageWindow> {
        if self.exhausted {
            return None;
        }
        let limit = match self.remaining {
            Some(0) => return None,
            Some(remaining) => remaining.min(self.batch_size),
            None => self.batch_size,
        };
        Some(PageWindow::Keyset {
            key: self.key.clone(),
            after: self.last_key.clone(),
            limit,
        })
    }

    /// Record a fetch result
    pub fn advance(&mut self, requested: u64, returned: usize, last: Option<&Value>) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(returned as u64);
        }
        match last {
            Some(key) if (returned as u64) >= requested => self.last_key = key.clone(),
            _ => self.exhausted = true,
        }
    }
}

/// Either strategy behind one interface
#[derive(Debug, Clone)]
pub enum PagePlan {
    /// Offset windows
    Offset(OffsetPlan),
    /// Keyset windows
    Keyset(KeysetCursor),
}

impl PagePlan {
    /// Next window to fetch
    pub fn next_window(&mut self) -> Option<PageWindow> {
        match self {
            PagePlan::Offset(plan) => plan.next(),
            PagePlan::Keyset(cursor) => cursor.next_window(),
        }
    }

    /// Feed back the rows fetched for `window`
    pub fn observe(&mut self, window: &PageWindow, batch: &[Record]) {
        match self {
            PagePlan::Offset(plan) => plan.observe(window.limit(), batch.len()),
            PagePlan::Keyset(cursor) => {
                let last = batch.last().and_then(|r| r.get(cursor.key()));
                let last = last.cloned();
                cursor.advance(window.limit(), batch.len(), last.as_ref());
            }
        }
    }

    /// Strategy label for logs
    pub fn strategy_name(&self) -> &'static str {
        match self {
            PagePlan::Offset(_) => "offset",
            PagePlan::Keyset(_) => "keyset",
        }
    }
}
