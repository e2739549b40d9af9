//! Bulk mutation driver
//!
//! ## Create
//!
//! The input records are split into `batch_size` chunks; each chunk is one
//! `bulk_create` call and one pushed batch of inserted rows.
//!
//! ## Update / Destroy
//!
//! Both work window by window against the entity's single primary key,
//! over `filter` ordered by the key ascending. Each window is one read of
//! the key column followed by one `update`/`destroy` scoped to
//! `filter AND key IN (keys)`, then one [`MutationReport`].
//!
//! `count` fixes the end position (capped by `limit`). The first window
//! starts at `offset`; every later window reads `key > last_key` instead of
//! an offset, so rows removed or changed by an earlier window cannot shift
//! later windows. Each key appears in exactly one mutation, and only one
//! window of keys is held at a time.
//!
//! Windows are not atomic as a group: a failure stops the stream and leaves
//! earlier windows applied.

use serde_json::Value;
use tracing::{debug, trace};

use rowstream_core::{
    CreateOptions, IntoRecord, OrderBy, PrimaryKey, Record, Store, StreamError, StreamResult,
};

use crate::context::{DriverContext, Flow};
use crate::encoding::{BatchEncoder, MutationReport};
use crate::planner::{OffsetPlan, PageWindow};
use crate::request::StreamRequest;

/// Mutation applied to each window of keys
#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    /// Set `fields` on every matched row
    Update {
        /// New field values
        fields: Record,
    },
    /// Delete every matched row
    Destroy,
}

/// Run a bulk-create stream
pub async fn run_create<S: Store>(
    ctx: &DriverContext<S>,
    records: Vec<Record>,
    options: &CreateOptions,
) -> StreamResult<Flow> {
    let mut encoder = BatchEncoder::new(ctx.settings.mode);
    if !ctx.push(encoder.open()).await {
        return Ok(Flow::Cancelled);
    }

    let total = records.len();
    let mut input = records.into_iter();
    let mut window = 0usize;
    loop {
        let chunk: Vec<Record> = input.by_ref().take(ctx.settings.batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        if ctx.is_terminal() {
            return Ok(Flow::Cancelled);
        }
        let requested = chunk.len();
        let inserted: Vec<Record> = ctx
            .store
            .bulk_create(chunk, options)
            .await?
            .into_iter()
            .map(IntoRecord::into_record)
            .collect();
        trace!(
            target: "rowstream::mutation",
            entity = %ctx.entity,
            window,
            requested,
            inserted = inserted.len(),
            "Chunk created"
        );
        window += 1;

        if !ctx.push(encoder.records(inserted)?).await {
            return Ok(Flow::Cancelled);
        }
    }

    if !ctx.push(encoder.finish()).await {
        return Ok(Flow::Cancelled);
    }
    debug!(target: "rowstream::mutation", entity = %ctx.entity, records = total, chunks = window, "Bulk create finished");
    Ok(Flow::Done)
}

/// Run an update or destroy stream
pub async fn run_mutation<S: Store>(
    ctx: &DriverContext<S>,
    request: &StreamRequest,
    kind: &MutationKind,
) -> StreamResult<Flow> {
    if ctx.is_terminal() {
        return Ok(Flow::Cancelled);
    }
    let key = target_key(ctx).await?;

    if ctx.is_terminal() {
        return Ok(Flow::Cancelled);
    }
    let count = ctx.store.count(&request.filter, None).await?;
    let end = request.limit.map_or(count, |limit| limit.min(count));
    debug!(
        target: "rowstream::mutation",
        entity = %ctx.entity,
        intent = %ctx.intent,
        key = %key,
        matched = count,
        end,
        "Mutation planned"
    );

    let mut encoder = BatchEncoder::new(ctx.settings.mode);
    if !ctx.push(encoder.open()).await {
        return Ok(Flow::Cancelled);
    }

    let order = vec![OrderBy::asc(key.as_str())];
    let mut plan = OffsetPlan::new(request.offset, end, ctx.settings.batch_size);
    let mut last_key: Option<Value> = None;
    let mut window = 0usize;
    while let Some(page) = plan.next() {
        if ctx.is_terminal() {
            return Ok(Flow::Cancelled);
        }
        let requested = page.limit();
        let keys = read_keys(ctx, request, &key, &order, page, last_key.take()).await?;
        plan.observe(requested, keys.len());
        let Some(last) = keys.last().cloned() else {
            break;
        };
        last_key = Some(last);

        if ctx.is_terminal() {
            return Ok(Flow::Cancelled);
        }
        let scoped = request.filter.with_key_set(&key, keys);
        let report = match kind {
            MutationKind::Update { fields } => {
                let outcome = ctx.store.update(fields, &scoped).await?;
                MutationReport {
                    window,
                    affected: outcome.affected,
                    rows: outcome.rows,
                }
            }
            MutationKind::Destroy => MutationReport {
                window,
                affected: ctx.store.destroy(&scoped).await?,
                rows: Vec::new(),
            },
        };
        trace!(
            target: "rowstream::mutation",
            entity = %ctx.entity,
            intent = %ctx.intent,
            window,
            affected = report.affected,
            "Window applied"
        );
        window += 1;

        if !ctx.push(encoder.report(report)?).await {
            return Ok(Flow::Cancelled);
        }
    }

    if !ctx.push(encoder.finish()).await {
        return Ok(Flow::Cancelled);
    }
    debug!(target: "rowstream::mutation", entity = %ctx.entity, intent = %ctx.intent, windows = window, "Mutation finished");
    Ok(Flow::Done)
}

/// Name of the single primary key column
async fn target_key<S: Store>(ctx: &DriverContext<S>) -> StreamResult<String> {
    match ctx.store.describe_schema().await?.primary_key() {
        PrimaryKey::Single { name, .. } => Ok(name),
        PrimaryKey::None => Err(StreamError::NoPrimaryKey {
            entity: ctx.entity.clone(),
        }),
        PrimaryKey::Composite(fields) => Err(StreamError::CompositePrimaryKey {
            entity: ctx.entity.clone(),
            fields,
        }),
    }
}

/// Primary keys of one window.
///
/// The first window is positional; later ones continue after `after`.
async fn read_keys<S: Store>(
    ctx: &DriverContext<S>,
    request: &StreamRequest,
    key: &str,
    order: &[OrderBy],
    page: PageWindow,
    after: Option<Value>,
) -> StreamResult<Vec<Value>> {
    let page = match after {
        Some(after) => PageWindow::Keyset {
            key: key.to_string(),
            after,
            limit: page.limit(),
        },
        None => page,
    };
    let query = page
        .to_query(&request.filter, order)
        .attributes(vec![key.to_string()]);
    let keys = ctx
        .store
        .find(&query, None)
        .await?
        .into_iter()
        .filter_map(|row| row.into_record().remove(key))
        .collect();
    Ok(keys)
}
