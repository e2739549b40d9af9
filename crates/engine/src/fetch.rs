//! Batch fetch driver
//!
//! Runs a search stream: picks a paging strategy from the schema, walks the
//! page windows serially, flattens store rows into records and pushes one
//! encoded chunk per non-empty batch.
//!
//! The terminal state is checked before every store call and every push; a
//! cancelled stream issues no further store calls.
//!
//! # Transactions
//!
//! A transactional search opens one serializable transaction before the
//! first read and passes it to every `count`/`find`. It commits once when
//! the loop ends (normally or by consumer cancellation) and rolls back once
//! when the loop fails. The closing delimiter is pushed only after the
//! commit succeeds.

use tracing::{debug, trace, warn};

use rowstream_core::{IntoRecord, IsolationLevel, Record, Store, StreamResult, TxnId};

use crate::context::{DriverContext, Flow};
use crate::encoding::BatchEncoder;
use crate::planner::{select_strategy, KeysetCursor, OffsetPlan, PagePlan, PagingStrategy};
use crate::request::StreamRequest;

/// Run a search stream to completion
pub async fn run<S: Store>(ctx: &DriverContext<S>, request: &StreamRequest) -> StreamResult<Flow> {
    let mut encoder = BatchEncoder::new(ctx.settings.mode);
    let flow = if request.transactional {
        run_in_transaction(ctx, request, &mut encoder).await?
    } else {
        fetch_pages(ctx, request, None, &mut encoder).await?
    };
    if flow == Flow::Cancelled || !ctx.push(encoder.finish()).await {
        return Ok(Flow::Cancelled);
    }
    Ok(Flow::Done)
}

async fn run_in_transaction<S: Store>(
    ctx: &DriverContext<S>,
    request: &StreamRequest,
    encoder: &mut BatchEncoder,
) -> StreamResult<Flow> {
    if ctx.is_terminal() {
        return Ok(Flow::Cancelled);
    }
    let txn = ctx.store.begin(IsolationLevel::Serializable).await?;
    debug!(target: "rowstream::txn", entity = %ctx.entity, txn = %txn, "Search transaction opened");

    match fetch_pages(ctx, request, Some(txn), encoder).await {
        Ok(flow) => {
            ctx.store.commit(txn).await?;
            debug!(target: "rowstream::txn", entity = %ctx.entity, txn = %txn, ?flow, "Search transaction committed");
            Ok(flow)
        }
        Err(e) => {
            match ctx.store.rollback(txn).await {
                Ok(()) => {
                    debug!(target: "rowstream::txn", entity = %ctx.entity, txn = %txn, "Search transaction rolled back")
                }
                Err(rollback_err) => warn!(
                    target: "rowstream::txn",
                    entity = %ctx.entity,
                    txn = %txn,
                    error = %rollback_err,
                    "Rollback failed"
                ),
            }
            Err(e)
        }
    }
}

async fn fetch_pages<S: Store>(
    ctx: &DriverContext<S>,
    request: &StreamRequest,
    txn: Option<TxnId>,
    encoder: &mut BatchEncoder,
) -> StreamResult<Flow> {
    if ctx.is_terminal() {
        return Ok(Flow::Cancelled);
    }
    let schema = ctx.store.describe_schema().await?;
    let strategy = select_strategy(&schema.primary_key(), request.offset, &request.order);
    let batch_size = ctx.settings.batch_size;

    let mut plan = match strategy {
        PagingStrategy::Keyset { key } => {
            PagePlan::Keyset(KeysetCursor::new(key, batch_size, request.limit))
        }
        PagingStrategy::Offset => {
            // `limit` is an absolute end position, like a counted total
            let end = match request.limit {
                Some(limit) => limit,
                None => {
                    if ctx.is_terminal() {
                        return Ok(Flow::Cancelled);
                    }
                    ctx.store.count(&request.filter, txn).await?
                }
            };
            PagePlan::Offset(OffsetPlan::new(request.offset, end, batch_size))
        }
    };
    debug!(
        target: "rowstream::fetch",
        entity = %ctx.entity,
        strategy = plan.strategy_name(),
        batch_size,
        "Paging plan selected"
    );

    if !ctx.push(encoder.open()).await {
        return Ok(Flow::Cancelled);
    }

    let mut window_no = 0usize;
    let mut total = 0usize;
    while let Some(window) = plan.next_window() {
        if ctx.is_terminal() {
            return Ok(Flow::Cancelled);
        }
        let query = window.to_query(&request.filter, &request.order);
        let batch: Vec<Record> = ctx
            .store
            .find(&query, txn)
            .await?
            .into_iter()
            .map(IntoRecord::into_record)
            .collect();
        plan.observe(&window, &batch);

        total += batch.len();
        trace!(
            target: "rowstream::fetch",
            entity = %ctx.entity,
            window = window_no,
            rows = batch.len(),
            "Batch fetched"
        );
        window_no += 1;

        if !ctx.push(encoder.records(batch)?).await {
            return Ok(Flow::Cancelled);
        }
    }

    debug!(target: "rowstream::fetch", entity = %ctx.entity, windows = window_no, rows = total, "Fetch finished");
    Ok(Flow::Done)
}
