//! Cancellation, failure and transaction lifecycle

use std::time::Duration;

use crate::common::*;
use rowstream::ChannelState;
use serde_json::json;
use tokio_stream::StreamExt;

#[tokio::test]
async fn cancel_after_k_batches_stops_store_calls() {
    let store = accounts(100);
    store.set_latency(Some(Duration::from_millis(2)));
    let engine = StreamEngine::new(
        "account",
        store.clone(),
        StreamConfig::new()
            .with_batch_size(10)
            .with_object_mode(true)
            .with_channel_capacity(1),
    );
    let mut stream = engine.search(StreamRequest::new());

    for _ in 0..2 {
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Data(_))
        ));
    }
    assert!(stream.cancel_with(Some("client disconnected".to_string())));
    assert_eq!(stream.next_event().await, None);

    // Let the driver observe the cancellation
    tokio::time::sleep(Duration::from_millis(50)).await;
    let finds = store.count_calls(CallKind::Find);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.count_calls(CallKind::Find), finds);
    // Two delivered, at most one buffered and one in flight
    assert!(finds <= 4, "driver kept fetching: {} finds", finds);

    assert_eq!(stream.state(), ChannelState::Closed);
    assert_eq!(stream.cancel_reason().as_deref(), Some("client disconnected"));
    let snap = engine.metrics().snapshot();
    assert_eq!(snap.cancelled, 1);
    assert_eq!(snap.active, 0);
}

#[tokio::test]
async fn cancel_handle_stops_destroy_between_windows() {
    let store = users(40);
    store.set_latency(Some(Duration::from_millis(2)));
    let engine = StreamEngine::new(
        "user",
        store.clone(),
        StreamConfig::new()
            .with_batch_size(10)
            .with_object_mode(true)
            .with_channel_capacity(1),
    );
    let mut stream = engine.destroy(StreamRequest::new());
    let handle = stream.cancel_handle();

    assert!(matches!(stream.next_event().await, Some(StreamEvent::Data(_))));
    handle.cancel(None);
    assert_eq!(stream.next_event().await, None);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let destroys = store.count_calls(CallKind::Destroy);
    assert!(destroys < 4, "all windows ran despite cancellation");
    // Earlier windows stay applied
    assert_eq!(store.len() as u64, 40 - 10 * destroys as u64);
}

#[tokio::test]
async fn dropping_stream_cancels_driver() {
    let store = accounts(1000);
    store.set_latency(Some(Duration::from_millis(1)));
    let engine = object_engine(store.clone(), 10);
    let mut stream = engine.search(StreamRequest::new());
    stream.next_event().await;
    drop(stream);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.count_calls(CallKind::Find) < 100);
    assert_eq!(engine.metrics().snapshot().active, 0);
}

#[tokio::test]
async fn store_failure_is_single_error_event() {
    let store = accounts(50);
    store.fail_on(CallKind::Find, 3, StoreError::backend("connection reset"));
    let engine = object_engine(store.clone(), 10);

    let (sizes, terminal) = drain(engine.search(StreamRequest::new())).await;
    assert_eq!(sizes, vec![10, 10]);
    assert_eq!(
        terminal,
        Some(StreamEvent::Error(StreamError::Store(StoreError::backend(
            "connection reset"
        ))))
    );
    assert_eq!(store.count_calls(CallKind::Find), 3);
    assert_eq!(engine.metrics().snapshot().failed, 1);
}

#[tokio::test]
async fn count_failure_fails_before_any_batch() {
    let store = accounts(50);
    store.fail_on(CallKind::Count, 1, StoreError::backend("timeout"));
    let engine = text_engine(store.clone(), 10, true);

    let (events, err) = {
        let mut stream = engine.search(StreamRequest::new());
        let mut events = Vec::new();
        let mut err = None;
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Error(e) => err = Some(e),
                other => events.push(other),
            }
        }
        (events, err)
    };
    assert!(events.is_empty());
    assert!(err.unwrap().is_store_error());
    assert_eq!(store.count_calls(CallKind::Find), 0);
}

#[tokio::test]
async fn stream_trait_yields_results() {
    let engine = object_engine(accounts(25), 10);
    let items: Vec<_> = engine.search(StreamRequest::new()).collect().await;
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(Result::is_ok));

    let store = accounts(25);
    store.fail_on(CallKind::Find, 2, StoreError::backend("boom"));
    let engine = object_engine(store, 10);
    let items: Vec<_> = engine.search(StreamRequest::new()).collect().await;
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].is_err());
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn transactional_search_commits_once() {
    let store = accounts(30);
    let engine = object_engine(store.clone(), 10);
    let (sizes, terminal) = drain(engine.search(StreamRequest::new().transactional(true))).await;

    assert_eq!(sizes, vec![10, 10, 10]);
    assert_eq!(terminal, Some(StreamEvent::End));
    assert_eq!(store.count_calls(CallKind::Begin), 1);
    assert_eq!(store.count_calls(CallKind::Commit), 1);
    assert_eq!(store.count_calls(CallKind::Rollback), 0);
    assert_eq!(store.open_transactions(), 0);
}

#[tokio::test]
async fn transactional_search_rolls_back_once() {
    let store = accounts(30);
    store.fail_on(CallKind::Find, 2, StoreError::conflict("serialization failure"));
    let engine = object_engine(store.clone(), 10);
    let (sizes, terminal) = drain(engine.search(StreamRequest::new().transactional(true))).await;

    assert_eq!(sizes, vec![10]);
    assert!(matches!(terminal, Some(StreamEvent::Error(_))));
    assert_eq!(store.count_calls(CallKind::Commit), 0);
    assert_eq!(store.count_calls(CallKind::Rollback), 1);
    assert_eq!(store.open_transactions(), 0);
}

#[tokio::test]
async fn transaction_released_after_cancel() {
    let store = accounts(100);
    store.set_latency(Some(Duration::from_millis(2)));
    let engine = StreamEngine::new(
        "account",
        store.clone(),
        StreamConfig::new()
            .with_batch_size(10)
            .with_object_mode(true)
            .with_channel_capacity(1),
    );
    let mut stream = engine.search(StreamRequest::new().transactional(true));
    stream.next_event().await;
    stream.cancel();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.count_calls(CallKind::Commit), 1);
    assert_eq!(store.open_transactions(), 0);
}

#[tokio::test]
async fn transactional_search_sees_stable_snapshot() {
    let store = accounts(40);
    store.set_latency(Some(Duration::from_millis(2)));
    let engine = StreamEngine::new(
        "account",
        store.clone(),
        StreamConfig::new()
            .with_batch_size(10)
            .with_object_mode(true)
            .with_channel_capacity(1),
    );
    let mut stream = engine.search(StreamRequest::new().transactional(true));
    assert!(matches!(stream.next_event().await, Some(StreamEvent::Data(_))));

    // A concurrent writer removes the first rows; offset windows would
    // otherwise skip ten rows
    store.remove_where(&Filter::all().and("id", Op::Lte(json!(10))));

    let (sizes, terminal) = drain(stream).await;
    assert_eq!(sizes, vec![10, 10, 10]);
    assert_eq!(terminal, Some(StreamEvent::End));
}

#[tokio::test]
async fn store_without_transactions_reports_unsupported() {
    use rowstream::{async_trait, FindQuery, Store, StoreResult, TxnId, UpdateOutcome};

    struct ReadOnly;

    #[async_trait]
    impl Store for ReadOnly {
        type Row = Record;

        async fn count(&self, _: &Filter, _: Option<TxnId>) -> StoreResult<u64> {
            Ok(0)
        }
        async fn find(
            &self,
            _: &FindQuery,
            _: Option<TxnId>,
        ) -> StoreResult<Vec<Record>> {
            Ok(Vec::new())
        }
        async fn bulk_create(&self, _: Vec<Record>, _: &CreateOptions) -> StoreResult<Vec<Record>> {
            Err(StoreError::unsupported("bulk_create"))
        }
        async fn update(&self, _: &Record, _: &Filter) -> StoreResult<UpdateOutcome> {
            Err(StoreError::unsupported("update"))
        }
        async fn destroy(&self, _: &Filter) -> StoreResult<u64> {
            Err(StoreError::unsupported("destroy"))
        }
        async fn describe_schema(&self) -> StoreResult<SchemaDescriptor> {
            Ok(SchemaDescriptor::new())
        }
    }

    let engine = StreamEngine::new("ro", std::sync::Arc::new(ReadOnly), StreamConfig::new());
    let (_, terminal) = drain(engine.search(StreamRequest::new().transactional(true))).await;
    assert!(matches!(
        terminal,
        Some(StreamEvent::Error(StreamError::Store(StoreError::Unsupported { .. })))
    ));
    assert_eq!(engine.metrics().snapshot().failed, 1);
}
