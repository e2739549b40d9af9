//! Bulk create / update / destroy scenarios

use std::collections::BTreeSet;

use crate::common::*;
use serde_json::json;

fn reports(chunks: Vec<Chunk>) -> Vec<MutationReport> {
    chunks
        .into_iter()
        .map(|c| match c {
            Chunk::Report(r) => r,
            other => panic!("expected report, got {:?}", other),
        })
        .collect()
}

#[tokio::test]
async fn bulk_create_seven_in_threes() {
    let store = users(0);
    let engine = object_engine(store.clone(), 3);
    let input: Vec<Record> = (0..7)
        .map(|i| record([("username", json!(format!("new{}", i)))]))
        .collect();

    let (sizes, terminal) = drain(engine.bulk_create(
        input,
        CreateOptions::default(),
        StreamRequest::new(),
    ))
    .await;
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(terminal, Some(StreamEvent::End));
    assert_eq!(store.count_calls(CallKind::BulkCreate), 3);

    let rows: Vec<usize> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::BulkCreate { rows } => Some(rows),
            _ => None,
        })
        .collect();
    assert_eq!(rows, vec![3, 3, 1]);
}

#[tokio::test]
async fn bulk_create_ignores_duplicates_when_asked() {
    let store = users(3);
    let engine = object_engine(store.clone(), 10);
    let input = vec![user_row(2), user_row(4), user_row(3), user_row(5)];
    let batches = engine
        .bulk_create(
            input,
            CreateOptions {
                ignore_duplicates: true,
            },
            StreamRequest::new(),
        )
        .collect_batches()
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(store.len(), 5);
}

#[tokio::test]
async fn bulk_create_single_array() {
    let engine = text_engine(users(0), 2, true);
    let input: Vec<Record> = (0..5).map(|i| record([("username", json!(i))])).collect();
    let text = engine
        .bulk_create(input, CreateOptions::default(), StreamRequest::new())
        .collect_text()
        .await
        .unwrap();
    let rows: Vec<Record> = serde_json::from_str(&text).unwrap();
    let ids: Vec<u64> = rows.iter().filter_map(|r| r["id"].as_u64()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn destroy_key_sets_partition_all_rows() {
    let n = 25u64;
    let store = users(2 * n);
    let engine = object_engine(store.clone(), n as usize);

    let chunks = engine
        .destroy(StreamRequest::new())
        .collect_chunks()
        .await
        .unwrap();
    let reports = reports(chunks);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports.iter().map(|r| r.affected).sum::<u64>(), 2 * n);

    let key_sets = mutation_key_sets(&store, "id");
    assert_eq!(key_sets.len(), 2);
    let mut seen = BTreeSet::new();
    for keys in &key_sets {
        for key in keys {
            assert!(seen.insert(*key), "key {} appears in two windows", key);
        }
    }
    assert_eq!(seen, (1..=2 * n).collect::<BTreeSet<_>>());
    assert!(store.is_empty());
}

#[tokio::test]
async fn update_key_sets_partition_matched_rows() {
    let n = 10u64;
    let store = accounts(4 * n);
    let engine = object_engine(store.clone(), n as usize);
    let request = StreamRequest::new().filter(Filter::all().eq("active", true));

    let reports = reports(
        engine
            .update(record([("username", json!("renamed"))]), request)
            .collect_chunks()
            .await
            .unwrap(),
    );
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.affected == n && r.rows.len() == n as usize));

    let keys: Vec<u64> = mutation_key_sets(&store, "id").into_iter().flatten().collect();
    let evens: Vec<u64> = (1..=4 * n).filter(|id| id % 2 == 0).collect();
    assert_eq!(keys, evens);

    for row in store.rows() {
        let renamed = row["username"] == json!("renamed");
        assert_eq!(renamed, row["active"] == json!(true));
    }
}

#[tokio::test]
async fn destroy_with_filter_and_limit() {
    let store = users(20);
    let engine = object_engine(store.clone(), 4);
    let request = StreamRequest::new()
        .filter(Filter::all().eq("active", false))
        .limit(6);

    let reports = reports(engine.destroy(request).collect_chunks().await.unwrap());
    assert_eq!(reports.iter().map(|r| r.affected).sum::<u64>(), 6);
    assert_eq!(
        mutation_key_sets(&store, "id"),
        vec![vec![1, 3, 5, 7], vec![9, 11]]
    );
    assert_eq!(store.len(), 14);
}

#[tokio::test]
async fn destroy_reports_in_single_array() {
    let engine = text_engine(users(5), 2, true);
    let text = engine
        .destroy(StreamRequest::new())
        .collect_text()
        .await
        .unwrap();
    let parsed: Vec<MutationReport> = serde_json::from_str(&text).unwrap();
    assert_eq!(
        parsed.iter().map(|r| r.affected).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    assert_eq!(
        parsed.iter().map(|r| r.window).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn destroy_without_primary_key_fails_first() {
    let store = std::sync::Arc::new(MemoryStore::new(
        SchemaDescriptor::new().field("line", FieldDescriptor::plain()),
    ));
    store.seed(vec![record([("line", json!("a"))])]).unwrap();
    store.clear_calls();
    let engine = object_engine(store.clone(), 10);

    let (sizes, terminal) = drain(engine.destroy(StreamRequest::new())).await;
    assert!(sizes.is_empty());
    assert!(matches!(
        terminal,
        Some(StreamEvent::Error(StreamError::NoPrimaryKey { .. }))
    ));
    assert_eq!(store.count_calls(CallKind::Destroy), 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn transactional_flag_rejected_for_mutations() {
    let store = users(3);
    let engine = object_engine(store.clone(), 10);
    let err = engine
        .update(record([("active", json!(true))]), StreamRequest::new().transactional(true))
        .collect_chunks()
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::InvalidRequest { .. }));
    assert!(store.calls().is_empty());
}
