//! Batch partition properties over random sizes

use crate::common::*;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// All rows delivered, no batch above `batch_size`, only the last one short
fn check_partition(sizes: &[usize], expected_total: usize, batch_size: usize) {
    assert_eq!(sizes.iter().sum::<usize>(), expected_total);
    assert!(sizes.iter().all(|s| *s > 0 && *s <= batch_size));
    if let Some((_, init)) = sizes.split_last() {
        assert!(init.iter().all(|s| *s == batch_size));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn search_partitions_rows(
        n in 0u64..300,
        b in 1usize..64,
        limit in proptest::option::of(0u64..350),
        auto_increment in any::<bool>(),
    ) {
        let store = if auto_increment { users(n) } else { accounts(n) };
        let engine = object_engine(store, b);
        let mut request = StreamRequest::new();
        if let Some(limit) = limit {
            request = request.limit(limit);
        }

        let (sizes, terminal) = runtime().block_on(async { drain(engine.search(request)).await });
        prop_assert_eq!(terminal, Some(StreamEvent::End));

        let expected = limit.map_or(n, |l| l.min(n)) as usize;
        check_partition(&sizes, expected, b);
    }

    #[test]
    fn bulk_create_partitions_input(n in 0usize..200, b in 1usize..50) {
        let store = users(0);
        let engine = object_engine(store.clone(), b);
        let input: Vec<Record> = (0..n)
            .map(|i| record([("username", serde_json::json!(i))]))
            .collect();

        let (sizes, _) = runtime().block_on(async {
            drain(engine.bulk_create(input, CreateOptions::default(), StreamRequest::new())).await
        });
        check_partition(&sizes, n, b);
        prop_assert_eq!(store.count_calls(CallKind::BulkCreate), sizes.len());
        prop_assert_eq!(store.len(), n);
    }

    #[test]
    fn destroy_key_sets_are_disjoint(n in 0u64..120, b in 1usize..40) {
        let store = users(n);
        let engine = object_engine(store.clone(), b);
        runtime()
            .block_on(async { engine.destroy(StreamRequest::new()).collect_chunks().await })
            .unwrap();

        let mut keys: Vec<u64> = mutation_key_sets(&store, "id").into_iter().flatten().collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        prop_assert_eq!(keys.len(), total);
        prop_assert_eq!(keys, (1..=n).collect::<Vec<_>>());
        prop_assert!(store.is_empty());
    }
}
