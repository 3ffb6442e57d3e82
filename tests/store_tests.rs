// MetricsStore: per-device replace, registry-ordered reads, sealing, atomic visibility

mod common;

use common::{metrics, registry};
use netpoll::models::{PollOutcome, PollResult};
use netpoll::store::MetricsStore;
use std::sync::Arc;

#[tokio::test]
async fn test_unpolled_device_has_no_entry() {
    let store = MetricsStore::new(registry(&["a", "b"]));
    assert!(store.get("a").await.is_none());
    let all = store.get_all().await;
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|d| d.result.is_none() && d.last_attempt_at.is_none()));
}

#[tokio::test]
async fn test_put_replaces_entry_wholesale() {
    let store = MetricsStore::new(registry(&["a"]));
    assert!(store.put(PollResult::success("a", 1_000, metrics(40.0))).await);
    assert!(store.put(PollResult::failure("a", 2_000, "timeout")).await);

    let latest = store.get("a").await.unwrap();
    assert_eq!(latest.observed_at, 2_000);
    assert_eq!(
        latest.outcome,
        PollOutcome::Failure {
            reason: "timeout".into()
        }
    );
    // The last good metrics are gone, not kept alongside the failure.
    assert!(latest.metrics().is_none());
    assert_eq!(store.get_all().await[0].last_attempt_at, Some(2_000));
}

#[tokio::test]
async fn test_get_all_follows_registry_order_not_put_order() {
    let store = MetricsStore::new(registry(&["c", "a", "b"]));
    store.put(PollResult::success("b", 1, metrics(1.0))).await;
    store.put(PollResult::success("c", 1, metrics(2.0))).await;
    let names: Vec<String> = store.get_all().await.into_iter().map(|d| d.name).collect();
    assert_eq!(names, ["c", "a", "b"]);
}

#[tokio::test]
async fn test_put_for_unregistered_device_is_discarded() {
    let store = MetricsStore::new(registry(&["a"]));
    assert!(!store.put(PollResult::success("ghost", 1, metrics(1.0))).await);
    assert!(store.get("ghost").await.is_none());
}

#[tokio::test]
async fn test_sealed_store_discards_writes() {
    let store = MetricsStore::new(registry(&["a", "b"]));
    store.put(PollResult::success("a", 1, metrics(10.0))).await;
    store.seal().await;
    assert!(store.is_sealed().await);

    assert!(!store.put(PollResult::failure("a", 2, "late")).await);
    assert!(!store.put(PollResult::success("b", 2, metrics(20.0))).await);
    assert_eq!(store.get("a").await.unwrap().observed_at, 1);
    assert!(store.get("b").await.is_none());
}

#[tokio::test]
async fn test_same_key_across_changing_values() {
    let store = MetricsStore::new(registry(&["a"]));
    for i in 0..5u64 {
        store
            .put(PollResult::success("a", i, metrics(i as f64)))
            .await;
        let got = store.get("a").await.unwrap();
        assert_eq!(got.device_name, "a");
        assert_eq!(got.observed_at, i);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_mixed_results() {
    let store = Arc::new(MetricsStore::new(registry(&["a"])));

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..2_000u64 {
                let result = if i % 2 == 0 {
                    PollResult::success("a", i, metrics(i as f64))
                } else {
                    PollResult::failure("a", i, format!("fail {}", i))
                };
                store.put(result).await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..2_000 {
                if let Some(r) = store.get("a").await {
                    // Every field must come from the same put.
                    match &r.outcome {
                        PollOutcome::Success(m) => {
                            assert_eq!(r.observed_at % 2, 0);
                            assert_eq!(m.cpu_load, Some(r.observed_at as f64));
                            assert_eq!(m.memory_used_pct, Some(r.observed_at as f64));
                        }
                        PollOutcome::Failure { reason } => {
                            assert_eq!(r.observed_at % 2, 1);
                            assert_eq!(reason, &format!("fail {}", r.observed_at));
                        }
                    }
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for r in readers {
        r.await.unwrap();
    }
    assert_eq!(store.get("a").await.unwrap().observed_at, 1_999);
}

#[tokio::test]
async fn test_summary_reads_current_entries() {
    let store = MetricsStore::new(registry(&["a", "b"]));
    store.put(PollResult::success("a", 1, metrics(30.0))).await;
    let summary = store.summary().await;
    assert_eq!(summary.online, 1);
    assert_eq!(summary.offline, 1);
    assert_eq!(summary.avg_cpu, Some(30.0));
}
