use futures::future::join_all;
use heal_knowledge::{
    ErrorSignature, InMemoryKnowledgeStore, KnowledgeStore, MemorySortedSet,
    SortedSetKnowledgeStore,
};
use std::sync::Arc;

fn backends() -> Vec<Arc<dyn KnowledgeStore>> {
    vec![
        Arc::new(InMemoryKnowledgeStore::new()),
        Arc::new(SortedSetKnowledgeStore::new(Arc::new(MemorySortedSet::new()))),
    ]
}

fn sig(s: &str) -> ErrorSignature {
    ErrorSignature::new(s).unwrap()
}

#[tokio::test]
async fn test_confidence_matches_counts_on_every_backend() {
    let outcomes = [true, true, false, true, false, true, true, true];

    for store in backends() {
        let s = sig("database connection lost");
        assert!(store.suggest(&s).await.unwrap().is_none());

        for success in outcomes {
            store
                .record_outcome(&s, "restart database connection", success)
                .await
                .unwrap();
        }

        let record = store.record(&s).await.unwrap().unwrap();
        assert_eq!(record.success_count, 6);
        assert_eq!(record.fail_count, 2);

        let suggestion = store.suggest(&s).await.unwrap().unwrap();
        assert_eq!(suggestion.confidence, 6.0 / 8.0);
        assert_eq!(store.suggest(&s).await.unwrap().unwrap(), suggestion);
    }
}

#[tokio::test]
async fn test_unrelated_signature_stays_unknown() {
    for store in backends() {
        store
            .record_outcome(&sig("timeout"), "restart service", true)
            .await
            .unwrap();
        assert!(store.suggest(&sig("memory leak")).await.unwrap().is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_lose_nothing_on_every_backend() {
    for store in backends() {
        let s = sig("connection pool exhausted");

        let updates = (0..40).map(|i| {
            let store = Arc::clone(&store);
            let s = s.clone();
            tokio::spawn(async move {
                store
                    .record_outcome(&s, "restart database connection", i % 2 == 0)
                    .await
                    .unwrap();
            })
        });
        for joined in join_all(updates).await {
            joined.unwrap();
        }

        let record = store.record(&s).await.unwrap().unwrap();
        assert_eq!(record.success_count + record.fail_count, 40);
        assert_eq!(record.success_count, 20);
    }
}

#[tokio::test]
async fn test_first_solution_is_kept_on_every_backend() {
    for store in backends() {
        let s = sig("memory pressure on cache node");
        store
            .record_outcome(&s, "restart database connection", false)
            .await
            .unwrap();
        store
            .record_outcome(&s, "restart service", true)
            .await
            .unwrap();

        let record = store.record(&s).await.unwrap().unwrap();
        assert_eq!(record.solution, "restart database connection");
        assert_eq!((record.success_count, record.fail_count), (1, 1));
    }
}
