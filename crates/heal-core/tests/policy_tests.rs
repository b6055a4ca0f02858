//! End-to-end decision policy behaviour

use futures::future::join_all;
use heal_core::{
    ErrorReport, EscalationError, FixApplier, HealerConfig, KnowledgeStore, PolicyStep,
    RepairSuggestionEngine, Resolution,
};
use heal_knowledge::{MemorySortedSet, SortedSetKnowledgeStore};
use heal_test_utils::{
    registry_with, seeded_store, setup_test_healer, signature, RecordingEscalator, ScriptedRemedy,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const DB: &str = "restart database connection";
const SVC: &str = "restart service";

fn fixer(
    store: Arc<dyn KnowledgeStore>,
    remedies: &[Arc<ScriptedRemedy>],
    escalator: Arc<RecordingEscalator>,
) -> FixApplier {
    FixApplier::new(
        RepairSuggestionEngine::new(store),
        Arc::new(registry_with(remedies)),
        escalator,
        &HealerConfig::default(),
    )
}

#[tokio::test]
async fn test_learned_fix_applied_and_counted() {
    let store = seeded_store(&[("db pool exhausted", DB, 8, 2)]);
    let db = Arc::new(ScriptedRemedy::succeeding(DB));
    let escalator = Arc::new(RecordingEscalator::new());

    let fixer = fixer(store.clone(), &[db.clone()], escalator.clone());
    assert!(fixer.attempt_fix(&ErrorReport::new("db pool exhausted")).await.unwrap());

    let record = store.record(&signature("db pool exhausted")).await.unwrap().unwrap();
    assert_eq!(record.success_count, 9);
    assert_eq!(record.fail_count, 2);
    assert_eq!(db.calls(), 1);
    assert_eq!(escalator.count(), 0);
}

#[tokio::test]
async fn test_unknown_database_error_learns_default_fix() {
    let store = seeded_store(&[]);
    let db = Arc::new(ScriptedRemedy::succeeding(DB));
    let escalator = Arc::new(RecordingEscalator::new());

    let fixer = fixer(store.clone(), &[db], escalator.clone());
    let outcome = fixer
        .run(&ErrorReport::new("database connection lost"))
        .await
        .unwrap();

    assert!(outcome.resolved);
    assert_eq!(outcome.resolution, Resolution::DefaultFix { remedy: DB.into() });

    let record = store
        .record(&signature("database connection lost"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((record.success_count, record.fail_count), (1, 0));
    assert_eq!(record.solution, DB);
}

#[tokio::test]
async fn test_unmatched_error_escalates_exactly_once() {
    let store = seeded_store(&[]);
    let escalator = Arc::new(RecordingEscalator::new());
    let svc = Arc::new(ScriptedRemedy::succeeding(SVC));

    let fixer = fixer(store.clone(), &[svc.clone()], escalator.clone());
    let message = "certificate for api.internal expired yesterday and nothing renewed it";
    let outcome = fixer.run(&ErrorReport::new(message)).await.unwrap();

    assert!(!outcome.resolved);
    assert_eq!(outcome.steps.last(), Some(&PolicyStep::Resolved));
    assert!(outcome.steps.contains(&PolicyStep::Escalate));
    assert_eq!(svc.calls(), 0);

    let requests = escalator.requests();
    assert_eq!(requests.len(), 1);
    let (title, body) = &requests[0];
    assert_eq!(title, &format!("Fix: {}...", &message[..50]));
    assert!(body.contains(message));

    // Nothing is learned from an escalation
    assert!(store.suggest(&signature(message)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failing_defaults_escalate_with_attempts() {
    let store = seeded_store(&[]);
    let db = Arc::new(ScriptedRemedy::failing(DB));
    let svc = Arc::new(ScriptedRemedy::failing(SVC));
    let escalator = Arc::new(RecordingEscalator::new());

    let fixer = fixer(store.clone(), &[db.clone(), svc.clone()], escalator.clone());
    let outcome = fixer
        .run(&ErrorReport::new("connection timeout to replica"))
        .await
        .unwrap();

    assert!(!outcome.resolved);
    let tried: Vec<&str> = outcome.attempts.iter().map(|a| a.remedy.as_str()).collect();
    assert_eq!(tried, vec![DB, SVC]);
    assert_eq!(escalator.count(), 1);
    assert!(escalator.requests()[0].1.contains("scripted failure"));

    // Default-rule failures are not recorded
    assert!(store.report().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_escalation_delivery_failure_is_swallowed() {
    let escalator = Arc::new(RecordingEscalator::failing());
    let fixer = fixer(seeded_store(&[]), &[], escalator.clone());

    let outcome = fixer.run(&ErrorReport::new("disk full on /var")).await.unwrap();
    assert!(!outcome.resolved);
    assert_eq!(outcome.escalation(), None);
    assert!(matches!(
        outcome.escalation_error(),
        Some(EscalationError::Delivery(_))
    ));
    assert_eq!(escalator.count(), 1);
}

#[tokio::test]
async fn test_store_offline_degrades_to_defaults() {
    let backend = Arc::new(MemorySortedSet::new());
    let store = Arc::new(SortedSetKnowledgeStore::new(Arc::clone(&backend)));
    store
        .record_outcome(&signature("memory limit exceeded"), "flush caches", true)
        .await
        .unwrap();
    backend.set_online(false);

    let svc = Arc::new(ScriptedRemedy::succeeding(SVC));
    let escalator = Arc::new(RecordingEscalator::new());
    let fixer = fixer(store, &[svc.clone()], escalator.clone());

    let outcome = fixer
        .run(&ErrorReport::new("memory limit exceeded"))
        .await
        .unwrap();
    assert!(outcome.resolved);
    assert_eq!(outcome.resolution, Resolution::DefaultFix { remedy: SVC.into() });
    assert!(!outcome.steps.contains(&PolicyStep::AutoApply));
    assert_eq!(svc.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_for_one_signature_lose_nothing() {
    let store = seeded_store(&[("connection reset by peer", DB, 8, 2)]);
    let db = Arc::new(ScriptedRemedy::new(DB, [true, false, true, true, false, true]));
    let escalator = Arc::new(RecordingEscalator::new());
    let fixer = Arc::new(fixer(store.clone(), &[db.clone()], escalator));

    let runs = (0..12).map(|_| {
        let fixer = Arc::clone(&fixer);
        tokio::spawn(async move {
            fixer
                .run(&ErrorReport::new("connection reset by peer"))
                .await
                .unwrap()
        })
    });
    let outcomes: Vec<_> = join_all(runs)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    // Confidence never drops to the threshold, so every run auto-applies
    assert!(outcomes.iter().all(|o| o.steps.contains(&PolicyStep::AutoApply)));
    assert_eq!(db.calls(), 12);

    let record = store
        .record(&signature("connection reset by peer"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.total(), 22);
    let resolved = outcomes.iter().filter(|o| o.resolved).count() as u64;
    assert_eq!(record.success_count, 8 + resolved);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_caller_does_not_abandon_the_run() {
    let store = seeded_store(&[("replica connection dropped", DB, 8, 2)]);
    let db = Arc::new(ScriptedRemedy::succeeding(DB).with_delay(Duration::from_millis(500)));
    let fixer = Arc::new(fixer(store.clone(), &[db.clone()], Arc::new(RecordingEscalator::new())));
    let report = ErrorReport::new("replica connection dropped");

    // The caller gives up while the remedy is still running
    let abandoned = tokio::time::timeout(Duration::from_millis(100), fixer.run(&report)).await;
    assert!(abandoned.is_err());
    assert_eq!(db.calls(), 1);

    let second = {
        let fixer = Arc::clone(&fixer);
        let report = report.clone();
        tokio::spawn(async move { fixer.run(&report).await.unwrap() })
    };

    // The first run still holds the signature, so the second waits
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(db.calls(), 1);
    assert_eq!(fixer.in_flight(), 1);

    let outcome = second.await.unwrap();
    assert!(outcome.resolved);
    assert_eq!(db.calls(), 2);

    // Both outcomes were learned
    let record = store
        .record(&signature("replica connection dropped"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((record.success_count, record.fail_count), (10, 2));
    assert_eq!(fixer.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_remedy_times_out_and_falls_through() {
    let store = seeded_store(&[("request timeout on /orders", DB, 9, 1)]);
    let db = Arc::new(ScriptedRemedy::succeeding(DB).with_delay(Duration::from_secs(30)));
    let svc = Arc::new(ScriptedRemedy::succeeding(SVC));
    let escalator = Arc::new(RecordingEscalator::new());

    let fixer = fixer(store.clone(), &[db, svc.clone()], escalator);
    let outcome = fixer
        .run(&ErrorReport::new("request timeout on /orders"))
        .await
        .unwrap();

    assert!(outcome.resolved);
    assert_eq!(outcome.resolution, Resolution::DefaultFix { remedy: SVC.into() });
    let record = store
        .record(&signature("request timeout on /orders"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((record.success_count, record.fail_count), (10, 2));
}

#[tokio::test]
async fn test_healer_reports_through_notifier() {
    let svc = Arc::new(ScriptedRemedy::succeeding(SVC));
    let (healer, escalator, notifier) = setup_test_healer(seeded_store(&[]), &[svc]);

    assert!(healer.handle_error("upstream timeout").await.unwrap());
    assert!(!healer.handle_error("unexpected token in config").await.unwrap());

    assert_eq!(
        notifier.messages(),
        vec![
            "Fixed: upstream timeout".to_string(),
            "Unresolved error: unexpected token in config".to_string(),
        ]
    );
    assert_eq!(escalator.count(), 1);

    let report = healer.repair_report().await;
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].best_solution, SVC);
    assert_eq!(healer.buffer().len(), 2);
}
