use std::sync::Arc;
use std::time::Duration;

use glaura::error::Error;
use glaura::model::{CompletionStamp, NewTask, ServiceScope};
use glaura::rollup::{normalized_truthy, Orchestrator, RollUpPolicy, RollUpStep, Transition};
use glaura::store::memory::{FailPoint, Fault, MemoryStore, WriteTarget};

fn setup() -> (Arc<MemoryStore>, Orchestrator) {
    setup_with(MemoryStore::new(), RollUpPolicy::default())
}

fn setup_with(store: MemoryStore, policy: RollUpPolicy) -> (Arc<MemoryStore>, Orchestrator) {
    let store = Arc::new(store);
    let orchestrator = Orchestrator::from_store(Arc::clone(&store), policy);
    (store, orchestrator)
}

#[tokio::test]
async fn completing_last_task_completes_header() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let task = store.seed_task(&header, "Immigration", false);

    let outcome = orchestrator
        .complete_task(&header, &task, None)
        .await
        .expect("complete");

    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
    assert_eq!(outcome.rollup.writes(), 1);
    assert!(outcome.rollup.is_clean());
    let refreshed = outcome.result.task.expect("re-read task");
    assert_eq!(refreshed.compleated_date, Some(outcome.result.stamp.date.clone()));
}

#[tokio::test]
async fn deleting_last_incomplete_task_completes_header() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    store.seed_task(&header, "Customs", true);
    let pending = store.seed_task(&header, "Health", false);

    let outcome = orchestrator
        .delete_task(&header, &pending, None)
        .await
        .expect("delete");

    assert!(!outcome.result.already_absent);
    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
}

#[tokio::test]
async fn deleting_missing_task_still_rolls_up() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    store.seed_task(&header, "Customs", true);

    let outcome = orchestrator
        .delete_task(&header, "task-gone", None)
        .await
        .expect("tolerant delete");

    assert!(outcome.result.already_absent);
    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
}

#[tokio::test]
async fn header_already_at_target_is_not_written() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", "true");
    store.seed_task(&header, "Customs", true);
    let task = store.seed_task(&header, "Health", "true");

    orchestrator
        .complete_task(&header, &task, None)
        .await
        .expect("complete");

    assert!(store.status_writes().is_empty());
}

#[tokio::test]
async fn completing_twice_restamps() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let task = store.seed_task(&header, "Immigration", false);

    orchestrator
        .complete_task_at(&header, &task, CompletionStamp::new("2024-03-01", "08:00:00"), None)
        .await
        .expect("first");
    orchestrator
        .complete_task_at(&header, &task, CompletionStamp::new("2024-03-02", "09:30:15"), None)
        .await
        .expect("second");

    let stored = store.task(&task).expect("task");
    assert_eq!(stored.compleated_date.as_deref(), Some("2024-03-02"));
    assert_eq!(stored.compleated_time.as_deref(), Some("09:30:15"));
    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
}

#[tokio::test]
async fn empty_complete_header_resets_when_auto_reopen_enabled() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", true);

    let report = orchestrator.roll_up_header(&header, None).await;

    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![false]);
    assert_eq!(
        report.header(&header).map(|h| h.transition),
        Some(Transition::Reopen)
    );
}

#[tokio::test]
async fn empty_complete_header_left_alone_without_auto_reopen() {
    let policy = RollUpPolicy {
        auto_reopen: false,
        ..RollUpPolicy::default()
    };
    let (store, orchestrator) = setup_with(MemoryStore::new(), policy);
    let header = store.seed_header("J1", "S1", "Clearance", true);

    let report = orchestrator.roll_up_header(&header, None).await;

    assert!(store.status_writes().is_empty());
    assert_eq!(
        report.header(&header).map(|h| h.transition),
        Some(Transition::Suppressed)
    );
}

#[tokio::test]
async fn adding_task_reopens_complete_header() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", true);
    store.seed_task(&header, "Customs", true);

    let outcome = orchestrator
        .create_task(&header, "Late inspection", "ops", None)
        .await
        .expect("create");

    assert_eq!(outcome.result.task.created_by.as_deref(), Some("ops"));
    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![false]);
}

#[tokio::test]
async fn blank_task_name_rejected_before_any_call() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);

    let err = orchestrator
        .create_task(&header, "   ", "ops", None)
        .await
        .expect_err("validation");

    assert!(matches!(err, Error::Validation(_)));
    assert!(store.status_writes().is_empty());
}

#[tokio::test]
async fn service_completes_with_its_last_header() {
    let (store, orchestrator) = setup();
    let service = store.seed_service("J1", "S1", false);
    let done = store.seed_header("J1", "S1", "Berthing", true);
    store.seed_task(&done, "Pilot", true);
    let open = store.seed_header("J1", "S1", "Clearance", false);
    store.seed_task(&open, "Customs", true);
    let last = store.seed_task(&open, "Health", false);
    let scope = ServiceScope::new("J1", "S1");

    let before = orchestrator.roll_up_service(&scope).await;
    assert_eq!(before.writes(), 0);
    assert_eq!(before.service.as_ref().map(|s| s.target_complete), Some(false));

    let outcome = orchestrator
        .complete_task(&open, &last, Some(&scope))
        .await
        .expect("complete");

    assert_eq!(store.writes_to(WriteTarget::Header, &open), vec![true]);
    assert_eq!(store.writes_to(WriteTarget::Service, &service), vec![true]);
    assert_eq!(outcome.rollup.writes(), 2);
}

#[tokio::test]
async fn embedded_header_tasks_skip_hydration() {
    let (store, orchestrator) = setup_with(
        MemoryStore::new().with_embedded_tasks(),
        RollUpPolicy::default(),
    );
    let service = store.seed_service("J1", "S1", false);
    let header = store.seed_header("J1", "S1", "Clearance", true);
    store.seed_task(&header, "Customs", true);
    // Hydration would fail; embedded tasks make it unnecessary.
    store.fail(FailPoint::ListTasks, Fault::Transient, 5);

    let report = orchestrator
        .roll_up_service(&ServiceScope::new("J1", "S1"))
        .await;

    assert!(report.is_clean());
    assert_eq!(store.writes_to(WriteTarget::Service, &service), vec![true]);
}

#[tokio::test]
async fn service_without_headers_is_never_complete() {
    let (store, orchestrator) = setup();
    let service = store.seed_service("J1", "S1", true);

    let report = orchestrator
        .roll_up_service(&ServiceScope::new("J1", "S1"))
        .await;

    assert_eq!(report.service.as_ref().map(|s| s.target_complete), Some(false));
    assert_eq!(store.writes_to(WriteTarget::Service, &service), vec![false]);
}

#[tokio::test]
async fn hydration_failure_abandons_service_stage() {
    let (store, orchestrator) = setup();
    let service = store.seed_service("J1", "S1", false);
    let header = store.seed_header("J1", "S1", "Clearance", true);
    store.seed_task(&header, "Customs", true);
    store.fail(FailPoint::ListTasks, Fault::Transient, 1);

    let report = orchestrator
        .roll_up_service(&ServiceScope::new("J1", "S1"))
        .await;

    assert!(report.service.is_none());
    assert_eq!(report.warnings[0].step, RollUpStep::HydrateHeader);
    assert!(store.writes_to(WriteTarget::Service, &service).is_empty());
}

#[tokio::test]
async fn unknown_service_is_reported_not_written() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S9", "Clearance", false);
    let task = store.seed_task(&header, "Customs", false);

    let outcome = orchestrator
        .complete_task(&header, &task, Some(&ServiceScope::new("J1", "S9")))
        .await
        .expect("primary succeeds");

    assert_eq!(outcome.rollup.warnings.len(), 1);
    assert_eq!(outcome.rollup.warnings[0].kind, "not_found");
    assert_eq!(outcome.rollup.writes(), 1);
}

#[tokio::test]
async fn transient_header_write_is_retried_once() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let task = store.seed_task(&header, "Customs", false);
    store.fail(FailPoint::SetHeaderStatus, Fault::Transient, 1);

    let outcome = orchestrator
        .complete_task(&header, &task, None)
        .await
        .expect("complete");

    assert!(outcome.rollup.is_clean());
    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
}

#[tokio::test]
async fn repeated_transient_failure_is_abandoned() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let task = store.seed_task(&header, "Customs", false);
    store.fail(FailPoint::SetHeaderStatus, Fault::Transient, 2);

    let outcome = orchestrator
        .complete_task(&header, &task, None)
        .await
        .expect("primary still succeeds");

    assert!(normalized_truthy(&store.task(&task).expect("task").status));
    assert_eq!(outcome.rollup.warnings.len(), 1);
    assert_eq!(outcome.rollup.warnings[0].step, RollUpStep::WriteHeader);
    assert_eq!(outcome.rollup.warnings[0].kind, "transient");
    assert!(store.writes_to(WriteTarget::Header, &header).is_empty());
}

#[tokio::test]
async fn auth_during_rollup_requires_reauth() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let task = store.seed_task(&header, "Customs", false);
    store.fail(FailPoint::GetHeader, Fault::Auth, 1);

    let outcome = orchestrator
        .complete_task(&header, &task, None)
        .await
        .expect("primary succeeds");

    assert!(outcome.rollup.requires_reauth());
    assert!(store.status_writes().is_empty());
}

#[tokio::test]
async fn auth_on_primary_mutation_fails_the_action() {
    let (store, orchestrator) = setup();
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let task = store.seed_task(&header, "Customs", false);
    store.fail(FailPoint::CompleteTask, Fault::Auth, 1);

    let err = orchestrator
        .complete_task(&header, &task, None)
        .await
        .expect_err("auth");

    assert!(err.is_auth());
    assert!(!normalized_truthy(&store.task(&task).expect("task").status));
    assert!(store.status_writes().is_empty());
}

#[tokio::test]
async fn header_created_with_tasks_reopens_complete_service() {
    let (store, orchestrator) = setup();
    let service = store.seed_service("J1", "S1", true);
    let header = store.seed_header("J1", "S1", "Berthing", true);
    store.seed_task(&header, "Pilot", true);
    let scope = ServiceScope::new("J1", "S1");

    let outcome = orchestrator
        .create_header(
            &scope,
            "Departure",
            "ops",
            &[NewTask {
                task_name: "Clearance".to_string(),
                created_by: "ops".to_string(),
            }],
        )
        .await
        .expect("create header");

    assert_eq!(outcome.result.header.tasks.as_ref().map(Vec::len), Some(1));
    assert_eq!(store.writes_to(WriteTarget::Service, &service), vec![false]);

    let deleted = orchestrator
        .delete_header(&scope, &outcome.result.header.id)
        .await
        .expect("delete header");
    assert!(!deleted.result.already_absent);
    assert_eq!(store.writes_to(WriteTarget::Service, &service), vec![false, true]);
}

#[tokio::test]
async fn reconcile_port_call_repairs_every_service() {
    let (store, orchestrator) = setup();
    let ready = store.seed_service("J1", "S1", false);
    let header = store.seed_header("J1", "S1", "Clearance", false);
    store.seed_task(&header, "Customs", true);

    let pending = store.seed_service("J1", "S2", false);
    let open = store.seed_header("J1", "S2", "Bunkering", false);
    store.seed_task(&open, "Delivery", false);
    store.seed_service("J2", "S1", false);

    let result = orchestrator
        .reconcile_port_call("J1")
        .await
        .expect("reconcile");

    assert_eq!(result.services.len(), 2);
    assert!(!result.all_services_complete);
    assert_eq!(result.writes(), 2);
    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
    assert_eq!(store.writes_to(WriteTarget::Service, &ready), vec![true]);
    assert!(normalized_truthy(&store.service(&ready).expect("service").status));
    assert!(store.writes_to(WriteTarget::Service, &pending).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_write_header_once() {
    let (store, orchestrator) = setup_with(
        MemoryStore::new().with_latency(Duration::from_millis(20)),
        RollUpPolicy::default(),
    );
    let orchestrator = Arc::new(orchestrator);
    let header = store.seed_header("J1", "S1", "Clearance", false);
    let first = store.seed_task(&header, "Customs", false);
    let second = store.seed_task(&header, "Health", false);

    let mut handles = Vec::new();
    for task in [first, second] {
        let orchestrator = Arc::clone(&orchestrator);
        let header = header.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.complete_task(&header, &task, None).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("complete");
    }

    assert_eq!(store.writes_to(WriteTarget::Header, &header), vec![true]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_header_completions_write_service_once() {
    let (store, orchestrator) = setup_with(
        MemoryStore::new().with_latency(Duration::from_millis(20)),
        RollUpPolicy::default(),
    );
    let orchestrator = Arc::new(orchestrator);
    let service = store.seed_service("J1", "S1", false);
    let berthing = store.seed_header("J1", "S1", "Berthing", false);
    let clearance = store.seed_header("J1", "S1", "Clearance", false);
    let pilot = store.seed_task(&berthing, "Pilot", false);
    let customs = store.seed_task(&clearance, "Customs", false);

    let mut handles = Vec::new();
    for (header, task) in [(berthing.clone(), pilot), (clearance.clone(), customs)] {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let scope = ServiceScope::new("J1", "S1");
            orchestrator.complete_task(&header, &task, Some(&scope)).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("complete");
    }

    assert_eq!(store.writes_to(WriteTarget::Header, &berthing), vec![true]);
    assert_eq!(store.writes_to(WriteTarget::Header, &clearance), vec![true]);
    assert_eq!(store.writes_to(WriteTarget::Service, &service), vec![true]);
}
