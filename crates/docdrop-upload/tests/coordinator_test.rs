mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use common::{folder, harness, tasks, test_config, FakeBackend, FakeTransport};
use docdrop_core::models::OutcomeContext;
use docdrop_core::PlmError;
use docdrop_upload::DropError;

fn context() -> OutcomeContext {
    OutcomeContext {
        doc_created: true,
        doc_name: "spec".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn all_uploads_succeed_with_single_commit() {
    let target = folder("f1");
    let h = harness(FakeBackend::new(), FakeTransport::new(), test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt", "c.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.total_count, 3);
    assert_eq!(outcome.source_objects.len(), 3);
    assert!(outcome.failure_messages.is_empty());
    assert!(outcome.doc_created);
    assert_eq!(outcome.doc_name, "spec");

    let batches = h.backend.commit_batches();
    assert_eq!(batches.len(), 1);
    let mut committed = batches[0].clone();
    committed.sort();
    assert_eq!(committed, vec!["a.txt", "b.txt", "c.txt"]);
    assert!(h.backend.removal_groups().is_empty());

    assert_eq!(h.events.started.load(Ordering::SeqCst), 3);
    assert_eq!(h.events.ended.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn one_failed_upload_is_reported_and_removed() {
    let target = folder("f1");
    let transport = FakeTransport::new().respond("b.txt", 500, "Internal Server Error");
    let h = harness(FakeBackend::new(), transport, test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt", "c.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.total_count, 3);
    assert_eq!(outcome.source_objects.len(), 2);
    assert_eq!(
        outcome.failure_messages,
        vec!["(500) Internal Server Error : b.txt".to_string()]
    );

    let removals = h.backend.removal_groups();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].parent_obj.uid, "f1");
    assert_eq!(removals[0].children_obj.len(), 1);
    assert_eq!(removals[0].children_obj[0].uid, "ds-b.txt");
    assert_eq!(h.events.modified_uids(), vec!["f1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn failures_in_two_containers_give_two_removal_calls() {
    let first = folder("f1");
    let second = folder("f2");
    let transport = FakeTransport::new()
        .respond("a.txt", 404, "Not Found")
        .respond("b.txt", 403, "Forbidden");
    let h = harness(FakeBackend::new(), transport, test_config());

    let mut batch = tasks(&["a.txt"], &first);
    batch.extend(tasks(&["b.txt"], &second));
    let outcome = h.coordinator.run(batch, context()).await.unwrap();

    assert_eq!(outcome.total_count, 2);
    assert!(outcome.source_objects.is_empty());
    assert_eq!(outcome.failure_messages.len(), 2);
    assert!(h.backend.commit_batches().is_empty());

    let mut parents: Vec<String> = h
        .backend
        .removal_groups()
        .iter()
        .map(|g| g.parent_obj.uid.clone())
        .collect();
    parents.sort();
    assert_eq!(parents, vec!["f1", "f2"]);
}

#[tokio::test(start_paused = true)]
async fn failures_in_one_container_share_a_removal_group() {
    let target = folder("f1");
    let transport = FakeTransport::new()
        .respond("a.txt", 500, "Internal Server Error")
        .respond("b.txt", 502, "Bad Gateway");
    let h = harness(FakeBackend::new(), transport, test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt", "c.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.source_objects.len(), 1);
    let removals = h.backend.removal_groups();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].children_obj.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_error_counts_as_failure_without_status() {
    let target = folder("f1");
    let transport = FakeTransport::new().unreachable("a.txt");
    let h = harness(FakeBackend::new(), transport, test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.source_objects.len(), 1);
    assert_eq!(outcome.failure_messages.len(), 1);
    assert!(outcome.failure_messages[0].starts_with("(0) "));
    assert!(outcome.failure_messages[0].ends_with(" : a.txt"));
    assert_eq!(h.events.ended.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn outcome_conserves_every_file() {
    let target = folder("f1");
    let names: Vec<String> = (0..12).map(|i| format!("file-{:02}.bin", i)).collect();
    let mut transport = FakeTransport::new();
    for (i, name) in names.iter().enumerate() {
        transport = transport.delay(name, Duration::from_millis(150 * i as u64));
        if i % 3 == 0 {
            transport = transport.respond(name, 500, "Internal Server Error");
        }
    }
    let h = harness(FakeBackend::new(), transport, test_config());

    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let outcome = h
        .coordinator
        .run(tasks(&refs, &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.total_count, 12);
    assert_eq!(outcome.success_count() + outcome.failure_count(), 12);
    assert_eq!(outcome.failure_count(), 4);

    let committed: usize = h.backend.commit_batches().iter().map(Vec::len).sum();
    assert_eq!(committed, 8);
}

#[tokio::test(start_paused = true)]
async fn completions_within_quiet_period_coalesce_into_one_commit() {
    let target = folder("f1");
    let transport = FakeTransport::new()
        .delay("a.txt", Duration::from_millis(100))
        .delay("b.txt", Duration::from_millis(400))
        .delay("c.txt", Duration::from_millis(900));
    let h = harness(FakeBackend::new(), transport, test_config());

    let started = Instant::now();
    h.coordinator
        .run(tasks(&["a.txt", "b.txt", "c.txt"], &target), context())
        .await
        .unwrap();

    let times = h.backend.commit_times();
    assert_eq!(times.len(), 1);
    assert_eq!(h.backend.commit_batches()[0].len(), 3);
    // Trailing edge: one quiet period after the last completion.
    assert!(times[0] - started >= Duration::from_millis(1900));
}

#[tokio::test(start_paused = true)]
async fn max_wait_forces_a_commit_during_steady_completions() {
    let target = folder("f1");
    let names: Vec<String> = (1..=15).map(|i| format!("part-{:02}.dat", i)).collect();
    let mut transport = FakeTransport::new();
    for (i, name) in names.iter().enumerate() {
        transport = transport.delay(name, Duration::from_millis(900 * (i as u64 + 1)));
    }
    let h = harness(FakeBackend::new(), transport, test_config());

    let started = Instant::now();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let outcome = h
        .coordinator
        .run(tasks(&refs, &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.source_objects.len(), 15);
    let times = h.backend.commit_times();
    assert!(times.len() >= 2, "max wait must split the batch");
    // First completion at 0.9 s, max wait 10 s.
    assert!(times[0] - started <= Duration::from_millis(10_900));
    assert!(h.backend.commit_batches()[0].len() < 15);
}

#[tokio::test(start_paused = true)]
async fn at_most_one_commit_in_flight() {
    let target = folder("f1");
    let backend = FakeBackend::new().with_commit_delay(Duration::from_millis(2000));
    let transport = FakeTransport::new()
        .delay("a.txt", Duration::from_millis(100))
        .delay("b.txt", Duration::from_millis(1500))
        .delay("c.txt", Duration::from_millis(1600));
    let h = harness(backend, transport, test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt", "c.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.source_objects.len(), 3);
    assert_eq!(h.backend.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.backend.commit_batches(),
        vec![
            vec!["a.txt".to_string()],
            vec!["b.txt".to_string(), "c.txt".to_string()]
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failure_during_commit_waits_for_the_commit() {
    let target = folder("f1");
    let backend = FakeBackend::new().with_commit_delay(Duration::from_millis(3000));
    let transport = FakeTransport::new()
        .delay("a.txt", Duration::from_millis(100))
        .delay("b.txt", Duration::from_millis(1500))
        .respond("b.txt", 500, "Internal Server Error");
    let h = harness(backend, transport, test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt"], &target), context())
        .await
        .unwrap();

    // b fails at 1.5 s while a's commit is in flight until 4.1 s.
    assert_eq!(outcome.source_objects.len(), 1);
    assert_eq!(outcome.source_objects[0].uid, "ds-a.txt");
    assert_eq!(outcome.failure_messages.len(), 1);
    assert_eq!(h.backend.removal_groups().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn recoverable_commit_errors_are_retried() {
    let target = folder("f1");
    let backend = FakeBackend::new().fail_commits(vec![
        PlmError::Http {
            operation: "commitDatasetFiles".to_string(),
            status: 503,
            body: String::new(),
        },
        PlmError::Transport("connection reset".to_string()),
    ]);
    let h = harness(backend, FakeTransport::new(), test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(h.backend.commit_batches().len(), 3);
    assert!(outcome.is_complete_success());
    assert!(h.backend.removal_groups().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_commit_moves_files_to_failures() {
    let target = folder("f1");
    let backend = FakeBackend::new().fail_commits(vec![PlmError::Http {
        operation: "commitDatasetFiles".to_string(),
        status: 403,
        body: "forbidden".to_string(),
    }]);
    let h = harness(backend, FakeTransport::new(), test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt"], &target), context())
        .await
        .unwrap();

    // Not recoverable: a single attempt.
    assert_eq!(h.backend.commit_batches().len(), 1);
    assert_eq!(outcome.total_count, 2);
    assert!(outcome.source_objects.is_empty());
    assert_eq!(outcome.failure_messages.len(), 2);
    assert!(outcome
        .failure_messages
        .iter()
        .all(|m| m.starts_with("(commit) ")));

    let removals = h.backend.removal_groups();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].children_obj.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_batch() {
    let target = folder("f1");
    let unavailable = || PlmError::Http {
        operation: "commitDatasetFiles".to_string(),
        status: 503,
        body: String::new(),
    };
    let backend = FakeBackend::new().fail_commits(vec![unavailable(), unavailable(), unavailable()]);
    let h = harness(backend, FakeTransport::new(), test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(h.backend.commit_batches().len(), 3);
    assert_eq!(outcome.failure_count(), 1);
    assert!(outcome.failure_messages[0].ends_with(" : a.txt"));
}

#[tokio::test(start_paused = true)]
async fn removal_errors_still_resolve() {
    let target = folder("f1");
    let backend = FakeBackend::new().with_failing_removals();
    let transport = FakeTransport::new().respond("a.txt", 500, "Internal Server Error");
    let h = harness(backend, transport, test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt"], &target), context())
        .await
        .unwrap();

    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(h.backend.removal_groups().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_batch_resolves_immediately() {
    let h = harness(FakeBackend::new(), FakeTransport::new(), test_config());

    let outcome = h
        .coordinator
        .run(Vec::new(), OutcomeContext::default())
        .await
        .unwrap();

    assert_eq!(outcome.total_count, 0);
    assert!(outcome.source_objects.is_empty());
    assert!(!outcome.doc_created);
    assert!(h.backend.commit_batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn session_accepts_batches_before_settling() {
    let target = folder("f1");
    let transport = FakeTransport::new()
        .delay("a.txt", Duration::from_millis(500))
        .delay("b.txt", Duration::from_millis(200));
    let h = harness(FakeBackend::new(), transport, test_config());

    let session = h.coordinator.start(context());
    session.submit(tasks(&["a.txt"], &target));
    session.submit(tasks(&["b.txt"], &target));
    let outcome = session.finish().await.unwrap();

    assert_eq!(outcome.total_count, 2);
    assert_eq!(outcome.source_objects.len(), 2);
    assert_eq!(h.backend.commit_batches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn commit_rejecting_one_attachment_keeps_the_others() {
    let target = folder("f1");
    let backend = FakeBackend::new().reject_on_commit("ds-c.txt", "[214014] c failed");
    let h = harness(backend, FakeTransport::new(), test_config());

    let outcome = h
        .coordinator
        .run(tasks(&["a.txt", "b.txt", "c.txt"], &target), context())
        .await
        .unwrap();

    let mut committed: Vec<&str> = outcome.source_objects.iter().map(|o| o.uid.as_str()).collect();
    committed.sort();
    assert_eq!(committed, vec!["ds-a.txt", "ds-b.txt"]);
    assert_eq!(
        outcome.failure_messages,
        vec!["(commit) [214014] c failed : c.txt".to_string()]
    );
    assert_eq!(outcome.total_count, 3);

    let removals = h.backend.removal_groups();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].children_obj.len(), 1);
    assert_eq!(removals[0].children_obj[0].uid, "ds-c.txt");
}

#[tokio::test(start_paused = true)]
async fn dropped_session_stops_its_coordinator() {
    let h = harness(FakeBackend::new(), FakeTransport::new(), test_config());
    let idle = Arc::strong_count(&h.backend);

    let sessions: Vec<_> = (0..5).map(|_| h.coordinator.start(context())).collect();
    assert_eq!(Arc::strong_count(&h.backend), idle + 5);

    drop(sessions);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(Arc::strong_count(&h.backend), idle);
}

#[tokio::test(start_paused = true)]
async fn crashed_upload_ends_session_without_outcome() {
    let target = folder("f1");
    let transport = FakeTransport::new().panic_on("b.txt");
    let h = harness(FakeBackend::new(), transport, test_config());

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        h.coordinator.run(tasks(&["a.txt", "b.txt"], &target), context()),
    )
    .await
    .expect("session should end once no upload can report back");

    assert!(matches!(result, Err(DropError::CoordinatorGone)));
    // The upload that did finish was still committed.
    assert_eq!(h.backend.commit_batches(), vec![vec!["a.txt".to_string()]]);
}
