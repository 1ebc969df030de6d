//! End-to-end runs of the orchestrator against the in-process viewer.

mod common;

use std::sync::Arc;

use lopdf::Document;

use deck_capture::config::StorageConfig;
use deck_capture::{
    CaptureSession, DurableStore, FileStore, Phase, ProgressEvent, ProgressStore, RunOutcome,
};

use common::{
    DECK_URL, FailingEncoder, FakeViewer, Harness, HeldStore, page_colour, pixel_of, solid_page,
};

// ============================================================================
// Helpers
// ============================================================================

fn progress(store: &Arc<dyn DurableStore>) -> ProgressStore {
    ProgressStore::new(Arc::clone(store), &StorageConfig::default())
}

/// Persists a session for `url` holding `pages` out of `total`.
async fn seed(store: &Arc<dyn DurableStore>, url: &str, total: u32, pages: &[u32]) {
    let mut session = CaptureSession {
        total_pages: total,
        document_url: url.to_string(),
        ..CaptureSession::default()
    };
    for &page in pages {
        session.record(page, solid_page(page));
    }
    progress(store).save(&session).await.expect("seed");
}

fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).expect("valid pdf").get_pages().len()
}

// ============================================================================
// Complete runs
// ============================================================================

#[tokio::test]
async fn test_three_page_run_event_sequence() {
    let h = Harness::new(3);
    let events = h.record_events();

    let outcome = h.orchestrator.run().await;
    let RunOutcome::Completed(delivery) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(delivery.filename, "Q3 Board Deck.pdf");

    assert_eq!(
        *events.lock(),
        vec![
            ProgressEvent::Capturing { progress: 0, total: 3 },
            ProgressEvent::Capturing { progress: 1, total: 3 },
            ProgressEvent::Capturing { progress: 2, total: 3 },
            ProgressEvent::Capturing { progress: 3, total: 3 },
            ProgressEvent::Compiling { progress: 0, total: 3 },
            ProgressEvent::Compiling { progress: 1, total: 3 },
            ProgressEvent::Compiling { progress: 2, total: 3 },
            ProgressEvent::Compiling { progress: 3, total: 3 },
            ProgressEvent::Done,
        ]
    );

    let delivered = h.sink.delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(page_count(&delivered[0].1), 3);

    assert_eq!(h.screen.shots(), vec![1, 2, 3]);
    assert_eq!(h.orchestrator.phase(), Phase::Done);
    assert!(progress(&h.store).summary().await.expect("summary").is_none());
}

#[tokio::test]
async fn test_every_page_is_persisted_before_the_next() {
    let h = Harness::new(4);
    h.viewer.never_render(4);

    let outcome = h.orchestrator.run().await;
    assert!(matches!(outcome, RunOutcome::Failed(ref f) if f.page == 4), "{outcome:?}");

    let persisted = progress(&h.store).load().await.expect("load").expect("session");
    assert_eq!(persisted.total_pages, 4);
    assert_eq!(persisted.document_url, DECK_URL);
    assert_eq!(persisted.captured_pages.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    for (page, image) in &persisted.captured_pages {
        assert_eq!(pixel_of(image), page_colour(*page));
    }
}

#[tokio::test]
async fn test_filename_from_title() {
    let h = Harness::new(1);
    h.viewer.set_title(Some("  Series A: Pitch (v2)!  "));
    let RunOutcome::Completed(delivery) = h.orchestrator.run().await else {
        panic!("expected completion");
    };
    assert_eq!(delivery.filename, "Series A Pitch v2.pdf");

    let h = Harness::new(1);
    h.viewer.set_title(Some("???"));
    let RunOutcome::Completed(delivery) = h.orchestrator.run().await else {
        panic!("expected completion");
    };
    assert_eq!(delivery.filename, "docsend-presentation.pdf");
}

// ============================================================================
// Control surface
// ============================================================================

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let h = Harness::new(3);
    let gate = h.screen.hold();

    let first = h.orchestrator.start();
    while h.screen.shots().is_empty() {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.orchestrator.run().await, RunOutcome::AlreadyRunning);
    assert!(h.orchestrator.session().is_capturing);

    gate.add_permits(3);
    assert!(first.await.expect("join").is_completed());
    assert_eq!(h.screen.shots(), vec![1, 2, 3]);
    assert_eq!(h.sink.delivered.lock().len(), 1);
}

#[tokio::test]
async fn test_pause_then_resume() {
    let h = Harness::new(4);
    h.screen.pause_on(2);
    let events = h.record_events();

    assert_eq!(h.orchestrator.run().await, RunOutcome::Stopped);
    assert_eq!(events.lock().last(), Some(&ProgressEvent::Stopped));
    assert_eq!(h.orchestrator.phase(), Phase::Paused);

    let session = h.orchestrator.session();
    assert!(session.is_paused);
    assert!(!session.is_capturing);
    assert_eq!(session.captured_pages.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

    let summary = progress(&h.store).summary().await.expect("summary").expect("saved");
    assert_eq!(summary.captured_page_numbers, vec![1, 2]);

    let status = h.orchestrator.status().await.expect("status");
    assert!(status.is_presentation);
    assert!(!status.is_capturing);
    assert_eq!(status.total_pages, 4);
    assert_eq!(status.captured_count, 2);

    assert!(h.orchestrator.run().await.is_completed());
    assert_eq!(h.screen.shots(), vec![1, 2, 3, 4]);
    assert_eq!(page_count(&h.sink.delivered.lock()[0].1), 4);
}

#[tokio::test]
async fn test_clear_drops_persisted_progress() {
    let h = Harness::new(3);
    h.screen.pause_on(2);
    assert_eq!(h.orchestrator.run().await, RunOutcome::Stopped);

    h.orchestrator.clear().await.expect("clear");

    let store = progress(&h.store);
    assert!(store.summary().await.expect("summary").is_none());
    assert!(h.store.get(&store.page_key(1)).await.expect("get").is_none());
    assert!(h.store.get(&store.page_key(2)).await.expect("get").is_none());
    assert_eq!(h.orchestrator.session().captured_count(), 0);
    assert_eq!(h.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_clear_during_run_discards_in_flight_capture() {
    let h = Harness::new(3);
    let gate = h.screen.hold();
    let events = h.record_events();

    let run = h.orchestrator.start();
    while h.screen.shots().is_empty() {
        tokio::task::yield_now().await;
    }

    h.orchestrator.clear().await.expect("clear");
    gate.add_permits(3);

    assert_eq!(run.await.expect("join"), RunOutcome::Stopped);
    assert_eq!(events.lock().last(), Some(&ProgressEvent::Stopped));
    assert_eq!(h.screen.shots(), vec![1]);

    let store = progress(&h.store);
    assert!(store.summary().await.expect("summary").is_none());
    assert!(h.store.get(&store.page_key(1)).await.expect("get").is_none());
    assert_eq!(h.orchestrator.session().captured_count(), 0);
    assert_eq!(h.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_clear_waits_for_in_flight_save() {
    let held = HeldStore::new();
    let gate = held.hold_meta();
    let h = Harness::with_store(FakeViewer::new(3), Arc::clone(&held) as Arc<dyn DurableStore>);

    let run = h.orchestrator.start();
    while held.meta_waiting() == 0 {
        tokio::task::yield_now().await;
    }
    let store = progress(&h.store);
    assert!(h.store.get(&store.page_key(1)).await.expect("get").is_some());

    let clearing = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.clear().await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!clearing.is_finished());

    gate.add_permits(16);
    clearing.await.expect("join").expect("clear");
    assert_eq!(run.await.expect("join"), RunOutcome::Stopped);

    assert!(store.summary().await.expect("summary").is_none());
    assert!(h.store.get(&store.page_key(1)).await.expect("get").is_none());
    assert!(h.store.get(&store.page_key(2)).await.expect("get").is_none());
    assert_eq!(h.orchestrator.session().captured_count(), 0);
    assert_eq!(h.orchestrator.status().await.expect("status").captured_count, 0);
}

#[tokio::test]
async fn test_auto_start_after_reload() {
    let h = Harness::new(2);
    h.orchestrator
        .arm_auto_start(&format!("{DECK_URL}?utm_source=mail"))
        .await
        .expect("arm");

    let handle = h
        .orchestrator
        .check_auto_start()
        .await
        .expect("check")
        .expect("auto-start fires");
    assert!(handle.await.expect("join").is_completed());

    let store = progress(&h.store);
    assert!(store.peek_auto_start().await.expect("peek").is_none());
    assert!(h.orchestrator.check_auto_start().await.expect("check").is_none());
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_resume_captures_only_missing_pages() {
    let h = Harness::new(5);
    seed(&h.store, DECK_URL, 5, &[1, 2, 4]).await;
    let events = h.record_events();

    assert!(h.orchestrator.run().await.is_completed());
    assert_eq!(h.screen.shots(), vec![3, 5]);
    assert_eq!(
        events.lock().first(),
        Some(&ProgressEvent::Capturing { progress: 3, total: 5 })
    );
    assert_eq!(page_count(&h.sink.delivered.lock()[0].1), 5);
}

#[tokio::test]
async fn test_missing_page_record_is_recaptured_and_persisted() {
    let h = Harness::new(4);
    h.screen.pause_on(1);
    assert_eq!(h.orchestrator.run().await, RunOutcome::Stopped);

    let store = progress(&h.store);
    h.store.remove(&store.page_key(1)).await.expect("remove");

    h.screen.pause_on(2);
    assert_eq!(h.orchestrator.run().await, RunOutcome::Stopped);
    assert_eq!(h.screen.shots(), vec![1, 1, 2]);
    assert!(h.store.get(&store.page_key(1)).await.expect("get").is_some());

    // What a new process would recover.
    let recovered = progress(&h.store).load().await.expect("load").expect("session");
    assert_eq!(recovered.captured_pages.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(pixel_of(&recovered.captured_pages[&1]), page_colour(1));
}

#[tokio::test]
async fn test_progress_of_another_document_is_discarded() {
    let h = Harness::new(3);
    seed(&h.store, "https://docsend.com/view/other", 7, &[1, 2, 5, 6]).await;
    h.viewer.never_render(3);

    let outcome = h.orchestrator.run().await;
    assert!(matches!(outcome, RunOutcome::Failed(ref f) if f.page == 3), "{outcome:?}");
    assert_eq!(h.screen.shots(), vec![1, 2]);

    let store = progress(&h.store);
    let summary = store.summary().await.expect("summary").expect("saved");
    assert_eq!(summary.document_url, DECK_URL);
    assert_eq!(summary.total_pages, 3);
    assert_eq!(summary.captured_page_numbers, vec![1, 2]);
    assert!(h.store.get(&store.page_key(5)).await.expect("get").is_none());
    assert!(h.store.get(&store.page_key(6)).await.expect("get").is_none());
}

#[tokio::test]
async fn test_restart_after_failure_resumes() {
    let h = Harness::new(4);
    h.viewer.never_render(3);
    let events = h.record_events();

    let outcome = h.orchestrator.run().await;
    let RunOutcome::Failed(failure) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(failure.page, 3);
    assert!(failure.message.contains("render"), "{}", failure.message);
    assert_eq!(
        events.lock().last(),
        Some(&ProgressEvent::page_error(3, failure.message.clone()))
    );

    let summary = progress(&h.store).summary().await.expect("summary").expect("saved");
    assert_eq!(summary.captured_page_numbers, vec![1, 2]);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].page, 3);

    // New process, page reloaded, viewer healthy again.
    h.viewer.heal();
    h.viewer.reload();
    let restarted = h.restart();

    assert!(restarted.orchestrator.run().await.is_completed());
    assert_eq!(restarted.screen.shots(), vec![3, 4]);
    assert_eq!(page_count(&restarted.sink.delivered.lock()[0].1), 4);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let viewer = FakeViewer::new(3);

    let first = Harness::with_store(
        Arc::clone(&viewer),
        Arc::new(FileStore::open(dir.path()).expect("open")),
    );
    first.screen.pause_on(1);
    assert_eq!(first.orchestrator.run().await, RunOutcome::Stopped);
    drop(first);

    let second = Harness::with_store(
        viewer,
        Arc::new(FileStore::open(dir.path()).expect("reopen")),
    );
    assert!(second.orchestrator.run().await.is_completed());
    assert_eq!(second.screen.shots(), vec![2, 3]);
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_stuck_navigation_fails_with_bounded_attempts() {
    let h = Harness::new(3);
    h.viewer.jam_next();
    let events = h.record_events();

    let outcome = h.orchestrator.run().await;
    let RunOutcome::Failed(failure) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(failure.page, 1);
    assert_eq!(failure.message, "Failed to navigate to page 2 after 5 attempts");
    assert_eq!(h.viewer.presses(), 5);
    assert_eq!(
        events.lock().last(),
        Some(&ProgressEvent::page_error(1, failure.message.clone()))
    );

    let summary = progress(&h.store).summary().await.expect("summary").expect("saved");
    assert_eq!(summary.captured_page_numbers, vec![1]);
}

// ============================================================================
// Assembly
// ============================================================================

#[tokio::test]
async fn test_assembly_failure_keeps_progress() {
    let h = Harness::with_parts(
        FakeViewer::new(3),
        Arc::new(deck_capture::MemoryStore::new()),
        Arc::new(FailingEncoder),
    );
    let events = h.record_events();

    let outcome = h.orchestrator.run().await;
    let RunOutcome::Failed(failure) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(failure.page, 0);
    assert_eq!(failure.message, "Document assembly failed: disk full");
    assert_eq!(
        events.lock().last(),
        Some(&ProgressEvent::page_error(0, failure.message.clone()))
    );
    assert_eq!(h.orchestrator.phase(), Phase::Error);
    assert!(h.sink.delivered.lock().is_empty());

    let summary = progress(&h.store).summary().await.expect("summary").expect("kept");
    assert_eq!(summary.captured_page_numbers, vec![1, 2, 3]);
    assert!(summary.errors.is_empty());

    // A healthy encoder picks up from the saved pages without recapturing.
    let retry = Harness::with_store(Arc::clone(&h.viewer), Arc::clone(&h.store));
    assert!(retry.orchestrator.run().await.is_completed());
    assert!(retry.screen.shots().is_empty());
    assert_eq!(page_count(&retry.sink.delivered.lock()[0].1), 3);
}
