//! End-to-end behaviour of `search_and_wait` against a scripted slskd.

use slskrr_search::{SearchCoordinator, SearchError};
use slskrr_slskd::testkit::FakeSlskd;
use slskrr_slskd::{PeerFile, SearchResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Helper to build a response from one peer
fn create_test_response(username: &str, files: &[(&str, u64)]) -> SearchResponse {
    SearchResponse {
        username: username.to_string(),
        file_count: files.len() as u64,
        files: files
            .iter()
            .map(|(name, size)| PeerFile {
                filename: name.to_string(),
                size: *size,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Let detached cleanup tasks run on the current-thread runtime
async fn drain_background_tasks() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn coordinator(fake: &Arc<FakeSlskd>) -> SearchCoordinator {
    SearchCoordinator::new(fake.clone())
}

#[tokio::test(start_paused = true)]
async fn test_completed_search_returns_full_responses() {
    let fake = Arc::new(FakeSlskd::new());
    fake.push_poll(0, false);
    fake.push_poll(5_000, false);
    fake.push_poll(6_000, true);
    let expected = vec![
        create_test_response("peer_a", &[("music\\a\\01.flac", 30_000_000)]),
        create_test_response("peer_b", &[("b/02.flac", 28_000_000), ("b/03.flac", 1)]),
    ];
    fake.set_responses(expected.clone());

    let started = Instant::now();
    let responses = coordinator(&fake)
        .search_and_wait("artist album", Duration::from_secs(30), &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(responses, expected);
    // 2s initial delay, 5s at zero progress, 1s at half progress.
    assert!(elapsed >= Duration::from_secs(8), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(9), "elapsed {elapsed:?}");
    assert_eq!(fake.polls(), vec![false, false, false, true]);

    drain_background_tasks().await;
    assert_eq!(fake.deleted_searches(), vec!["fake-search".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_backend_budget_is_eighty_percent_of_timeout() {
    let fake = Arc::new(FakeSlskd::new());
    fake.push_poll(0, true);

    coordinator(&fake)
        .search_and_wait("q", Duration::from_secs(30), &CancellationToken::new())
        .await
        .unwrap();

    let started = fake.started_searches();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].0, "q");
    assert_eq!(started[0].1, Duration::from_secs(24));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_partial_results() {
    let fake = Arc::new(FakeSlskd::new());
    fake.push_poll(10, false);
    let partial = vec![create_test_response("slow_peer", &[("x.mkv", 60_000_000)])];
    fake.set_responses(partial.clone());

    let started = Instant::now();
    let responses = coordinator(&fake)
        .search_and_wait("never finishes", Duration::from_secs(12), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(responses, partial);
    assert!(started.elapsed() >= Duration::from_secs(12));
    assert_eq!(fake.polls().last(), Some(&true));

    drain_background_tasks().await;
    assert_eq!(fake.deleted_searches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_results_is_empty_not_error() {
    let fake = Arc::new(FakeSlskd::new());

    let responses = coordinator(&fake)
        .search_and_wait("nothing", Duration::from_secs(1), &CancellationToken::new())
        .await
        .unwrap();

    assert!(responses.is_empty());
    // Deadline hit before the 2s initial delay: only the final fetch happened.
    assert_eq!(fake.polls(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_wins_over_deadline_and_skips_results() {
    let fake = Arc::new(FakeSlskd::new());
    fake.set_responses(vec![create_test_response("p", &[("f", 1)])]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let err = coordinator(&fake)
        .search_and_wait("q", Duration::from_secs(30), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Cancelled));
    assert!(fake.polls().iter().all(|include| !include));

    // Cleanup is detached from the cancelled request.
    drain_background_tasks().await;
    assert_eq!(fake.deleted_searches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_aborts_before_polling() {
    let fake = Arc::new(FakeSlskd::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = coordinator(&fake)
        .search_and_wait("q", Duration::from_secs(30), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Cancelled));
    assert!(fake.polls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission_is_reported() {
    let fake = Arc::new(FakeSlskd::new());
    fake.reject_searches();

    let err = coordinator(&fake)
        .search_and_wait("q", Duration::from_secs(30), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Submission(_)));
    assert!(fake.polls().is_empty());
    drain_background_tasks().await;
    assert!(fake.deleted_searches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_is_transport_error_and_still_cleans_up() {
    let fake = Arc::new(FakeSlskd::new());
    fake.push_poll(10, false);

    let trigger = fake.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.fail_polls(true);
    });

    let started = Instant::now();
    let err = coordinator(&fake)
        .search_and_wait("q", Duration::from_secs(30), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Transport(_)));
    // First poll at 2s succeeds, the second one after the 5s back-off fails.
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(fake.polls(), vec![false, false]);

    drain_background_tasks().await;
    assert_eq!(fake.deleted_searches(), vec!["fake-search".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_at_deadline_is_transport_error() {
    let fake = Arc::new(FakeSlskd::new());
    fake.push_poll(10, false);
    fake.set_responses(vec![create_test_response("p", &[("f", 1)])]);
    fake.fail_fetches(true);

    let err = coordinator(&fake)
        .search_and_wait("q", Duration::from_secs(4), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Transport(_)));
    assert_eq!(fake.polls(), vec![false, true]);

    drain_background_tasks().await;
    assert_eq!(fake.deleted_searches().len(), 1);
}
