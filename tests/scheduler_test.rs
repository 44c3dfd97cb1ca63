mod support;

use std::time::{Duration, Instant};

use ondeck_optimizer::scheduler;
use support::{context, setup_pool, write_secrets, FakeConnector, FakeDirectory};
use tempfile::tempdir;

/// Advances paused time until `done` holds, bounded by a wall-clock deadline.
async fn advance_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    done()
}

#[tokio::test]
async fn fire_time_runs_a_cycle_and_keeps_going_after_failures() {
    let pool = setup_pool().await;
    let td = tempdir().unwrap();
    let path = write_secrets(
        td.path(),
        r#"{"PLEX_USERNAME": "owner", "PLEX_PASSWORD": "wrong"}"#,
    );
    let connector = FakeConnector::failing();
    let ctx = context(pool, &connector, path);
    tokio::time::pause();

    let handle = scheduler::spawn(ctx, scheduler::parse_schedule("* * * * * *").unwrap());

    assert!(advance_until(|| connector.connects() >= 1).await);
    assert!(advance_until(|| connector.connects() >= 2).await);
    assert!(!handle.is_finished());
    handle.abort();
}

#[tokio::test]
async fn nothing_runs_before_the_fire_time() {
    let pool = setup_pool().await;
    let td = tempdir().unwrap();
    let path = write_secrets(
        td.path(),
        r#"{"PLEX_USERNAME": "owner", "PLEX_PASSWORD": "secret"}"#,
    );
    let connector = FakeConnector::new(FakeDirectory::new());
    let ctx = context(pool, &connector, path);
    tokio::time::pause();

    // Fires once a year, on New Year's midnight.
    let handle = scheduler::spawn(ctx, scheduler::parse_schedule("0 0 0 1 1 *").unwrap());
    tokio::task::yield_now().await;

    assert_eq!(connector.connects(), 0);
    assert!(!handle.is_finished());
    handle.abort();
}
