//! End-to-end tests for the supervisor runner using shell scripts as children.

use std::time::{Duration, Instant};

use confd_sidecar::process::{ExitOutcome, LaunchError, LaunchSpec, ProcessRole};
use confd_sidecar::supervisor::{Supervisor, SupervisorError};
use tokio_util::sync::CancellationToken;

use crate::common::{script, wait_for_file, wait_for_term};

const WINDOW: Duration = Duration::from_millis(200);

fn supervisor(watcher: &std::path::Path, worker: &std::path::Path) -> Supervisor {
    Supervisor::new(
        LaunchSpec::new(watcher.to_string_lossy()),
        LaunchSpec::new(worker.to_string_lossy()),
    )
    .with_settle_window(WINDOW)
}

#[tokio::test]
async fn watcher_exit_terminates_worker_and_propagates_status() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = script(dir.path(), "watcher", "sleep 0.6\nexit 2\n");
    let worker = script(dir.path(), "worker", &wait_for_term(0));

    let report = supervisor(&watcher, &worker).run().await.unwrap();

    assert_eq!(report.watcher, Some(ExitOutcome::Exited(2)));
    assert_eq!(report.worker, Some(ExitOutcome::Exited(0)));
    assert_eq!(report.exit_code, 2);
}

#[tokio::test]
async fn worker_status_wins_over_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = script(dir.path(), "watcher", &wait_for_term(1));
    let worker = script(dir.path(), "worker", "sleep 0.2\nexit 3\n");

    let report = supervisor(&watcher, &worker).run().await.unwrap();

    assert_eq!(report.watcher, Some(ExitOutcome::Exited(1)));
    assert_eq!(report.worker, Some(ExitOutcome::Exited(3)));
    assert_eq!(report.exit_code, 3);
}

#[tokio::test]
async fn termination_request_stops_both_children() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = script(dir.path(), "watcher", &wait_for_term(0));
    let worker = script(dir.path(), "worker", &wait_for_term(5));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let report = supervisor(&watcher, &worker)
        .with_cancellation(cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(report.watcher, Some(ExitOutcome::Exited(0)));
    assert_eq!(report.worker, Some(ExitOutcome::Exited(5)));
    assert_eq!(report.exit_code, 5);
}

#[tokio::test]
async fn termination_before_settling_never_starts_worker() {
    let dir = tempfile::tempdir().unwrap();
    let started = dir.path().join("worker-started");
    let watcher = script(dir.path(), "watcher", &wait_for_term(0));
    let worker = script(
        dir.path(),
        "worker",
        &format!("touch '{}'\n", started.display()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = Supervisor::new(
        LaunchSpec::new(watcher.to_string_lossy()),
        LaunchSpec::new(worker.to_string_lossy()),
    )
    .with_settle_window(Duration::from_secs(5))
    .with_cancellation(cancel)
    .run()
    .await
    .unwrap();

    // The watcher may die before its trap is installed, so only its presence is checked.
    assert!(report.watcher.is_some());
    assert!(report.worker.is_none());
    assert!(!started.exists());
}

#[tokio::test]
async fn burst_of_changes_reloads_worker_once() {
    let dir = tempfile::tempdir().unwrap();
    let hups = dir.path().join("hups");
    let watcher = script(
        dir.path(),
        "watcher",
        "sleep 0.5\n\
         for i in 1 2 3; do\n\
           echo \"INFO Target config /etc/app$i.conf has been updated\" >&2\n\
           sleep 0.05\n\
         done\n\
         sleep 1\n\
         exit 0\n",
    );
    let worker = script(
        dir.path(),
        "worker",
        &format!(
            "trap 'echo hup >> \"{}\"' HUP\n{}",
            hups.display(),
            wait_for_term(0)
        ),
    );

    let report = supervisor(&watcher, &worker).run().await.unwrap();

    assert_eq!(report.stats.changes, 3);
    assert_eq!(report.stats.stale_changes, 0);
    assert_eq!(report.stats.reloads, 1);
    assert_eq!(std::fs::read_to_string(&hups).unwrap(), "hup\n");
    assert_eq!(report.exit_code, 0);
}

#[tokio::test]
async fn changes_while_settling_delay_worker_launch() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = script(
        dir.path(),
        "watcher",
        &format!(
            "for i in 1 2 3 4 5; do\n\
               echo \"INFO Target config /etc/app$i.conf has been updated\" >&2\n\
               sleep 0.1\n\
             done\n{}",
            wait_for_term(0)
        ),
    );
    let worker = script(dir.path(), "worker", "exit 0\n");

    let started = Instant::now();
    let report = Supervisor::new(
        LaunchSpec::new(watcher.to_string_lossy()),
        LaunchSpec::new(worker.to_string_lossy()),
    )
    .with_settle_window(Duration::from_millis(300))
    .run()
    .await
    .unwrap();

    // The fifth marker is printed at least 400ms in; the worker follows one window later.
    assert!(started.elapsed() >= Duration::from_millis(700));
    assert_eq!(report.stats.changes, 5);
    assert_eq!(report.stats.reloads, 0);
    assert_eq!(report.worker, Some(ExitOutcome::Exited(0)));
    assert_eq!(report.exit_code, 0);
}

#[tokio::test]
async fn missing_worker_is_fatal_and_stops_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let stopped = dir.path().join("watcher-stopped");
    let watcher = script(
        dir.path(),
        "watcher",
        &format!(
            "trap 'touch \"{}\"; exit 0' TERM\nwhile :; do sleep 0.05; done\n",
            stopped.display()
        ),
    );

    let err = Supervisor::new(
        LaunchSpec::new(watcher.to_string_lossy()),
        LaunchSpec::new("/nonexistent/worker"),
    )
    .with_settle_window(Duration::from_millis(300))
    .run()
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        SupervisorError::Launch(LaunchError::NotFound {
            role: ProcessRole::Worker,
            ..
        })
    ));
    assert!(wait_for_file(&stopped, Duration::from_secs(3)).await);
}
