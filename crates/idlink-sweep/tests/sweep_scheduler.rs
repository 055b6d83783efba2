//! Integration tests for the expiration sweep scheduler.
//!
//! Uses paused Tokio time so `sleep_until` resolves as soon as every
//! task is idle and the clock can be advanced by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use idlink_sweep::{SweepConfig, SweepControl, SweepMetrics, SweepScheduler, run_sweeper};
use tokio::sync::watch;

// =========================================================================
// Helpers
// =========================================================================

fn every_minute() -> SweepConfig {
    SweepConfig::every(Duration::from_secs(60))
}

/// Timer deadlines round up to the next millisecond.
fn assert_elapsed(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(1),
        "expected ~{expected:?}, got {actual:?}"
    );
}

// =========================================================================
// SweepConfig
// =========================================================================

#[test]
fn test_default_config_sweeps_every_minute() {
    let cfg = SweepConfig::default();
    assert_eq!(cfg.interval, Duration::from_secs(60));
    assert_eq!(cfg.initial_jitter, Duration::ZERO);
    assert!(cfg.enabled);
}

#[test]
fn test_validated_clamps_tiny_interval() {
    let cfg = SweepConfig::every(Duration::from_millis(10)).validated();
    assert_eq!(cfg.interval, SweepConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_keeps_sane_interval() {
    let cfg = SweepConfig::every(Duration::from_secs(30)).validated();
    assert_eq!(cfg.interval, Duration::from_secs(30));
}

// =========================================================================
// Scheduler creation and accessors
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_initial_state() {
    let s = SweepScheduler::new(every_minute());
    assert_eq!(s.sweep_count(), 0);
    assert_eq!(s.interval(), Duration::from_secs(60));
    assert!(s.is_enabled());
    assert!(!s.is_paused());
    assert_eq!(s.metrics(), &SweepMetrics::default());
}

// =========================================================================
// Waiting for sweeps
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_sweep_fires_after_one_interval() {
    let start = tokio::time::Instant::now();
    let mut s = SweepScheduler::new(every_minute());

    let tick = s.wait_for_sweep().await;

    assert_eq!(tick.sweep, 1);
    assert_eq!(tick.missed, 0);
    assert_elapsed(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_numbers_increase() {
    let mut s = SweepScheduler::new(every_minute());

    for expected in 1..=3 {
        let tick = s.wait_for_sweep().await;
        assert_eq!(tick.sweep, expected);
    }
    assert_eq!(s.sweep_count(), 3);
    assert_eq!(s.metrics().total_sweeps, 3);
}

#[tokio::test(start_paused = true)]
async fn test_late_sweep_skips_missed_intervals() {
    let mut s = SweepScheduler::new(every_minute());
    s.wait_for_sweep().await;

    // Next sweep is due in 60s; oversleep by 90s past that deadline.
    tokio::time::advance(Duration::from_secs(150)).await;
    let tick = s.wait_for_sweep().await;

    assert_eq!(tick.sweep, 2);
    assert_eq!(tick.late_by, Duration::from_secs(90));
    assert_eq!(tick.missed, 1);
    assert_eq!(s.metrics().total_missed, 1);

    // Rescheduled from now, not from the stale deadline.
    let before = tokio::time::Instant::now();
    let tick = s.wait_for_sweep().await;
    assert_eq!(tick.missed, 0);
    assert_elapsed(before.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_only_first_sweep() {
    let start = tokio::time::Instant::now();
    let mut s = SweepScheduler::new(SweepConfig {
        initial_jitter: Duration::from_secs(5),
        ..every_minute()
    });

    s.wait_for_sweep().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_secs(60));
    assert!(first <= Duration::from_secs(65) + Duration::from_millis(1));

    let before = tokio::time::Instant::now();
    s.wait_for_sweep().await;
    assert_elapsed(before.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_scheduler_never_fires() {
    let mut s = SweepScheduler::new(SweepConfig {
        enabled: false,
        ..every_minute()
    });

    let fired = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_sweep()).await;

    assert!(fired.is_err());
    assert_eq!(s.sweep_count(), 0);
}

// =========================================================================
// Pause / resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_paused_scheduler_never_fires() {
    let mut s = SweepScheduler::new(every_minute());
    s.pause();

    let fired = tokio::time::timeout(Duration::from_secs(600), s.wait_for_sweep()).await;

    assert!(fired.is_err());
    assert!(s.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_are_idempotent() {
    let mut s = SweepScheduler::new(every_minute());
    s.pause();
    s.pause();
    assert!(s.is_paused());

    s.resume();
    s.resume();
    assert!(!s.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_resume_schedules_one_interval_ahead() {
    let mut s = SweepScheduler::new(every_minute());
    s.pause();
    tokio::time::advance(Duration::from_secs(300)).await;
    s.resume();

    let before = tokio::time::Instant::now();
    let tick = s.wait_for_sweep().await;

    assert_eq!(tick.missed, 0);
    assert_elapsed(before.elapsed(), Duration::from_secs(60));
}

// =========================================================================
// Metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_sweep_accumulates_removed() {
    let mut s = SweepScheduler::new(every_minute());

    s.wait_for_sweep().await;
    s.record_sweep(3);
    s.wait_for_sweep().await;
    s.record_sweep(0);

    let m = s.metrics();
    assert_eq!(m.total_sweeps, 2);
    assert_eq!(m.total_removed, 3);
    assert_eq!(m.last_removed, 0);
}

// =========================================================================
// Driver
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_run_sweeper_sweeps_until_stopped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (control_tx, control_rx) = watch::channel(SweepControl::Run);

    let counter = calls.clone();
    let task = tokio::spawn(run_sweeper(
        SweepScheduler::new(every_minute()),
        control_rx,
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                2
            }
        },
    ));

    tokio::time::sleep(Duration::from_secs(185)).await;
    control_tx.send(SweepControl::Stop).unwrap();
    let metrics = task.await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(metrics.total_sweeps, 3);
    assert_eq!(metrics.total_removed, 6);
    assert_eq!(metrics.last_removed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_sweeper_stops_when_sender_dropped() {
    let (control_tx, control_rx) = watch::channel(SweepControl::Run);
    let task = tokio::spawn(run_sweeper(
        SweepScheduler::new(every_minute()),
        control_rx,
        || async { 0 },
    ));

    drop(control_tx);
    let metrics = task.await.unwrap();

    assert_eq!(metrics.total_sweeps, 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_sweeper_exits_immediately_if_already_stopped() {
    let (_control_tx, control_rx) = watch::channel(SweepControl::Stop);

    let metrics = run_sweeper(
        SweepScheduler::new(every_minute()),
        control_rx,
        || async { 1 },
    )
    .await;

    assert_eq!(metrics, SweepMetrics::default());
}

#[tokio::test(start_paused = true)]
async fn test_run_sweeper_holds_sweeps_while_paused() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (control_tx, control_rx) = watch::channel(SweepControl::Pause);

    let counter = calls.clone();
    let task = tokio::spawn(run_sweeper(
        SweepScheduler::new(every_minute()),
        control_rx,
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                0
            }
        },
    ));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Resuming waits a full interval before the next sweep.
    control_tx.send(SweepControl::Run).unwrap();
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    control_tx.send(SweepControl::Stop).unwrap();
    let metrics = task.await.unwrap();
    assert_eq!(metrics.total_sweeps, 1);
}
