//! Fixed-interval expiration sweeper for idlink.
//!
//! Pending verifications are only ever expired by comparing timestamps;
//! nothing holds a timer per session. This crate provides the one
//! recurring timer that periodically asks the session layer to evict
//! stale sessions, which keeps the persisted snapshot small.
//!
//! Correctness does not depend on it: confirmation sweeps lazily before
//! matching a code. A missed tick only delays cleanup to the next one,
//! so there is no catch-up and no retry.
//!
//! # Integration
//!
//! [`run_sweeper`] drives a [`SweepScheduler`] and follows a
//! [`SweepControl`] channel that can pause, resume or stop it:
//!
//! ```ignore
//! let (control_tx, control_rx) = tokio::sync::watch::channel(SweepControl::Run);
//! let task = tokio::spawn(run_sweeper(
//!     SweepScheduler::new(SweepConfig::default()),
//!     control_rx,
//!     move || {
//!         let service = service.clone();
//!         async move { service.sweep_expired().await }
//!     },
//! ));
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. Default: 60 seconds.
    pub interval: Duration,
    /// Random delay (0–max) added to the first sweep only.
    pub initial_jitter: Duration,
    /// `false` turns the sweeper off: [`SweepScheduler::wait_for_sweep`]
    /// then pends forever and only lazy eviction remains.
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_jitter: Duration::ZERO,
            enabled: true,
        }
    }
}

impl SweepConfig {
    /// Shortest interval accepted.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Create an enabled config with the given interval.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`SweepScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "sweep interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

/// Desired state of a running sweeper, sent over a `watch` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SweepControl {
    /// Sweep on the configured cadence.
    #[default]
    Run,
    /// Hold sweeps until set back to `Run`.
    Pause,
    /// Exit the driver loop.
    Stop,
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Information about a due sweep, returned by
/// [`SweepScheduler::wait_for_sweep`].
#[derive(Debug, Clone)]
pub struct SweepTick {
    /// Monotonically increasing sweep number (starts at 1).
    pub sweep: u64,
    /// How far past its deadline this sweep woke up.
    pub late_by: Duration,
    /// Whole intervals that passed without a sweep (0 normally).
    pub missed: u64,
}

/// Running totals for the sweeper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepMetrics {
    /// Sweeps that fired.
    pub total_sweeps: u64,
    /// Pending sessions removed across all sweeps.
    pub total_removed: u64,
    /// Intervals skipped because the sweeper woke up late.
    pub total_missed: u64,
    /// Sessions removed by the most recent sweep.
    pub last_removed: usize,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval scheduler for expiration sweeps.
pub struct SweepScheduler {
    config: SweepConfig,
    sweep_count: u64,
    /// When the next sweep is due (Tokio instant for `sleep_until`).
    next_sweep: Instant,
    paused: bool,
    metrics: SweepMetrics,
}

impl SweepScheduler {
    /// Create a new scheduler. The first sweep is due one interval (plus
    /// jitter) from now.
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_us = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max_us))
        };
        let next_sweep = Instant::now() + config.interval + jitter;

        debug!(
            interval_secs = config.interval.as_secs_f64(),
            enabled = config.enabled,
            "sweep scheduler created"
        );

        Self {
            config,
            sweep_count: 0,
            next_sweep,
            paused: false,
            metrics: SweepMetrics::default(),
        }
    }

    /// Wait until the next sweep is due.
    ///
    /// When disabled or paused this future pends forever, which is fine
    /// inside `tokio::select!`: the other branches still run.
    pub async fn wait_for_sweep(&mut self) -> SweepTick {
        if !self.config.enabled || self.paused {
            std::future::pending::<()>().await;
        }

        let due = self.next_sweep;
        time::sleep_until(due).await;

        let now = Instant::now();
        let interval = self.config.interval;
        let late_by = now.saturating_duration_since(due);
        let missed = (late_by.as_nanos() / interval.as_nanos()) as u64;
        if missed > 0 {
            warn!(
                sweep = self.sweep_count + 1,
                missed,
                late_ms = late_by.as_millis() as u64,
                "sweeper fell behind, skipping ahead"
            );
        }

        // Always schedule from now; missed sweeps are never caught up.
        self.next_sweep = now + interval;
        self.sweep_count += 1;
        self.metrics.total_sweeps += 1;
        self.metrics.total_missed += missed;

        trace!(sweep = self.sweep_count, "sweep due");

        SweepTick {
            sweep: self.sweep_count,
            late_by,
            missed,
        }
    }

    /// Record how many sessions the sweep just removed.
    pub fn record_sweep(&mut self, removed: usize) {
        self.metrics.last_removed = removed;
        self.metrics.total_removed += removed as u64;
        if removed > 0 {
            debug!(sweep = self.sweep_count, removed, "sweep removed sessions");
        }
    }

    /// Pause sweeping. Safe to call multiple times.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(sweep = self.sweep_count, "sweep scheduler paused");
        }
    }

    /// Resume after a pause. The next sweep is due one interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_sweep = Instant::now() + self.config.interval;
            debug!(sweep = self.sweep_count, "sweep scheduler resumed");
        }
    }

    /// Whether the scheduler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether sweeping is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Number of sweeps fired so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// The (validated) interval between sweeps.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Runs sweeps on `scheduler`'s cadence until `control` says
/// [`SweepControl::Stop`] (or its sender is dropped). Returns the final
/// metrics.
///
/// [`SweepControl::Pause`] holds sweeps; switching back to
/// [`SweepControl::Run`] schedules the next one a full interval later.
///
/// `sweep` is called once per due tick and returns how many sessions it
/// removed. It should reach the session layer only through its public
/// operations.
pub async fn run_sweeper<F, Fut>(
    mut scheduler: SweepScheduler,
    mut control: watch::Receiver<SweepControl>,
    mut sweep: F,
) -> SweepMetrics
where
    F: FnMut() -> Fut,
    Fut: Future<Output = usize>,
{
    tracing::info!(
        interval_secs = scheduler.interval().as_secs_f64(),
        "expiration sweeper running"
    );

    loop {
        let state = *control.borrow_and_update();
        match state {
            SweepControl::Stop => break,
            SweepControl::Pause => scheduler.pause(),
            SweepControl::Run => scheduler.resume(),
        }
        tokio::select! {
            changed = control.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can ask us to stop any more.
                    break;
                }
            }
            _ = scheduler.wait_for_sweep() => {
                let removed = sweep().await;
                scheduler.record_sweep(removed);
            }
        }
    }

    tracing::info!(
        sweeps = scheduler.metrics().total_sweeps,
        removed = scheduler.metrics().total_removed,
        "expiration sweeper stopped"
    );
    scheduler.metrics().clone()
}
