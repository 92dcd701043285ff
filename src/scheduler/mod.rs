//! Periodic transmitters.
//!
//! Each scheduler is one tokio task driving a [`PeriodicJob`] off an interval
//! timer. A tick always runs to completion before the next one is armed, and
//! the shared stop token is raced against every wait, so a scheduler winds
//! down within one period of the stop request without sending again.

mod heartbeat;
mod keyframe;

pub use heartbeat::{spawn_heartbeat, Heartbeat};
pub use keyframe::{spawn_keyframe, KeyframeRequester};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Work performed on every tick of a scheduler.
#[async_trait]
pub trait PeriodicJob: Send + 'static {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    /// One unit of work. Errors are counted and logged, never fatal.
    async fn tick(&mut self) -> Result<()>;

    /// Called once after the last tick.
    async fn on_stop(&mut self) {}
}

#[derive(Debug, Default)]
struct SchedulerStats {
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl SchedulerStats {
    fn report(&self, name: &'static str) -> SchedulerReport {
        SchedulerReport {
            name,
            ticks: self.ticks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Counters for a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub name: &'static str,
    /// Ticks whose job completed successfully.
    pub ticks: u64,
    /// Ticks whose job returned an error.
    pub failures: u64,
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    name: &'static str,
    state: watch::Receiver<SchedulerState>,
    stats: Arc<SchedulerStats>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == SchedulerState::Stopped
    }

    /// Watch channel for state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Snapshot of the counters.
    pub fn report(&self) -> SchedulerReport {
        self.stats.report(self.name)
    }

    /// Wait for the task to finish.
    pub async fn join(self) -> Result<SchedulerReport> {
        let Self {
            name, stats, task, ..
        } = self;

        task.await
            .map_err(|e| Error::TaskFailed(format!("{name} scheduler: {e}")))?;

        Ok(stats.report(name))
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Run `job` every `period` until `stop` fires.
///
/// The first tick happens immediately.
pub fn spawn<J: PeriodicJob>(mut job: J, period: Duration, stop: CancellationToken) -> SchedulerHandle {
    let name = job.name();
    let (state_tx, state_rx) = watch::channel(SchedulerState::Running);
    let stats = Arc::new(SchedulerStats::default());
    let task_stats = Arc::clone(&stats);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(scheduler = name, ?period, "Scheduler started");

        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                _ = interval.tick() => {}
            }

            match job.tick().await {
                Ok(()) => {
                    task_stats.ticks.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    task_stats.failures.fetch_add(1, Ordering::Relaxed);
                    if e.is_closed() {
                        debug!(scheduler = name, "Tick skipped, socket closed");
                    } else if e.is_recoverable() {
                        warn!(scheduler = name, error = %e, "Tick failed");
                    } else {
                        error!(scheduler = name, error = %e, "Tick failed");
                    }
                }
            }
        }

        job.on_stop().await;
        state_tx.send_replace(SchedulerState::Stopped);
        let report = task_stats.report(name);
        debug!(
            scheduler = name,
            ticks = report.ticks,
            failures = report.failures,
            "Scheduler stopped"
        );
    });

    SchedulerHandle {
        name,
        state: state_rx,
        stats,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    struct Counter {
        fail_every: u64,
        calls: Arc<AtomicU64>,
        stopped: Arc<AtomicU64>,
    }

    #[async_trait]
    impl PeriodicJob for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn tick(&mut self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every != 0 && n % self.fail_every == 0 {
                return Err(TransportError::SendFailed("boom".into()).into());
            }
            Ok(())
        }

        async fn on_stop(&mut self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter(fail_every: u64) -> (Counter, Arc<AtomicU64>, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        let stopped = Arc::new(AtomicU64::new(0));
        let job = Counter {
            fail_every,
            calls: Arc::clone(&calls),
            stopped: Arc::clone(&stopped),
        };
        (job, calls, stopped)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_period() {
        let (job, calls, _) = counter(0);
        let stop = CancellationToken::new();
        let handle = spawn(job, Duration::from_millis(10), stop.clone());

        tokio::time::sleep(Duration::from_millis(95)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(handle.state(), SchedulerState::Running);

        stop.cancel();
        let report = handle.join().await.unwrap();
        assert_eq!(report.ticks, 10);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_halt() {
        let (job, calls, _) = counter(2);
        let stop = CancellationToken::new();
        let handle = spawn(job, Duration::from_millis(10), stop.clone());

        tokio::time::sleep(Duration::from_millis(55)).await;
        stop.cancel();
        let report = handle.join().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_long_period() {
        let (job, calls, stopped) = counter(0);
        let stop = CancellationToken::new();
        let handle = spawn(job, Duration::from_secs(60), stop.clone());
        let mut state = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(5)).await;
        stop.cancel();

        tokio::time::timeout(
            Duration::from_millis(10),
            state.wait_for(|s| *s == SchedulerState::Stopped),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(handle.is_stopped());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_first_tick() {
        let (job, calls, stopped) = counter(0);
        let stop = CancellationToken::new();
        stop.cancel();

        let report = spawn(job, Duration::from_millis(10), stop).join().await.unwrap();
        assert_eq!(report.ticks, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }
}
