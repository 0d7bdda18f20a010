//! # Boost Debouncer
//!
//! Turns an irregular stream of activity signals into a single boost/unboost cycle.
//!
//! A single worker task owns the cycle state and serializes everything that can change
//! it: incoming activity, the unboost deadline, and the stop request. Producers never
//! touch that state; they only hand the worker a request through an [`ActivitySink`].
//!
//! ## State machine
//!
//! | State      | Event      | Action                                            | Next       |
//! |------------|------------|---------------------------------------------------|------------|
//! | `Idle`     | activity   | raise the floor, arm deadline at now + duration   | `Boosting` |
//! | `Boosting` | activity   | re-arm deadline at now + duration                 | `Boosting` |
//! | `Boosting` | deadline   | restore the default floor                         | `Idle`     |
//!
//! Activity is always polled before the deadline, so a signal that is ready at the same
//! instant the deadline elapses refreshes the window instead of letting it close. If the
//! deadline was handled first, the signal raises the floor again right after.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use input_boost::{
//!     config::SharedConfig,
//!     constraint::{ConstraintController, SysfsCpuFreq},
//!     debouncer::Debouncer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> input_boost::Result<()> {
//!     let controller = Arc::new(ConstraintController::new(SysfsCpuFreq::new()));
//!     controller.init()?;
//!
//!     let mut debouncer = Debouncer::spawn(controller.clone(), SharedConfig::default());
//!     debouncer.sink().on_activity();
//!
//!     debouncer.stop().await?;
//!     controller.shutdown()
//! }
//! ```

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    config::SharedConfig,
    constraint::ConstraintController,
    error::{Error, Result},
};

/// How long [`Debouncer::stop`] waits for the worker to wind down
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters describing what the debouncer has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoostStats {
    /// Idle to boosting transitions
    pub boosts: u64,
    /// Deadline refreshes while already boosting
    pub refreshes: u64,
    /// Boosting to idle transitions
    pub unboosts: u64,
    /// Signals discarded because a request was already pending
    pub dropped: u64,
    /// Raises that failed and left the floor untouched
    pub failed_raises: u64,
}

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicBool,
    stopped: AtomicBool,
    boosting: AtomicBool,
    stats: Mutex<BoostStats>,
}

/// Handle used by activity sources to report input
///
/// Cloning is cheap and every clone feeds the same debouncer.
#[derive(Debug, Clone)]
pub struct ActivitySink {
    shared: Arc<Shared>,
    tx: mpsc::Sender<()>,
}

impl ActivitySink {
    /// Reports one activity signal
    ///
    /// Never blocks. If a request is already queued for the worker the signal is folded
    /// into it; after the debouncer stopped it is ignored.
    pub fn on_activity(&self) {
        if self.shared.stopped.load(Ordering::Acquire) {
            return;
        }
        if self.shared.pending.swap(true, Ordering::AcqRel) {
            self.shared.stats.lock().dropped += 1;
            return;
        }
        if self.tx.try_send(()).is_err() {
            // worker is gone
            self.shared.pending.store(false, Ordering::Release);
        }
    }

    /// Whether the owning debouncer has been stopped
    pub fn is_closed(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire) || self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoostCycle {
    Idle,
    Boosting { deadline: Instant },
}

struct Worker {
    controller: Arc<ConstraintController>,
    config: SharedConfig,
    shared: Arc<Shared>,
    cycle: BoostCycle,
}

impl Worker {
    async fn run(mut self, mut activity_rx: mpsc::Receiver<()>, mut stop_rx: oneshot::Receiver<()>) {
        loop {
            let deadline = match self.cycle {
                BoostCycle::Boosting { deadline } => Some(deadline),
                BoostCycle::Idle => None,
            };
            let sleep = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now));
            tokio::pin!(sleep);

            tokio::select! {
                biased;

                _ = &mut stop_rx => break,
                request = activity_rx.recv() => match request {
                    Some(()) => {
                        self.shared.pending.store(false, Ordering::Release);
                        self.on_activity();
                    },
                    None => break,
                },
                _ = &mut sleep, if deadline.is_some() => self.on_deadline(),
            }
        }

        if matches!(self.cycle, BoostCycle::Boosting { .. }) {
            tracing::debug!("debouncer stopped with a pending unboost deadline");
        }
        self.shared.boosting.store(false, Ordering::Release);
    }

    fn on_activity(&mut self) {
        let duration = self.config.boost_duration();
        let deadline = Instant::now() + duration;

        match self.cycle {
            BoostCycle::Idle => {
                let value = self.config.boost_value();
                if let Err(e) = self.controller.raise(value) {
                    match e {
                        // the controller reports this once itself
                        Error::ConstraintUnavailable => tracing::debug!("boost not applied: {}", e),
                        _ => tracing::warn!("boost not applied: {}", e),
                    }
                    self.shared.stats.lock().failed_raises += 1;
                    return;
                }
                tracing::info!("Input detected. Boosting for {} msec", duration.as_millis());
                self.shared.boosting.store(true, Ordering::Release);
                self.shared.stats.lock().boosts += 1;
            },
            BoostCycle::Boosting { .. } => {
                tracing::debug!(boost_duration_ms = duration.as_millis() as u64, "boost window refreshed");
                self.shared.stats.lock().refreshes += 1;
            },
        }

        self.cycle = BoostCycle::Boosting { deadline };
    }

    fn on_deadline(&mut self) {
        tracing::info!("Unboosting now");
        if let Err(e) = self.controller.restore_default() {
            tracing::warn!("failed to restore default floor: {}", e);
        }
        self.cycle = BoostCycle::Idle;
        self.shared.boosting.store(false, Ordering::Release);
        self.shared.stats.lock().unboosts += 1;
    }
}

/// Owner of the worker task that applies the boost policy
///
/// Each instance is independent; several can run side by side against different
/// controllers.
pub struct Debouncer {
    shared: Arc<Shared>,
    activity_tx: mpsc::Sender<()>,
    stop_tx: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("boosting", &self.is_boosting())
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl Debouncer {
    /// Starts the worker task on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn(controller: Arc<ConstraintController>, config: SharedConfig) -> Self {
        // one slot is enough: the pending flag keeps at most one request queued
        let (activity_tx, activity_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        let shared = Arc::new(Shared::default());

        let worker = Worker { controller, config, shared: shared.clone(), cycle: BoostCycle::Idle };
        let handle = tokio::spawn(worker.run(activity_rx, stop_rx));

        Self { shared, activity_tx, stop_tx: Some(stop_tx), worker: Some(handle) }
    }

    /// New handle for reporting activity
    pub fn sink(&self) -> ActivitySink {
        ActivitySink { shared: self.shared.clone(), tx: self.activity_tx.clone() }
    }

    pub fn is_boosting(&self) -> bool {
        self.shared.boosting.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> BoostStats {
        *self.shared.stats.lock()
    }

    /// Stops the worker and abandons any pending deadline
    ///
    /// The floor is left as is; restoring it is the controller owner's job. Calling this
    /// more than once is fine.
    pub async fn stop(&mut self) -> Result<()> {
        self.shared.stopped.store(true, Ordering::Release);

        if let Some(stop_tx) = self.stop_tx.take() {
            // the worker may already be gone
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.worker.take() {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(result) => result.map_err(|e| Error::system(format!("debouncer task panicked: {e}")))?,
                Err(_) => return Err(Error::system("timed out waiting for debouncer task to stop")),
            }
        }

        Ok(())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if let Some(stop_tx) = self.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            handle.abort();
        }
    }
}
