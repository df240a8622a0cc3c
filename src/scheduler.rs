//! Periodic trigger for the primary's heartbeat.
//!
//! The coordinator never owns an event loop. It hands a tick task to a
//! [`HeartbeatScheduler`], which either runs it on a background thread
//! ([`ThreadScheduler`]) or leaves firing to the host ([`ManualScheduler`]).
//! Either way a tick runs to completion before the next one starts, and
//! `stop` returns only after an in-flight tick has finished. A task that
//! returns [`TickControl::Stop`] ends its own schedule.

use crate::error::{AppLockError, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// What the scheduler should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Work run on every tick.
pub type TickTask = Box<dyn FnMut() -> TickControl + Send + 'static>;

/// Drives a tick task at a fixed interval.
pub trait HeartbeatScheduler: Send {
    /// Start calling `task` every `interval`. Fails if already running.
    fn start(&mut self, interval: Duration, task: TickTask) -> Result<()>;

    /// Stop ticking. Waits for a tick in progress. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Runs ticks on a dedicated background thread.
#[derive(Debug, Default)]
pub struct ThreadScheduler {
    worker: Option<Worker>,
}

#[derive(Debug)]
struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HeartbeatScheduler for ThreadScheduler {
    fn start(&mut self, interval: Duration, mut task: TickTask) -> Result<()> {
        if self.is_running() {
            return Err(AppLockError::Scheduler(
                "heartbeat thread is already running".to_string(),
            ));
        }
        // Reap a worker whose task stopped itself.
        self.stop();

        let (stop, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("applock-heartbeat".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if task() == TickControl::Stop {
                                debug!("heartbeat task asked to stop");
                                break;
                            }
                        }
                        // Explicit stop or the scheduler was dropped.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| {
                AppLockError::Scheduler(format!("failed to spawn heartbeat thread: {}", e))
            })?;

        debug!(interval_ms = interval.as_millis() as u64, "heartbeat thread started");
        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            warn!("heartbeat thread panicked");
        }
        debug!("heartbeat thread stopped");
    }

    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scheduler whose ticks are fired by the host.
///
/// Clones share state: hand one clone to the lock and keep another to call
/// [`ManualScheduler::fire`] from the host's own timer.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    interval: Option<Duration>,
    task: Option<TickTask>,
    fired: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick. Returns `false` when not running.
    pub fn fire(&self) -> bool {
        let mut state = self.state();
        let Some(task) = state.task.as_mut() else {
            return false;
        };
        let control = task();
        state.fired += 1;
        if control == TickControl::Stop {
            state.task = None;
        }
        true
    }

    /// Interval requested by the last `start`.
    pub fn interval(&self) -> Option<Duration> {
        self.state().interval
    }

    /// Number of ticks fired so far.
    pub fn fired(&self) -> u64 {
        self.state().fired
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl HeartbeatScheduler for ManualScheduler {
    fn start(&mut self, interval: Duration, task: TickTask) -> Result<()> {
        let mut state = self.state();
        if state.task.is_some() {
            return Err(AppLockError::Scheduler(
                "manual scheduler is already running".to_string(),
            ));
        }
        state.interval = Some(interval);
        state.task = Some(task);
        Ok(())
    }

    fn stop(&mut self) {
        self.state().task = None;
    }

    fn is_running(&self) -> bool {
        self.state().task.is_some()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ManualScheduler")
            .field("interval", &state.interval)
            .field("running", &state.task.is_some())
            .field("fired", &state.fired)
            .finish()
    }
}
