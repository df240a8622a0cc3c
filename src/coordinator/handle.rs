//! Public handle for an application's single-instance lock.

use super::events::{EventCallback, LockEvent};
use super::machine::{Core, CoreParts};
use super::state::{LockState, Role, TickOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::{LockConfig, Scope};
use crate::error::{AppLockError, Result};
use crate::identity;
use crate::medium::{self, LockMedium};
use crate::scheduler::{HeartbeatScheduler, ThreadScheduler, TickControl, TickTask};
use crate::staleness::{ProcessProbe, StalenessEvaluator, SystemProbe};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::warn;

/// Single-instance lock for one application name.
///
/// Call [`InstanceLock::acquire`] (or any query that implies it) once at
/// startup. A primary keeps its record fresh on the scheduler until the lock
/// is closed or dropped; a secondary has already notified the primary and
/// should usually exit.
///
/// ```no_run
/// use applock::{InstanceLock, Role, Scope};
///
/// let mut lock = InstanceLock::new("my-editor", Scope::User)?;
/// if lock.acquire()? == Role::Secondary {
///     println!("already running as pid {:?}", lock.other_instance_pid());
///     return Ok(());
/// }
/// # Ok::<(), applock::AppLockError>(())
/// ```
pub struct InstanceLock {
    core: Arc<Mutex<Core>>,
    scheduler: Box<dyn HeartbeatScheduler>,
    interval: Duration,
}

impl InstanceLock {
    /// Lock `name` with default settings for `scope`.
    pub fn new(name: impl Into<String>, scope: Scope) -> Result<Self> {
        Self::builder(name).scope(scope).build()
    }

    pub fn builder(name: impl Into<String>) -> InstanceLockBuilder {
        InstanceLockBuilder::new(name)
    }

    /// Decide whether this process is primary or secondary.
    ///
    /// The first call does the work; later calls return the cached role.
    /// Becoming primary starts the heartbeat scheduler.
    pub fn acquire(&mut self) -> Result<Role> {
        let role = self.core().acquire()?;

        if role == Role::Primary && !self.scheduler.is_running() {
            let core = Arc::downgrade(&self.core);
            if let Err(e) = self.scheduler.start(self.interval, heartbeat_task(core)) {
                if let Err(close_err) = self.core().close() {
                    warn!(error = %close_err, "failed to release lock after scheduler error");
                }
                return Err(e);
            }
        }
        Ok(role)
    }

    /// Whether another instance already holds the lock.
    ///
    /// Acquires implicitly; an acquisition error reads as `false`.
    pub fn is_secondary_instance(&mut self) -> bool {
        match self.acquire() {
            Ok(role) => role == Role::Secondary,
            Err(e) => {
                warn!(error = %e, "lock acquisition failed");
                false
            }
        }
    }

    /// Whether this process currently holds the lock.
    pub fn is_primary(&self) -> bool {
        self.state() == LockState::Primary
    }

    /// Whether the lock has been decided and not closed.
    pub fn is_active(&self) -> bool {
        self.state().role().is_some()
    }

    /// The role decided by acquisition, if any.
    pub fn role(&self) -> Option<Role> {
        self.core().role()
    }

    pub fn state(&self) -> LockState {
        self.core().state()
    }

    /// PID of the primary found by a secondary.
    pub fn other_instance_pid(&self) -> Option<u32> {
        self.core().other_pid()
    }

    /// Where the record lives (file path or shared memory object).
    pub fn location(&self) -> String {
        self.core().location()
    }

    /// Run one heartbeat now. Usually left to the scheduler.
    pub fn tick(&self) -> Result<TickOutcome> {
        self.core().tick()
    }

    /// Receive events on a channel. Subscribe before acquiring to see
    /// [`LockEvent::OtherInstanceDetected`].
    pub fn subscribe(&self) -> Receiver<LockEvent> {
        self.core().subscribe()
    }

    /// Register a callback for events.
    pub fn on_event<F>(&self, callback: F)
    where
        F: FnMut(&LockEvent) + Send + 'static,
    {
        let callback: EventCallback = Box::new(callback);
        self.core().on_event(callback);
    }

    /// Stop the heartbeat and release the medium.
    ///
    /// A primary removes its record; a secondary only detaches.
    pub fn close(&mut self) -> Result<()> {
        // An in-flight tick finishes before the scheduler stops.
        self.scheduler.stop();
        self.core().close()
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        lock_core(&self.core)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to release lock on drop");
        }
    }
}

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLock")
            .field("core", &*self.core())
            .field("interval", &self.interval)
            .field("scheduler_running", &self.scheduler.is_running())
            .finish()
    }
}

fn lock_core(core: &Mutex<Core>) -> MutexGuard<'_, Core> {
    core.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Tick task for the scheduler. Ends the schedule once the lock is gone.
fn heartbeat_task(core: Weak<Mutex<Core>>) -> TickTask {
    Box::new(move || {
        let Some(core) = core.upgrade() else {
            return TickControl::Stop;
        };
        match lock_core(&core).tick() {
            Ok(TickOutcome::Refreshed { .. }) => TickControl::Continue,
            Ok(TickOutcome::Lost | TickOutcome::Idle) => TickControl::Stop,
            Err(e) => {
                warn!(error = %e, "heartbeat tick failed");
                TickControl::Continue
            }
        }
    })
}

/// Evaluator for `config`: timeout always, probe only when enabled.
pub(super) fn evaluator_for(
    config: &LockConfig,
    probe: Option<Arc<dyn ProcessProbe>>,
) -> StalenessEvaluator {
    let evaluator = StalenessEvaluator::new(config.stale_timeout());
    if config.probes_liveness() {
        evaluator.with_probe(probe.unwrap_or_else(|| Arc::new(SystemProbe)))
    } else {
        evaluator
    }
}

/// Builder for [`InstanceLock`]. Every collaborator has a production default.
pub struct InstanceLockBuilder {
    name: String,
    config: LockConfig,
    medium: Option<Box<dyn LockMedium>>,
    clock: Option<Arc<dyn Clock>>,
    probe: Option<Arc<dyn ProcessProbe>>,
    scheduler: Option<Box<dyn HeartbeatScheduler>>,
    process_id: Option<u32>,
    title: Option<String>,
}

impl InstanceLockBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: LockConfig::default(),
            medium: None,
            clock: None,
            probe: None,
            scheduler: None,
            process_id: None,
            title: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.config.scope = scope;
        self
    }

    /// Use this medium instead of the one derived from the scope.
    pub fn medium(mut self, medium: Box<dyn LockMedium>) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Liveness probe, consulted only when the configuration enables probing.
    pub fn probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn scheduler(mut self, scheduler: Box<dyn HeartbeatScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// PID recorded as the owner when this process becomes primary.
    pub fn process_id(mut self, process_id: u32) -> Self {
        self.process_id = Some(process_id);
        self
    }

    /// Display label stored in the record. Overrides the configured title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn build(self) -> Result<InstanceLock> {
        if self.name.trim().is_empty() {
            return Err(AppLockError::MissingName);
        }
        self.config.validate()?;

        let medium = match self.medium {
            Some(medium) => medium,
            None => medium::medium_for(&self.name, &self.config)?,
        };
        let title = self
            .title
            .or_else(|| self.config.title.clone())
            .unwrap_or_else(identity::owner_string);

        let core = Core::new(CoreParts {
            name: self.name,
            process_id: self.process_id.unwrap_or_else(std::process::id),
            title: Some(title),
            medium,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            evaluator: evaluator_for(&self.config, self.probe),
        });

        Ok(InstanceLock {
            core: Arc::new(Mutex::new(core)),
            scheduler: self
                .scheduler
                .unwrap_or_else(|| Box::new(ThreadScheduler::new())),
            interval: self.config.heartbeat_interval(),
        })
    }
}

impl std::fmt::Debug for InstanceLockBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLockBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("custom_medium", &self.medium.is_some())
            .field("process_id", &self.process_id)
            .field("title", &self.title)
            .finish()
    }
}
