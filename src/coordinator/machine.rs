//! The acquisition state machine and the primary's heartbeat tick.
//!
//! `Core` is shared between the public handle and the scheduler's tick task
//! behind a mutex, so at most one of acquire, tick or close runs at a time.

use super::MAX_ACQUIRE_ATTEMPTS;
use super::events::{Emitter, EventCallback, LockEvent};
use super::state::{LockState, Role, TickOutcome};
use crate::clock::Clock;
use crate::error::{AppLockError, Result};
use crate::medium::LockMedium;
use crate::record::{self, LockRecord};
use crate::staleness::{Staleness, StalenessEvaluator, effective_heartbeat};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

/// What examining an existing medium left behind.
enum Examined {
    /// Nothing usable was there; the medium is closed and removed.
    Vacant,
    /// An active primary holds the lock.
    Held,
    /// Another process replaced the medium while it was being judged.
    Replaced,
}

pub(super) struct Core {
    name: String,
    process_id: u32,
    title: Option<String>,
    medium: Box<dyn LockMedium>,
    clock: Arc<dyn Clock>,
    evaluator: StalenessEvaluator,
    state: LockState,
    role: Option<Role>,
    /// The primary's own record as last persisted.
    own: Option<LockRecord>,
    other_pid: Option<u32>,
    emitter: Emitter,
}

pub(super) struct CoreParts {
    pub name: String,
    pub process_id: u32,
    pub title: Option<String>,
    pub medium: Box<dyn LockMedium>,
    pub clock: Arc<dyn Clock>,
    pub evaluator: StalenessEvaluator,
}

impl Core {
    pub(super) fn new(parts: CoreParts) -> Self {
        Self {
            name: parts.name,
            process_id: parts.process_id,
            title: parts.title,
            medium: parts.medium,
            clock: parts.clock,
            evaluator: parts.evaluator,
            state: LockState::Uninitialized,
            role: None,
            own: None,
            other_pid: None,
            emitter: Emitter::default(),
        }
    }

    pub(super) fn state(&self) -> LockState {
        self.state
    }

    /// The role decided by acquisition; kept after close.
    pub(super) fn role(&self) -> Option<Role> {
        self.role
    }

    pub(super) fn other_pid(&self) -> Option<u32> {
        self.other_pid
    }

    pub(super) fn location(&self) -> String {
        self.medium.location()
    }

    pub(super) fn subscribe(&mut self) -> Receiver<LockEvent> {
        self.emitter.subscribe()
    }

    pub(super) fn on_event(&mut self, callback: EventCallback) {
        self.emitter.on_event(callback);
    }

    /// Decide this process's role. Once decided, returns the cached role.
    pub(super) fn acquire(&mut self) -> Result<Role> {
        match self.state {
            LockState::Primary => return Ok(Role::Primary),
            LockState::Secondary => return Ok(Role::Secondary),
            LockState::Closed => {
                return Err(AppLockError::InvalidState(format!(
                    "lock '{}' is closed",
                    self.name
                )));
            }
            LockState::Uninitialized | LockState::Acquiring => {}
        }

        self.state = LockState::Acquiring;
        match self.run_acquisition() {
            Ok(role) => Ok(role),
            Err(e) => {
                // Leave nothing half-open; the caller may retry later.
                if self.medium.is_open()
                    && let Err(close_err) = self.medium.close(false)
                {
                    debug!(error = %close_err, "failed to close medium after acquisition error");
                }
                self.state = LockState::Uninitialized;
                Err(e)
            }
        }
    }

    fn run_acquisition(&mut self) -> Result<Role> {
        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            if self.medium.open_existing(false)? {
                match self.examine_existing()? {
                    Examined::Held => return Ok(Role::Secondary),
                    Examined::Replaced => {
                        debug!(attempt, "lock was replaced while being examined");
                        continue;
                    }
                    Examined::Vacant => {}
                }
            }

            match self.become_primary() {
                Ok(()) => return Ok(Role::Primary),
                Err(AppLockError::AlreadyExists(location)) => {
                    warn!(attempt, %location, "another instance created the lock first");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppLockError::MediumCreate(format!(
            "lock '{}' still contested after {} attempts",
            self.name, MAX_ACQUIRE_ATTEMPTS
        )))
    }

    /// Judge the record in the freshly opened medium.
    fn examine_existing(&mut self) -> Result<Examined> {
        let bytes = self.medium.read()?;
        let Some(existing) = record::decode_lenient(&bytes) else {
            debug!(location = %self.medium.location(), "discarding unreadable lock record");
            return self.discard_examined();
        };

        let heartbeat = effective_heartbeat(&existing, self.medium.modified_ms());
        let now = self.clock.now_ms();
        match self.evaluator.evaluate(&existing, heartbeat, now) {
            Staleness::Stale(reason) => {
                info!(pid = existing.owner_pid(), %reason, "reclaiming stale lock");
                self.discard_examined()
            }
            Staleness::Active => {
                self.become_secondary(existing.owner_pid());
                Ok(Examined::Held)
            }
        }
    }

    /// Remove the medium just judged, unless the name meanwhile resolves to
    /// a replacement, which must be judged afresh.
    fn discard_examined(&mut self) -> Result<Examined> {
        if self.medium.is_current()? {
            self.medium.close(true)?;
            Ok(Examined::Vacant)
        } else {
            self.medium.close(false)?;
            Ok(Examined::Replaced)
        }
    }

    fn become_secondary(&mut self, pid: u32) {
        if let Err(e) = self.request_primary() {
            warn!(pid, error = %e, "could not notify the running instance");
        }
        if self.medium.is_open()
            && let Err(e) = self.medium.close(false)
        {
            warn!(error = %e, "failed to close lock medium");
        }

        self.other_pid = Some(pid);
        self.role = Some(Role::Secondary);
        self.state = LockState::Secondary;
        info!(pid, name = %self.name, "another instance is already running");
        self.emitter.emit(LockEvent::OtherInstanceDetected { pid });
    }

    /// Leave `request = true` in the primary's record.
    fn request_primary(&mut self) -> Result<()> {
        self.medium.close(false)?;
        if !self.medium.open_existing(true)? {
            return Err(AppLockError::Medium(
                "lock disappeared before the request was written".to_string(),
            ));
        }

        let mut existing = record::decode(&self.medium.read()?)?;
        let modified = self.medium.modified_ms();
        existing.set_request();
        self.medium.write(&record::encode(&existing)?)?;

        // The write must not pass for a heartbeat of the primary.
        if let Some(modified) = modified
            && existing.heartbeat_time() == 0
        {
            self.medium.touch(modified)?;
        }
        Ok(())
    }

    fn become_primary(&mut self) -> Result<()> {
        let mut builder = LockRecord::builder(self.process_id, self.clock.now_ms());
        if let Some(title) = &self.title {
            builder = builder.title(title.clone());
        }
        let fresh = builder.build();
        let bytes = record::encode(&fresh)?;

        self.medium.create().map_err(|e| match e {
            AppLockError::AlreadyExists(_) | AppLockError::MediumCreate(_) => e,
            other => AppLockError::MediumCreate(other.to_string()),
        })?;
        if let Err(e) = self.medium.write(&bytes) {
            if let Err(close_err) = self.medium.close(true) {
                debug!(error = %close_err, "failed to remove unpersisted lock");
            }
            return Err(AppLockError::MediumCreate(format!(
                "failed to persist lock record: {}",
                e
            )));
        }

        self.own = Some(fresh);
        self.role = Some(Role::Primary);
        self.state = LockState::Primary;
        info!(
            pid = self.process_id,
            location = %self.medium.location(),
            "acquired lock as primary"
        );

        if let Err(e) = self.tick() {
            warn!(error = %e, "initial heartbeat failed");
        }
        Ok(())
    }

    /// One heartbeat: re-read, deliver a pending request, refresh, persist.
    pub(super) fn tick(&mut self) -> Result<TickOutcome> {
        if self.state != LockState::Primary {
            return Ok(TickOutcome::Idle);
        }
        let Some(own) = self.own.clone() else {
            return Ok(TickOutcome::Idle);
        };

        if !self.medium.is_current()?
            && let Some(outcome) = self.reattach(&own)?
        {
            return Ok(outcome);
        }

        let now = self.clock.now_ms();
        let (mut next, rewrite) = match record::decode_lenient(&self.medium.read()?) {
            Some(current) if current.same_owner(&own) => (current, false),
            Some(other) => {
                self.lose_lock(other.owner_pid());
                return Ok(TickOutcome::Lost);
            }
            None => {
                warn!(
                    location = %self.medium.location(),
                    "lock record missing or unreadable, rewriting"
                );
                (own, true)
            }
        };

        let requested = next.take_request();
        if self.medium.tracks_modification_time() {
            // The body only changes when a request must be cleared.
            if requested || rewrite {
                self.medium.write(&record::encode(&next)?)?;
            }
            self.medium.touch(now)?;
        } else {
            next.touch_heartbeat(now);
            self.medium.write(&record::encode(&next)?)?;
        }
        self.own = Some(next);

        if requested {
            debug!("another instance requested the primary");
            self.emitter.emit(LockEvent::InstanceRequested);
        }
        Ok(TickOutcome::Refreshed { requested })
    }

    /// Follow the name to whatever now lives there after the attached
    /// medium was removed. A foreign record means the lock is lost; no
    /// medium at all means a forced clear, and the record is recreated.
    fn reattach(&mut self, own: &LockRecord) -> Result<Option<TickOutcome>> {
        warn!(location = %self.medium.location(), "lock medium was removed underneath the primary");
        self.medium.close(false)?;

        if self.medium.open_existing(true)? {
            return match record::decode_lenient(&self.medium.read()?) {
                Some(current) if current.same_owner(own) => Ok(None),
                Some(other) => {
                    self.lose_lock(other.owner_pid());
                    Ok(Some(TickOutcome::Lost))
                }
                None => {
                    self.medium.close(false)?;
                    Err(AppLockError::Medium(format!(
                        "replacement of '{}' holds no readable record",
                        self.medium.location()
                    )))
                }
            };
        }

        self.medium.create()?;
        self.medium.write(&record::encode(own)?)?;
        Ok(None)
    }

    fn lose_lock(&mut self, owner_pid: u32) {
        warn!(owner_pid, name = %self.name, "lock was taken over by another instance");
        if let Err(e) = self.medium.close(false) {
            warn!(error = %e, "failed to close lock medium");
        }
        self.own = None;
        self.state = LockState::Closed;
        self.emitter.emit(LockEvent::LockLost { owner_pid });
    }

    /// Release the medium. A primary also removes its record, unless the
    /// record has meanwhile been taken over.
    pub(super) fn close(&mut self) -> Result<()> {
        if self.state == LockState::Closed {
            return Ok(());
        }

        let cleanup = self.state == LockState::Primary && self.still_owner();
        self.state = LockState::Closed;
        self.own = None;

        if self.medium.is_open() {
            self.medium.close(cleanup)?;
            debug!(cleanup, location = %self.medium.location(), "closed lock medium");
        }
        Ok(())
    }

    fn still_owner(&self) -> bool {
        let Some(own) = &self.own else {
            return false;
        };
        // A replaced medium's name belongs to someone else.
        if !self.medium.is_current().unwrap_or(false) {
            return false;
        }
        match self.medium.read().map(|bytes| record::decode_lenient(&bytes)) {
            Ok(Some(current)) => current.same_owner(own),
            // Nothing readable to protect.
            Ok(None) | Err(_) => true,
        }
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("name", &self.name)
            .field("process_id", &self.process_id)
            .field("location", &self.medium.location())
            .field("state", &self.state)
            .field("other_pid", &self.other_pid)
            .field("evaluator", &self.evaluator)
            .finish()
    }
}
