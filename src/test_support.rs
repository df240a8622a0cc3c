use crate::clock::Clock;
use crate::staleness::{Liveness, ProcessProbe};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
#[cfg(unix)]
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub(crate) struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub(crate) fn at(now_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub(crate) fn advance_ms(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub(crate) fn set_ms(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Probe answering from a table; unlisted PIDs are alive.
///
/// A hook set with [`ScriptedProbe::before_next_answer`] runs once, inside
/// the next `liveness` call, to interleave another process's work with an
/// acquisition that is busy judging a record.
#[derive(Clone, Default)]
pub(crate) struct ScriptedProbe {
    answers: Arc<Mutex<HashMap<u32, Liveness>>>,
    hook: Arc<Mutex<Option<Hook>>>,
}

impl std::fmt::Debug for ScriptedProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProbe")
            .field("answers", &self.answers)
            .finish_non_exhaustive()
    }
}

impl ScriptedProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, pid: u32, liveness: Liveness) {
        self.answers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(pid, liveness);
    }

    pub(crate) fn before_next_answer(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().unwrap_or_else(|poison| poison.into_inner()) = Some(Box::new(hook));
    }
}

impl ProcessProbe for ScriptedProbe {
    fn liveness(&self, pid: u32) -> Liveness {
        let hook = self
            .hook
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        if let Some(hook) = hook {
            hook();
        }

        self.answers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(&pid)
            .copied()
            .unwrap_or(Liveness::Alive)
    }
}

#[cfg(unix)]
static NEXT_SEGMENT: AtomicUsize = AtomicUsize::new(0);

/// Uniquely named shared-memory object, unlinked on drop.
#[cfg(unix)]
pub(crate) struct TestSegment(String);

#[cfg(unix)]
impl TestSegment {
    pub(crate) fn new() -> Self {
        let n = NEXT_SEGMENT.fetch_add(1, Ordering::SeqCst);
        Self(format!("/applock.test.{}.{}", std::process::id(), n))
    }

    pub(crate) fn name(&self) -> String {
        self.0.clone()
    }

    pub(crate) fn medium(&self) -> crate::medium::ShmMedium {
        crate::medium::ShmMedium::new(self.name())
    }
}

#[cfg(unix)]
impl Drop for TestSegment {
    fn drop(&mut self) {
        use crate::medium::LockMedium;
        let _ = self.medium().close(true);
    }
}
