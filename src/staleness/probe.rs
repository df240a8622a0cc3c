//! Best-effort process liveness probe.

/// Answer of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
    /// The probe could not tell (no permission, unsupported platform).
    Unknown,
}

/// "Does a process with this PID exist?"
pub trait ProcessProbe: Send + Sync {
    fn liveness(&self, pid: u32) -> Liveness;
}

/// Probe using `kill(pid, 0)`.
///
/// Only meaningful when the prober shares the target's user and PID
/// namespace; `EPERM` therefore yields [`Liveness::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    #[cfg(unix)]
    fn liveness(&self, pid: u32) -> Liveness {
        // pid 0 and negative values address process groups, not a process.
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return Liveness::Unknown;
        };
        if pid <= 0 {
            return Liveness::Unknown;
        }

        // SAFETY: signal 0 performs only the existence and permission checks.
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return Liveness::Alive;
        }

        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::ESRCH) => Liveness::Dead,
            _ => Liveness::Unknown,
        }
    }

    #[cfg(not(unix))]
    fn liveness(&self, _pid: u32) -> Liveness {
        Liveness::Unknown
    }
}
