//! Instance coordinator: decides whether this process is the primary or a
//! secondary instance of an application, and keeps the primary's record
//! alive.
//!
//! The lifecycle is `Uninitialized -> Acquiring -> {Primary, Secondary} ->
//! Closed`. Acquisition runs once, synchronously; afterwards the primary is
//! driven by a [`crate::scheduler::HeartbeatScheduler`] and reports to the
//! host through [`LockEvent`]s.

mod machine;
mod events;
mod handle;
mod inspect;
mod state;


pub use events::{EventCallback, LockEvent};
pub use handle::{InstanceLock, InstanceLockBuilder};
pub use inspect::{LockStatus, clear, clear_medium, inspect, inspect_medium};
pub use state::{LockState, Role, TickOutcome};

/// Open/create rounds before acquisition gives up on a contested medium.
pub const MAX_ACQUIRE_ATTEMPTS: u32 = 3;
