//! Staleness and liveness evaluation of existing lock records.
//!
//! A record is `Active` only if its heartbeat is younger than the staleness
//! timeout *and* the liveness probe (when enabled) does not report the owner
//! as gone. Either signal alone is enough to declare it `Stale`.

mod evaluator;
mod probe;


pub use evaluator::{StaleReason, Staleness, StalenessEvaluator, effective_heartbeat};
pub use probe::{Liveness, ProcessProbe, SystemProbe};
