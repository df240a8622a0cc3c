//! Lock record: the only persisted entity of the single-instance protocol.
//!
//! A record is created once by the primary (`creation_time`, `owner_pid`,
//! `title` are write-once) and afterwards only its heartbeat and request
//! flag change. The codec turns it into a fixed, versionless byte sequence
//! terminated by an end marker; anything without the marker is not a record.

mod codec;
mod model;


pub use codec::{END_MARKER, SEGMENT_CAPACITY, decode, decode_lenient, encode};
pub use model::{LockRecord, LockRecordBuilder};
