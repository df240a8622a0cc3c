//! Binary codec for lock records.
//!
//! Layout (big-endian, no version field):
//!
//! | field            | encoding                                     |
//! |------------------|----------------------------------------------|
//! | `heartbeat_time` | i64                                          |
//! | `creation_time`  | i64                                          |
//! | `title`          | u32 byte length (`u32::MAX` = none) + UTF-8  |
//! | `owner_pid`      | u32                                          |
//! | `request`        | u8, 0 or 1                                   |
//! | end marker       | [`END_MARKER`]                               |
//!
//! Bytes after the end marker are ignored, since a shared-memory segment is
//! always read in full.

use super::model::LockRecord;
use crate::error::{AppLockError, Result};
use tracing::debug;

/// Fixed capacity of a lock medium. Encoded records must stay strictly below it.
pub const SEGMENT_CAPACITY: usize = 64 * 1024;

/// Sequence terminating every complete record.
pub const END_MARKER: [u8; 8] = *b"APLK\xE0\xF1\r\n";

const NO_TITLE: u32 = u32::MAX;

/// Encode a record.
///
/// Fails instead of truncating when the result would not fit the medium.
pub fn encode(record: &LockRecord) -> Result<Vec<u8>> {
    let title = record.title().map(str::as_bytes);
    let title_len = title.map_or(0, <[u8]>::len);

    let mut bytes = Vec::with_capacity(8 + 8 + 4 + title_len + 4 + 1 + END_MARKER.len());
    bytes.extend_from_slice(&record.heartbeat_time().to_be_bytes());
    bytes.extend_from_slice(&record.creation_time().to_be_bytes());
    match title {
        Some(title) => {
            let len = u32::try_from(title.len())
                .ok()
                .filter(|len| *len != NO_TITLE)
                .ok_or_else(|| AppLockError::InvalidRecord("title is too long".to_string()))?;
            bytes.extend_from_slice(&len.to_be_bytes());
            bytes.extend_from_slice(title);
        }
        None => bytes.extend_from_slice(&NO_TITLE.to_be_bytes()),
    }
    bytes.extend_from_slice(&record.owner_pid().to_be_bytes());
    bytes.push(u8::from(record.request()));
    bytes.extend_from_slice(&END_MARKER);

    if bytes.len() >= SEGMENT_CAPACITY {
        return Err(AppLockError::InvalidRecord(format!(
            "encoded record is {} bytes, capacity is {}",
            bytes.len(),
            SEGMENT_CAPACITY
        )));
    }

    Ok(bytes)
}

/// Decode a record, failing on short input or a missing end marker.
pub fn decode(bytes: &[u8]) -> Result<LockRecord> {
    let mut reader = Reader { bytes, pos: 0 };

    let heartbeat_time = i64::from_be_bytes(reader.array()?);
    let creation_time = i64::from_be_bytes(reader.array()?);
    let title = match u32::from_be_bytes(reader.array()?) {
        NO_TITLE => None,
        len => {
            let raw = reader.take(len as usize)?;
            let title = std::str::from_utf8(raw)
                .map_err(|_| AppLockError::InvalidRecord("title is not UTF-8".to_string()))?;
            Some(title.to_string())
        }
    };
    let owner_pid = u32::from_be_bytes(reader.array()?);
    let request = match reader.take(1)?[0] {
        0 => false,
        1 => true,
        other => {
            return Err(AppLockError::InvalidRecord(format!(
                "request flag byte is {:#04x}",
                other
            )));
        }
    };
    if reader.take(END_MARKER.len())? != END_MARKER {
        return Err(AppLockError::InvalidRecord("end marker mismatch".to_string()));
    }

    Ok(LockRecord::from_parts(
        heartbeat_time,
        creation_time,
        title,
        owner_pid,
        request,
    ))
}

/// Decode a record, treating anything incomplete as "no record".
///
/// A torn write by a crashed peer is indistinguishable from garbage, so
/// neither is surfaced as an error.
pub fn decode_lenient(bytes: &[u8]) -> Option<LockRecord> {
    if bytes.is_empty() {
        return None;
    }
    match decode(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(len = bytes.len(), error = %e, "ignoring unreadable lock record");
            None
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                AppLockError::InvalidRecord(format!(
                    "record truncated at byte {} of {}",
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
