//! Lock record structure and builder.

/// The heartbeat record shared between primary and secondary instances.
///
/// `creation_time`, `owner_pid` and `title` can only be set through
/// [`LockRecordBuilder`]; the heartbeat and request flag have narrow
/// update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    creation_time: i64,
    heartbeat_time: i64,
    owner_pid: u32,
    request: bool,
    title: Option<String>,
}

impl LockRecord {
    /// Start building a record for a primary established at `creation_time`.
    pub fn builder(owner_pid: u32, creation_time: i64) -> LockRecordBuilder {
        LockRecordBuilder {
            record: LockRecord {
                creation_time,
                heartbeat_time: 0,
                owner_pid,
                request: false,
                title: None,
            },
        }
    }

    /// When the primary was established (ms since epoch).
    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    /// Last heartbeat (ms since epoch). `0` means "use the medium's
    /// modification time".
    pub fn heartbeat_time(&self) -> i64 {
        self.heartbeat_time
    }

    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }

    /// Whether a secondary asked the primary to surface.
    pub fn request(&self) -> bool {
        self.request
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether `other` describes the same primary (same owner and creation).
    pub fn same_owner(&self, other: &LockRecord) -> bool {
        self.owner_pid == other.owner_pid && self.creation_time == other.creation_time
    }

    /// Refresh the heartbeat. The stored value never moves backwards.
    pub fn touch_heartbeat(&mut self, now: i64) {
        self.heartbeat_time = self.heartbeat_time.max(now);
    }

    /// Ask the primary to surface.
    pub fn set_request(&mut self) {
        self.request = true;
    }

    /// Clear the request flag, returning whether it was set.
    pub fn take_request(&mut self) -> bool {
        std::mem::take(&mut self.request)
    }

    /// Reassemble a record from decoded fields.
    pub(super) fn from_parts(
        heartbeat_time: i64,
        creation_time: i64,
        title: Option<String>,
        owner_pid: u32,
        request: bool,
    ) -> Self {
        Self {
            creation_time,
            heartbeat_time,
            owner_pid,
            request,
            title,
        }
    }
}

/// Builder for a fresh [`LockRecord`].
#[derive(Debug, Clone)]
pub struct LockRecordBuilder {
    record: LockRecord,
}

impl LockRecordBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.record.title = Some(title.into());
        self
    }

    /// Initial heartbeat; by default it is left for the first tick.
    pub fn heartbeat_time(mut self, heartbeat_time: i64) -> Self {
        self.record.heartbeat_time = heartbeat_time;
        self
    }

    pub fn build(self) -> LockRecord {
        self.record
    }
}
