//! Exit code constants for the applock CLI.
//!
//! - 0: Success (including "another instance is already running")
//! - 1: User error (bad args, bad config, missing name)
//! - 2: Lock medium failure (could not create, read or write the lock)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration or invalid state.
pub const USER_ERROR: i32 = 1;

/// Lock failure: the lock medium could not be created, read or written.
pub const LOCK_FAILURE: i32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, LOCK_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
