//! Implementation of the `applock clear` command.

use super::resolve_config;
use crate::cli::ClearArgs;
use applock::{AppLockError, Result, coordinator};

/// Execute the `applock clear` command.
pub fn cmd_clear(args: ClearArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(AppLockError::Usage(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock lets a second instance start while the first may still run.\n\
             Only clear locks if you are certain the holder has crashed.\n\n\
             To clear the lock, run:\n  applock clear {} --force",
            args.lock.name
        )));
    }

    let config = resolve_config(&args.lock)?;
    if coordinator::clear(&args.lock.name, &config)? {
        println!("Cleared lock '{}'", args.lock.name);
    } else {
        println!("No lock found for '{}'", args.lock.name);
    }
    Ok(())
}
