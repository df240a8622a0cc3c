//! Implementation of the `applock status` command.

use super::{format_age, resolve_config};
use crate::cli::StatusArgs;
use applock::{AppLockError, LockStatus, Result, coordinator};
use chrono::{DateTime, SecondsFormat};
use serde_json::json;

/// Execute the `applock status` command.
pub fn cmd_status(args: StatusArgs) -> Result<()> {
    let config = resolve_config(&args.lock)?;
    let status = coordinator::inspect(&args.lock.name, &config)?;

    if args.json {
        let value = json!({
            "name": args.lock.name,
            "scope": config.scope.as_str(),
            "locked": status.is_some(),
            "lock": status,
        });
        let rendered = serde_json::to_string_pretty(&value)
            .map_err(|e| AppLockError::Usage(format!("failed to serialize status: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    match status {
        Some(status) => print!("{}", render(&args.lock.name, &status)),
        None => println!("'{}' is not locked", args.lock.name),
    }
    Ok(())
}

fn render(name: &str, status: &LockStatus) -> String {
    let stale_marker = if status.stale { " [STALE]" } else { "" };
    let mut out = format!("Lock '{}'{}\n", name, stale_marker);
    out.push_str(&format!("  owner pid:  {}\n", status.owner_pid));
    if let Some(title) = &status.title {
        out.push_str(&format!("  title:      {}\n", title));
    }
    out.push_str(&format!("  created:    {}\n", timestamp(status.creation_time)));
    out.push_str(&format!(
        "  heartbeat:  {} ago\n",
        format_age(status.age_ms)
    ));
    if status.request {
        out.push_str("  request:    pending\n");
    }
    if let Some(reason) = &status.stale_reason {
        out.push_str(&format!("  stale:      {}\n", reason));
    }
    out.push_str(&format!(
        "  medium:     {} ({})\n",
        status.medium, status.location
    ));
    out
}

fn timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}
