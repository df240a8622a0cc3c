//! Implementation of the `applock hold` command.
//!
//! Acquires the lock. A secondary reports the running instance and exits;
//! a primary holds the lock, printing every request from later instances,
//! until the duration elapses or stdin is closed.

use super::resolve_config;
use crate::cli::HoldArgs;
use applock::{AppLockError, InstanceLock, LockEvent, Result, Role};
use std::io::Read;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Why the hold loop woke up.
#[derive(Debug)]
enum Wake {
    Event(LockEvent),
    StdinClosed,
}

/// Execute the `applock hold` command.
pub fn cmd_hold(args: HoldArgs) -> Result<()> {
    let deadline = args
        .duration_secs
        .map(|secs| hold_deadline(Instant::now(), secs))
        .transpose()?;
    let config = resolve_config(&args.lock)?;
    let name = args.lock.name.clone();

    let mut builder = InstanceLock::builder(&name).config(config);
    if let Some(title) = &args.title {
        builder = builder.title(title.clone());
    }
    let mut lock = builder.build()?;

    let (tx, rx) = mpsc::channel();
    let events = tx.clone();
    lock.on_event(move |event| {
        let _ = events.send(Wake::Event(event.clone()));
    });

    if lock.acquire()? == Role::Secondary {
        match lock.other_instance_pid() {
            Some(pid) => println!("'{}' is already running with pid {}", name, pid),
            None => println!("'{}' is already running", name),
        }
        return Ok(());
    }

    println!("Holding '{}' at {}", name, lock.location());
    if deadline.is_none() {
        println!("Close stdin (Ctrl-D) to release.");
        watch_stdin(tx);
    }

    loop {
        let wake = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(wake) => wake,
                    Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(wake) => wake,
                Err(_) => break,
            },
        };

        match wake {
            Wake::Event(LockEvent::InstanceRequested) => {
                println!("Another instance of '{}' was started", name);
            }
            Wake::Event(LockEvent::LockLost { owner_pid }) => {
                return Err(AppLockError::Medium(format!(
                    "lock '{}' was taken over by pid {}",
                    name, owner_pid
                )));
            }
            Wake::Event(LockEvent::OtherInstanceDetected { .. }) => {}
            Wake::StdinClosed => break,
        }
    }

    lock.close()?;
    println!("Released '{}'", name);
    Ok(())
}

/// When a hold of `secs` seconds starting at `now` ends.
fn hold_deadline(now: Instant, secs: u64) -> Result<Instant> {
    now.checked_add(Duration::from_secs(secs)).ok_or_else(|| {
        AppLockError::Usage(format!("--duration-secs {} is too large", secs))
    })
}

/// Signal `tx` once stdin reaches end of file.
fn watch_stdin(tx: Sender<Wake>) {
    thread::spawn(move || {
        let mut sink = [0u8; 256];
        let mut stdin = std::io::stdin();
        loop {
            match stdin.read(&mut sink) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = tx.send(Wake::StdinClosed);
    });
}
