// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{Error, StopSignal};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

// Waits are sliced so a writer re-checks its scope periodically even
// if a wakeup is lost; the stall state lives in atomics outside the
// gate lock.
const WAIT_SLICE: Duration = Duration::from_millis(100);

struct GateInner {
    lock: Mutex<()>,
    cond: Condvar,
    stop_signal: StopSignal,
}

/// Parks writers that hit a stopped scope and wakes them again.
///
/// All writers share one gate; a wake-up makes every parked writer
/// re-check its own scope. Stall recovery is rare enough that the
/// thundering herd does not matter.
#[derive(Clone)]
pub(crate) struct Gate(Arc<GateInner>);

impl Gate {
    pub fn new(stop_signal: StopSignal) -> Self {
        Self(Arc::new(GateInner {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            stop_signal,
        }))
    }

    /// Blocks the calling writer while `is_blocked` returns `true`.
    ///
    /// Returns `Err(Error::ShuttingDown)` if the stop signal fires
    /// before the scope recovers.
    pub fn wait_while<F: Fn() -> bool>(&self, is_blocked: F) -> crate::Result<()> {
        let mut guard = self.0.lock.lock().expect("lock is poisoned");

        loop {
            if self.0.stop_signal.is_stopped() {
                return Err(Error::ShuttingDown);
            }

            if !is_blocked() {
                return Ok(());
            }

            let (next_guard, _timeout) = self
                .0
                .cond
                .wait_timeout(guard, WAIT_SLICE)
                .expect("lock is poisoned");

            guard = next_guard;
        }
    }

    /// Wakes all parked writers so they re-check their scopes.
    ///
    /// Taking the gate lock first orders the wake-up after any
    /// in-flight check, so a writer cannot park past a transition it
    /// has not seen.
    pub fn notify_all(&self) {
        let _guard = self.0.lock.lock().expect("lock is poisoned");
        self.0.cond.notify_all();
    }
}
