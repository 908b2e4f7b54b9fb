//! Reload backpressure.
//!
//! # Responsibilities
//! - Hold requests at a scope while it is paused for reload
//! - Count requests in flight past the gate
//! - Let the reloader wait for in-flight requests to drain
//!
//! # Design Decisions
//! - Condition variables, signaled on resume and on the last in-flight exit
//! - No timeout: a paused scope holds its callers until it is resumed
//! - Wakeups re-check the flag, so spurious wakeups just wait again

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    in_flight: usize,
}

/// Pause flag plus in-flight accounting for one scope.
#[derive(Debug, Default)]
pub struct PauseGate {
    state: Mutex<GateState>,
    resumed: Condvar,
    drained: Condvar,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn pause(&self) {
        self.lock().paused = true;
        tracing::debug!("Scope paused");
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.resumed.notify_all();
        tracing::debug!("Scope resumed");
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Block while paused, then register the caller as in flight.
    ///
    /// The returned guard deregisters on drop.
    pub fn enter(&self) -> InFlight<'_> {
        let mut state = self.lock();
        let waited = state.paused;
        if waited {
            tracing::debug!("Request held while scope is paused");
        }
        while state.paused {
            state = self
                .resumed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight += 1;
        InFlight { gate: self, waited }
    }

    /// Block until no request is in flight.
    ///
    /// Must not be called from a request that is itself in flight on this gate.
    pub fn wait_until_drained(&self) {
        let mut state = self.lock();
        while state.in_flight > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Pause, wait for in-flight requests to finish, and resume when the
    /// returned guard drops.
    pub fn pause_and_drain(&self) -> Paused<'_> {
        self.pause();
        self.wait_until_drained();
        Paused { gate: self }
    }

    fn exit(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.drained.notify_all();
        }
    }
}

/// Registration of one request in flight past a [`PauseGate`].
#[derive(Debug)]
pub struct InFlight<'a> {
    gate: &'a PauseGate,
    waited: bool,
}

impl InFlight<'_> {
    /// True if the caller was held by a paused gate before entering.
    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gate.exit();
    }
}

/// A paused, drained scope; resumes on drop.
#[derive(Debug)]
pub struct Paused<'a> {
    gate: &'a PauseGate,
}

impl Drop for Paused<'_> {
    fn drop(&mut self) {
        self.gate.resume();
    }
}
