//! Per-operation failure injection and call counting

use custody_core::{CustodyError, CustodyResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
struct FaultState {
    once: HashMap<String, VecDeque<CustodyError>>,
    always: HashMap<String, CustodyError>,
    calls: HashMap<String, usize>,
}

/// Failure table keyed by operation name (the trait method name).
#[derive(Debug, Default)]
pub struct Faults {
    state: Mutex<FaultState>,
}

impl Faults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call to `op` with `err`; queued errors are consumed in order.
    pub fn fail_next(&self, op: &str, err: CustodyError) {
        self.state
            .lock()
            .once
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    /// Fail every call to `op` until [`heal`](Self::heal).
    pub fn fail_always(&self, op: &str, err: CustodyError) {
        self.state.lock().always.insert(op.to_string(), err);
    }

    /// Remove all injected failures for `op`.
    pub fn heal(&self, op: &str) {
        let mut state = self.state.lock();
        state.once.remove(op);
        state.always.remove(op);
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Record a call to `op` and return the injected failure, if any.
    pub fn check(&self, op: &str) -> CustodyResult<()> {
        let mut state = self.state.lock();
        *state.calls.entry(op.to_string()).or_default() += 1;
        if let Some(err) = state.once.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        match state.always.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
