use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Flight {
    done: Mutex<bool>,
    landed: Condvar,
}

impl Flight {
    fn wait(&self) {
        let mut done = lock(&self.done);
        while !*done {
            done = self
                .landed
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn land(&self) {
        *lock(&self.done) = true;
        self.landed.notify_all();
    }
}

/// Who ran the work for a key.
#[derive(Debug, PartialEq, Eq)]
pub enum Flown<T> {
    /// This caller ran the closure.
    Led(T),
    /// Another caller was already running it; this one waited for it to finish.
    Joined,
}

/// Per-key single-flight: at most one closure per key runs at a time within the process.
///
/// Callers that arrive while a key is in flight block until it lands and then get
/// [`Flown::Joined`]; they are expected to re-check the on-disk result themselves.
#[derive(Debug, Default)]
pub struct FlightGate {
    inflight: Mutex<HashMap<String, Arc<Flight>>>,
}

impl FlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run<T>(&self, key: &str, work: impl FnOnce() -> T) -> Flown<T> {
        let (flight, leader) = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let flight = Arc::new(Flight::default());
                    inflight.insert(key.to_string(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            tracing::debug!(key, "joining in-flight conversion");
            flight.wait();
            return Flown::Joined;
        }

        let _landing = Landing {
            gate: self,
            key,
            flight: &flight,
        };
        Flown::Led(work())
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }
}

/// Clears the key and wakes followers even if the leader's work panics.
struct Landing<'a> {
    gate: &'a FlightGate,
    key: &'a str,
    flight: &'a Flight,
}

impl Drop for Landing<'_> {
    fn drop(&mut self) {
        lock(&self.gate.inflight).remove(self.key);
        self.flight.land();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "../../tests/unit/cache/flight.rs"]
mod tests;
