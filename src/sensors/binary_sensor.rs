//! Thread-safe boolean sensor cell.
//!
//! Holds the last known value of a two-state input (door contact, motion) so
//! that it can be written from one task (the diagnostics server, a bench
//! script) and read from the tick loop without locking.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct BinarySensor {
    state: AtomicBool,
}

impl BinarySensor {
    pub fn new(initial: bool) -> Self {
        Self {
            state: AtomicBool::new(initial),
        }
    }

    pub fn get(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: bool) {
        self.state.store(value, Ordering::SeqCst);
    }
}
