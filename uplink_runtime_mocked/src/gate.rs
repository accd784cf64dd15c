use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// Barrier in front of every native call.
///
/// While held, callers park on the worker thread until `release`. Tests use
/// it to keep a worker busy so that queued tasks can be canceled
/// deterministically.
#[derive(Default)]
pub struct Gate {
    held: Mutex<bool>,
    cond: Condvar,
    parked: AtomicUsize,
}

impl Gate {
    pub fn hold(&self) {
        *self.held.lock() = true;
    }

    pub fn release(&self) {
        *self.held.lock() = false;
        self.cond.notify_all();
    }

    /// Number of calls currently parked at the gate.
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }

    pub fn pass(&self) {
        let mut held = self.held.lock();
        if !*held {
            return;
        }
        self.parked.fetch_add(1, Ordering::SeqCst);
        while *held {
            self.cond.wait(&mut held);
        }
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }
}
