//! ABOUTME: Injectable clock used for `created_at`/`updated_at` timestamps
//! ABOUTME: Swappable at construction so tests get deterministic ordering

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// A process-wide collaborator supplying the current time.
///
/// Bound to the lifetime of a `Store`: injected at construction, always
/// called while the caller holds the store's write lock, so implementors
/// never need their own synchronization beyond interior mutability.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The default collaborator: wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A test double that returns a fixed instant until advanced explicitly.
#[derive(Clone)]
pub struct FixedClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `duration` and return the new instant.
    pub fn tick(&self, duration: chrono::Duration) -> DateTime<Utc> {
        let mut guard = self.current.lock().expect("FixedClock lock poisoned");
        *guard = *guard + duration;
        *guard
    }

    /// Set the clock to an exact instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().expect("FixedClock lock poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().expect("FixedClock lock poisoned")
    }
}
