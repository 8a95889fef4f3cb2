//! Monitor presence flag with change notification.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::driver::traits::Clock;

const WAIT_POLL_MS: u32 = 1;

/// Present/absent flag plus a generation counter bumped on every change.
///
/// Waiters record the generation they last saw and block until it moves.
#[derive(Debug, Default)]
pub struct Presence {
    present: AtomicBool,
    generation: AtomicU32,
}

impl Presence {
    pub const fn new() -> Self {
        Self {
            present: AtomicBool::new(false),
            generation: AtomicU32::new(0),
        }
    }

    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::Acquire)
    }

    /// Set the flag. Returns the previous value.
    pub fn mark(&self, present: bool) -> bool {
        self.present.swap(present, Ordering::AcqRel)
    }

    /// Wake waiters.
    pub fn notify(&self) -> u32 {
        self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Block until the generation moves past `seen` or `timeout_ms` passes.
    /// Returns the new generation, or `None` on timeout.
    pub fn wait_for_change(&self, seen: u32, timeout_ms: u32, clock: &dyn Clock) -> Option<u32> {
        let deadline = clock.now_ms().saturating_add(timeout_ms as u64);
        loop {
            let current = self.generation();
            if current != seen {
                return Some(current);
            }
            if clock.now_ms() >= deadline {
                return None;
            }
            clock.delay_ms(WAIT_POLL_MS);
        }
    }
}
