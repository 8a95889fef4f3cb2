//! Device link state: the green light and the device-gone latch.

use core::sync::atomic::{AtomicBool, Ordering};

/// Per-device submission gate.
///
/// `device_gone` is a one-way latch: once set it never clears, and the
/// green light can no longer be turned on.
#[derive(Debug, Default)]
pub struct LinkState {
    green_light: AtomicBool,
    device_gone: AtomicBool,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            green_light: AtomicBool::new(false),
            device_gone: AtomicBool::new(false),
        }
    }

    /// Turn the green light on. Refused once the device is gone.
    pub fn start(&self) -> bool {
        if self.is_device_gone() {
            return false;
        }
        self.green_light.store(true, Ordering::Release);
        // lost a race with mark_device_gone
        if self.is_device_gone() {
            self.green_light.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Turn the green light off. Returns whether it was on.
    pub fn stop(&self) -> bool {
        self.green_light.swap(false, Ordering::AcqRel)
    }

    /// Latch the device as gone. Returns `true` on the first call only.
    pub fn mark_device_gone(&self) -> bool {
        self.green_light.store(false, Ordering::Release);
        !self.device_gone.swap(true, Ordering::AcqRel)
    }

    pub fn is_green(&self) -> bool {
        self.green_light.load(Ordering::Acquire)
    }

    pub fn is_device_gone(&self) -> bool {
        self.device_gone.load(Ordering::Acquire)
    }

    /// New submissions are allowed.
    pub fn can_submit(&self) -> bool {
        self.is_green() && !self.is_device_gone()
    }
}
