//! Buffer ownership state machine.
//!
//! # State Machine
//! ```text
//!     FREE ──acquire()──> DRIVER_OWNED ──submit()──> DEVICE_OWNED
//!       ▲                     │                          │
//!       └────reclaim()────────┴──────complete()──────────┘
//! ```
//!
//! INVARIANT: a DEVICE_OWNED buffer is referenced by exactly one in-flight
//! transfer and is never on the free list.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwnership {
    /// On the pool's free list.
    Free,
    /// Lent to a caller that is filling it.
    DriverOwned,
    /// Submitted; owned by the transport until completion.
    DeviceOwned,
}

impl BufferOwnership {
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Only the driver may touch the bytes.
    pub fn can_access(&self) -> bool {
        matches!(self, Self::DriverOwned)
    }

    pub fn is_device_owned(&self) -> bool {
        matches!(self, Self::DeviceOwned)
    }

    /// Validate a transition. Returns `false` for anything not on the diagram.
    pub fn can_transition_to(&self, next: BufferOwnership) -> bool {
        matches!(
            (self, next),
            (Self::Free, Self::DriverOwned)
                | (Self::DriverOwned, Self::DeviceOwned)
                | (Self::DriverOwned, Self::Free)
                | (Self::DeviceOwned, Self::Free)
        )
    }
}
