//! Collaborator trait definitions.
//!
//! Every trait is `Send + Sync` and takes `&self`: the completion path and
//! the caller's path share one instance through an `Arc`.

use core::fmt;

use crate::config::LinkSpeed;
use crate::dma::Transfer;
use crate::error::{HdmiError, I2cError, RegisterError, TransportError};
use crate::mode::DisplayParams;

/// Chip register access primitive.
///
/// Synchronous and short-latency. Offsets are the adapter's own register
/// numbers (see [`crate::regs`]).
pub trait RegisterIo: Send + Sync {
    fn read(&self, offset: u32) -> Result<u32, RegisterError>;

    fn write(&self, offset: u32, value: u32) -> Result<(), RegisterError>;
}

/// Transfer refused at submission time.
///
/// The transfer is handed back uncompleted so the caller decides how it
/// returns to the pool.
pub struct Rejected {
    pub transfer: Transfer,
    pub error: TransportError,
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("len", &self.transfer.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Asynchronous bulk transfer primitive.
pub trait BulkTransport: Send + Sync {
    /// Queue a transfer on the bulk OUT endpoint.
    ///
    /// # Contract
    /// - MUST return immediately (no completion wait)
    /// - On `Ok`, MUST eventually call [`Transfer::complete`] exactly once,
    ///   from any context (dropping the transfer also completes it)
    /// - On `Err`, the transfer comes back inside [`Rejected`]
    fn submit(&self, transfer: Transfer) -> Result<(), Rejected>;

    /// Select the streaming interface/alternate setting.
    fn select_interface(&self) -> Result<(), TransportError>;

    /// Negotiated link speed.
    fn link_speed(&self) -> LinkSpeed;
}

/// Monotonic time source and sleep.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    fn delay_ms(&self, ms: u32);
}

/// DDC side channel to the monitor.
pub trait I2cBus: Send + Sync {
    /// Read four bytes at `offset` from the device at 7-bit `addr`.
    /// Byte 0 of the result is the lowest byte of the returned word.
    fn read_dword(&self, addr: u8, offset: u8) -> Result<u32, I2cError>;
}

/// HDMI companion chip sub-driver.
pub trait HdmiChip: Send + Sync {
    fn reset(&self) -> Result<(), HdmiError>;

    fn is_powered_up(&self) -> bool;

    fn power_up(&self) -> Result<(), HdmiError>;

    /// Re-initialize for the negotiated mode. `resolution_changed` selects a
    /// full rather than a partial re-init.
    fn init(&self, params: &DisplayParams, resolution_changed: bool) -> Result<(), HdmiError>;

    /// Read one 128-byte EDID block through the chip's own DDC master.
    fn read_edid_block(&self, block: u8, out: &mut [u8; 128]) -> Result<(), HdmiError>;
}
