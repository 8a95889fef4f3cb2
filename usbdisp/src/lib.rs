//! MorpheusX USB Display Adapter Driver
//!
//! Drives an external USB-attached display adapter: programs its video
//! timing, PLL and pixel-format registers, tracks monitor presence, and
//! streams framebuffer contents to it as a continuous sequence of bulk
//! transfers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Adapter                               │
//! │   initialize · set_display_mode · submit_frame · poll · hotplug │
//! └─────────────────────────────────────────────────────────────────┘
//!        │                     │                        │
//!        ▼                     ▼                        ▼
//! ┌───────────────┐   ┌─────────────────┐     ┌──────────────────┐
//! │ModeController │──▶│    Pipeline     │◀────│  HotplugMachine  │
//! │ timing · PLL  │   │ green light     │     │ presence · EDID  │
//! │ verify-write  │   │ contexts        │     │ low-power policy │
//! └───────┬───────┘   │ redundant frame │     └────────┬─────────┘
//!         │           └────────┬────────┘              │
//!         │                    ▼                       │
//!         │           ┌─────────────────┐              │
//!         │           │  TransferPool   │              │
//!         │           │ N_buf buffers   │              │
//!         │           └────────┬────────┘              │
//!         ▼                    ▼                       ▼
//!   RegisterIo           BulkTransport          I2cBus / HdmiChip
//! ```
//!
//! Completions arrive from the transport's own context through
//! [`dma::Transfer::complete`]. That path only takes short spin locks; the
//! blocking work (buffer waits, rescheduling) happens on the caller's path
//! inside [`Pipeline::submit_frame`] and [`Pipeline::poll`].
//!
//! # Usage
//!
//! ```ignore
//! use usbdisp::{Adapter, AdapterIo, ChipRevision, DisplayMode, Frame, PipelineConfig};
//!
//! let adapter = Adapter::new(io, PipelineConfig::default(), ChipRevision::Dx)?;
//! adapter.initialize()?;
//! adapter.check_connection();
//!
//! let params = adapter.set_display_mode(DisplayMode::rgb24(1280, 720, 60))?;
//! adapter.submit_frame(frame);
//!
//! // host main loop
//! loop {
//!     adapter.poll();
//! }
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod adapter;
pub mod config;
pub mod dma;
pub mod driver;
pub mod error;
pub mod logger;
pub mod mode;
pub mod monitor;
pub mod regs;
pub mod render;

pub use adapter::{Adapter, AdapterIo};
pub use config::{ChipRevision, EndOfFrame, LinkSpeed, PipelineConfig};
pub use dma::{CompletionStatus, Transfer};
pub use driver::traits::{BulkTransport, Clock, HdmiChip, I2cBus, Rejected, RegisterIo};
pub use error::{Error, ErrorClass, ModeError, PoolError, Result};
pub use mode::{ColorFormat, DisplayMode, DisplayParams};
pub use monitor::{CapabilityBlock, Presence};
pub use render::{DropReason, Frame, FrameOutcome, ListCounts, Pipeline, PipelineStats};
