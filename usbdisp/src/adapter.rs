//! Adapter front end.
//!
//! Wires the collaborators into one pipeline, one mode controller and one
//! hotplug machine, and exposes the host-facing operations. Once the device
//! is gone every fallible operation fails fast with [`Error::DeviceGone`].

use alloc::sync::Arc;

use crate::config::{ChipRevision, PipelineConfig};
use crate::driver::traits::{BulkTransport, Clock, HdmiChip, I2cBus, RegisterIo};
use crate::error::{Error, Result};
use crate::mode::{DisplayMode, DisplayParams, ModeController};
use crate::monitor::{CapabilityBlock, HotplugEvent, HotplugMachine, Presence};
use crate::regs::{self, I2cCtrlBits, RegisterIoExt};
use crate::render::{DropReason, Frame, FrameOutcome, Pipeline, PipelineStats};

/// Collaborators supplied by the host.
#[derive(Clone)]
pub struct AdapterIo {
    pub regs: Arc<dyn RegisterIo>,
    pub transport: Arc<dyn BulkTransport>,
    pub clock: Arc<dyn Clock>,
    /// Direct DDC access, when the board routes it.
    pub i2c: Option<Arc<dyn I2cBus>>,
    /// HDMI companion chip, when fitted.
    pub hdmi: Option<Arc<dyn HdmiChip>>,
}

pub struct Adapter {
    regs: Arc<dyn RegisterIo>,
    clock: Arc<dyn Clock>,
    hdmi: Option<Arc<dyn HdmiChip>>,
    revision: ChipRevision,
    presence: Arc<Presence>,
    pipeline: Arc<Pipeline>,
    mode: Arc<ModeController>,
    hotplug: HotplugMachine,
}

impl Adapter {
    pub fn new(io: AdapterIo, config: PipelineConfig, revision: ChipRevision) -> Result<Self> {
        let presence = Arc::new(Presence::new());
        let pipeline = Pipeline::new(config, io.transport.clone(), io.clock.clone(), presence.clone())?;
        let mode = Arc::new(ModeController::new(
            io.regs.clone(),
            io.transport.clone(),
            pipeline.clone(),
            io.hdmi.clone(),
        ));
        let hotplug = HotplugMachine::new(
            io.regs.clone(),
            io.clock.clone(),
            io.i2c.clone(),
            io.hdmi.clone(),
            presence.clone(),
            pipeline.clone(),
            mode.clone(),
            revision,
        );

        Ok(Self {
            regs: io.regs,
            clock: io.clock,
            hdmi: io.hdmi,
            revision,
            presence,
            pipeline,
            mode,
            hotplug,
        })
    }

    /// Bring the adapter into a known state.
    pub fn initialize(&self) -> Result<()> {
        self.ensure_present()?;
        log::info!("usbdisp: initializing {:?} adapter", self.revision);

        self.regs.set_bit(regs::APP_RESET, regs::APP_RESET_BIT)?;

        if let Some(hdmi) = &self.hdmi {
            hdmi.reset()?;
            if !hdmi.is_powered_up() {
                hdmi.power_up()?;
            }
        }

        if self.revision == ChipRevision::Dx {
            let detect = (I2cCtrlBits::VGA_DETECT | I2cCtrlBits::EXT_MON_DETECT).bits();
            self.regs.modify(regs::I2C_CTRL, |v| v | detect)?;
            self.regs.modify(regs::HW_RESET_CTRL, |v| v & regs::HW_RESET_KEEP)?;
        }

        Ok(())
    }

    fn ensure_present(&self) -> Result<()> {
        if self.pipeline.is_device_gone() {
            return Err(Error::DeviceGone);
        }
        Ok(())
    }

    /// Off requests always succeed, even once the device is gone.
    pub fn set_display_mode(&self, mode: DisplayMode) -> Result<Option<DisplayParams>> {
        if !mode.is_off() {
            self.ensure_present()?;
        }
        Ok(self.mode.set_display_mode(&mode)?)
    }

    pub fn submit_frame(&self, frame: Frame) -> FrameOutcome {
        if self.pipeline.is_device_gone() {
            return FrameOutcome::Dropped(DropReason::DeviceGone);
        }
        self.pipeline.submit_frame(frame)
    }

    /// Host loop step; see [`Pipeline::poll`].
    pub fn poll(&self) -> usize {
        self.pipeline.poll()
    }

    /// Feed an interrupt status word to the hotplug machine.
    pub fn handle_interrupt_status(&self, status: u32) -> HotplugEvent {
        self.hotplug.handle_status(status)
    }

    /// Read the interrupt status register and run the hotplug machine.
    pub fn check_connection(&self) -> Result<HotplugEvent> {
        self.ensure_present()?;
        let status = self.regs.read(regs::INT_STATUS)?;
        Ok(self.hotplug.handle_status(status))
    }

    pub fn presence(&self) -> &Arc<Presence> {
        &self.presence
    }

    pub fn is_monitor_present(&self) -> bool {
        self.presence.is_present()
    }

    /// Block until presence changes after generation `seen`.
    pub fn wait_for_presence_change(&self, seen: u32, timeout_ms: u32) -> Option<u32> {
        self.presence.wait_for_change(seen, timeout_ms, &*self.clock)
    }

    pub fn capability_block(&self) -> CapabilityBlock {
        self.hotplug.capability_block()
    }

    pub fn display_params(&self) -> Option<DisplayParams> {
        self.pipeline.params()
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn mode_controller(&self) -> &Arc<ModeController> {
        &self.mode
    }

    pub fn is_device_gone(&self) -> bool {
        self.pipeline.is_device_gone()
    }

    /// Stop streaming and release every transfer buffer.
    ///
    /// Returns the number of buffers reclaimed. Fails if transfers are still
    /// outstanding after `timeout_ms`.
    pub fn shutdown(&self, timeout_ms: u32) -> Result<usize> {
        log::info!("usbdisp: shutting down");
        Ok(self.pipeline.shutdown(timeout_ms)?)
    }
}
