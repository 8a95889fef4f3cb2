//! Mode-setting controller.
//!
//! # Sequence
//! ```text
//! stop pipeline ─► (off? done) ─► negotiate ─► timing lookup
//!   ─► PLL (only if changed) ─► soft reset ─► PLL read-back
//!   ─► INT_CTRL ─► FORMAT ─► H/V sync  (each write + read-back)
//!   ─► ISO_CTRL / BUS_CTRL ─► select interface ─► start ─► HDMI re-init
//! ```
//!
//! Any failure returns before the pipeline is restarted, so the green light
//! is never on over a half-programmed register set.

use alloc::sync::Arc;

use spin::Mutex;

use super::params::{DisplayMode, DisplayParams};
use super::timing;
use crate::driver::traits::{BulkTransport, HdmiChip, RegisterIo};
use crate::error::{ModeError, ModeStep, RegisterError};
use crate::regs::{self, BusCtrlBits, RegisterIoExt, VerifyError};
use crate::render::Pipeline;

pub struct ModeController {
    regs: Arc<dyn RegisterIo>,
    transport: Arc<dyn BulkTransport>,
    pipeline: Arc<Pipeline>,
    hdmi: Option<Arc<dyn HdmiChip>>,
    /// Last PLL value known to be in the register. `None` forces a write.
    pll: Mutex<Option<u32>>,
    /// Resolution of the last successful mode set. Survives display-off.
    geometry: Mutex<Option<(u32, u32)>>,
}

impl ModeController {
    pub fn new(
        regs: Arc<dyn RegisterIo>,
        transport: Arc<dyn BulkTransport>,
        pipeline: Arc<Pipeline>,
        hdmi: Option<Arc<dyn HdmiChip>>,
    ) -> Self {
        Self {
            regs,
            transport,
            pipeline,
            hdmi,
            pll: Mutex::new(None),
            geometry: Mutex::new(None),
        }
    }

    /// Change resolution and formats.
    ///
    /// Blocks until every busy context has drained. Returns the negotiated
    /// parameters, or `None` when `mode` turns the display off. Turning the
    /// display off succeeds even after the device is gone.
    pub fn set_display_mode(&self, mode: &DisplayMode) -> Result<Option<DisplayParams>, ModeError> {
        self.pipeline.stop();
        self.pipeline.clear_last_frame();
        self.pipeline.set_params(None);

        if mode.is_off() {
            log::info!("usbdisp: display off");
            return Ok(None);
        }

        if self.pipeline.is_device_gone() {
            return Err(ModeError::DeviceGone);
        }

        let mut params = DisplayParams::negotiate(mode, self.transport.link_speed());
        if params.overridden {
            log::info!(
                "usbdisp: low-bandwidth link, {}x{}@{} forced to {}",
                mode.width,
                mode.height,
                mode.refresh,
                params
            );
        }

        let entry = timing::lookup(params.table, params.width, params.height, params.refresh)
            .ok_or(ModeError::UnsupportedMode {
                width: params.width,
                height: params.height,
                refresh: params.refresh,
            })?;
        params.apply_timing(entry);

        let resolution_changed = *self.geometry.lock() != Some((params.width, params.height));

        self.program_pll(entry.pll)?;
        self.program_registers(&params, entry)?;

        self.transport
            .select_interface()
            .map_err(ModeError::InterfaceSelect)?;

        self.pipeline.set_params(Some(params));
        if !self.pipeline.start() {
            self.pipeline.set_params(None);
            return Err(ModeError::DeviceGone);
        }
        *self.geometry.lock() = Some((params.width, params.height));

        if let Some(hdmi) = &self.hdmi {
            if let Err(e) = hdmi.init(&params, resolution_changed) {
                log::warn!("usbdisp: HDMI re-init for {} failed: {}", params, e);
            }
        }

        log::info!("usbdisp: mode set {}", params);
        Ok(Some(params))
    }

    fn program_pll(&self, pll: u32) -> Result<(), ModeError> {
        let mut cached = self.pll.lock();
        let changed = *cached != Some(pll);

        if changed {
            log::debug!("usbdisp: PLL -> {:#010x}", pll);
            // unknown until the read-back below agrees
            *cached = None;
            self.regs
                .write(regs::PLL, pll)
                .map_err(step_error(ModeStep::Pll))?;
        }

        self.regs
            .set_bit(regs::APP_RESET, regs::APP_RESET_BIT)
            .map_err(step_error(ModeStep::SoftReset))?;

        let actual = self
            .regs
            .read(regs::PLL)
            .map_err(step_error(ModeStep::Pll))?;
        if actual != pll {
            *cached = None;
            log::error!("usbdisp: PLL read back {:#010x}, wrote {:#010x}", actual, pll);
            return Err(ModeError::PllMismatch { expected: pll, actual });
        }

        *cached = Some(pll);
        Ok(())
    }

    fn program_registers(&self, params: &DisplayParams, entry: &timing::TimingEntry) -> Result<(), ModeError> {
        let current = self
            .regs
            .read(regs::INT_CTRL)
            .map_err(step_error(ModeStep::InterruptControl))?;
        self.verified(ModeStep::InterruptControl, regs::INT_CTRL, regs::int_ctrl_value(current))?;

        let current = self
            .regs
            .read(regs::FORMAT)
            .map_err(step_error(ModeStep::PixelFormat))?;
        let format = regs::format_value(current, params.output, params.compression);
        self.verified(ModeStep::PixelFormat, regs::FORMAT, format)?;

        let offsets = [regs::H_SYNC1, regs::H_SYNC2, regs::V_SYNC1, regs::V_SYNC2];
        let values = entry.sync_registers(self.hdmi.is_some());
        for (offset, value) in offsets.into_iter().zip(values) {
            self.verified(ModeStep::Timing, offset, value)?;
        }

        self.regs
            .modify(regs::ISO_CTRL, |v| v & regs::ISO_CTRL_KEEP)
            .map_err(step_error(ModeStep::IsoControl))?;
        self.regs
            .modify(regs::BUS_CTRL, |v| v | BusCtrlBits::VIDEO_ENABLE.bits())
            .map_err(step_error(ModeStep::BusControl))?;

        Ok(())
    }

    fn verified(&self, step: ModeStep, offset: u32, value: u32) -> Result<(), ModeError> {
        log::debug!("usbdisp: {:?} {:#06x} <- {:#010x}", step, offset, value);
        self.regs.write_verify(offset, value).map_err(|e| match e {
            VerifyError::Io(error) => ModeError::Register { step, error },
            VerifyError::Mismatch { offset, wrote, read } => {
                log::error!(
                    "usbdisp: register {:#06x} verify failed: wrote {:#010x}, read {:#010x}",
                    offset,
                    wrote,
                    read
                );
                ModeError::VerifyMismatch { offset, wrote, read }
            }
        })
    }

    /// Forget the programmed PLL so the next mode set rewrites it.
    pub fn reset_pll_cache(&self) {
        *self.pll.lock() = None;
    }

    pub fn cached_pll(&self) -> Option<u32> {
        *self.pll.lock()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

fn step_error(step: ModeStep) -> impl Fn(RegisterError) -> ModeError {
    move |error| ModeError::Register { step, error }
}
