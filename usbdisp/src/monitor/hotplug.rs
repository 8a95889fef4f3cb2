//! Hotplug state machine.
//!
//! ```text
//!            connected (mark, reject U1/U2, read EDID, wake)
//!   Absent ───────────────────────────────────────────────▶ Present
//!      ◀───────────────────────────────────────────────────
//!     disconnected (mark, wake, stop pipeline, drop EDID/PLL, LPM bits)
//! ```
//!
//! A signal for the state already held is ignored. Register failures in
//! either transition are logged and the rest of the transition still runs.

use alloc::sync::Arc;

use spin::Mutex;

use super::edid::CapabilityBlock;
use super::presence::Presence;
use crate::config::ChipRevision;
use crate::driver::traits::{Clock, HdmiChip, I2cBus, RegisterIo};
use crate::error::RegisterError;
use crate::mode::ModeController;
use crate::regs::{self, BusCtrlBits, IntCtrlBits, RegisterIoExt, VgaStatus};
use crate::render::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugEvent {
    PluggedIn,
    PluggedOut,
    /// Already in the signalled state.
    Ignored,
}

pub struct HotplugMachine {
    regs: Arc<dyn RegisterIo>,
    clock: Arc<dyn Clock>,
    i2c: Option<Arc<dyn I2cBus>>,
    hdmi: Option<Arc<dyn HdmiChip>>,
    presence: Arc<Presence>,
    pipeline: Arc<Pipeline>,
    mode: Arc<ModeController>,
    revision: ChipRevision,
    i2c_delay_ms: u32,
    edid: Mutex<CapabilityBlock>,
}

impl HotplugMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        regs: Arc<dyn RegisterIo>,
        clock: Arc<dyn Clock>,
        i2c: Option<Arc<dyn I2cBus>>,
        hdmi: Option<Arc<dyn HdmiChip>>,
        presence: Arc<Presence>,
        pipeline: Arc<Pipeline>,
        mode: Arc<ModeController>,
        revision: ChipRevision,
    ) -> Self {
        let i2c_delay_ms = pipeline.config().i2c_delay_ms;
        Self {
            regs,
            clock,
            i2c,
            hdmi,
            presence,
            pipeline,
            mode,
            revision,
            i2c_delay_ms,
            edid: Mutex::new(CapabilityBlock::new()),
        }
    }

    /// Run the state machine on a raw interrupt status word.
    pub fn handle_status(&self, status: u32) -> HotplugEvent {
        let status = VgaStatus::from_bits_retain(status);
        log::debug!("usbdisp: interrupt status {:?}", status);
        self.handle_signal(status.is_connected())
    }

    pub fn handle_signal(&self, connected: bool) -> HotplugEvent {
        match (connected, self.presence.is_present()) {
            (true, false) => {
                self.plug_in();
                HotplugEvent::PluggedIn
            }
            (false, true) => {
                self.plug_out();
                HotplugEvent::PluggedOut
            }
            (connected, _) => {
                log::warn!(
                    "usbdisp: redundant {} signal ignored",
                    if connected { "plug-in" } else { "plug-out" }
                );
                HotplugEvent::Ignored
            }
        }
    }

    fn plug_in(&self) {
        log::info!("usbdisp: monitor plugged in");
        self.presence.mark(true);

        if self.revision == ChipRevision::Dx {
            warn_on_failure("LPM wake", self.regs.clear_bit(regs::LPM_WORKAROUND, regs::LPM_WAKE_BIT));
        }
        let reject = (BusCtrlBits::REJECT_U1 | BusCtrlBits::REJECT_U2).bits();
        warn_on_failure("U1/U2 reject", self.regs.modify(regs::BUS_CTRL, |v| v | reject).map(|_| ()));

        self.read_capability_block();
        self.presence.notify();
    }

    fn plug_out(&self) {
        log::info!("usbdisp: monitor unplugged");
        self.presence.mark(false);
        self.presence.notify();

        self.pipeline.stop();
        self.edid.lock().clear();
        self.mode.reset_pll_cache();

        let force_pll = IntCtrlBits::FORCE_PLL_ON.bits();
        warn_on_failure(
            "force PLL off",
            self.regs.modify(regs::INT_CTRL, |v| v & !force_pll).map(|_| ()),
        );
        if self.revision == ChipRevision::Dx {
            warn_on_failure("LPM workaround", self.regs.set_bit(regs::LPM_WORKAROUND, regs::LPM_WAKE_BIT));
        }
    }

    /// Clear and re-read the cached capability block from whichever source
    /// is wired up. The companion chip wins when both are.
    pub fn read_capability_block(&self) -> bool {
        let mut edid = self.edid.lock();
        edid.clear();

        let result = if let Some(hdmi) = &self.hdmi {
            edid.read_from_hdmi(&**hdmi).map_err(|e| log::warn!("usbdisp: EDID via HDMI chip failed: {}", e))
        } else if let Some(i2c) = &self.i2c {
            edid.read_from_i2c(&**i2c, &*self.clock, self.i2c_delay_ms)
                .map_err(|e| log::warn!("usbdisp: EDID via DDC failed: {}", e))
        } else {
            log::debug!("usbdisp: no EDID source");
            Err(())
        };

        match result {
            Ok(blocks) => {
                log::debug!("usbdisp: EDID read, {} blocks", blocks);
                true
            }
            Err(()) => false,
        }
    }

    pub fn capability_block(&self) -> CapabilityBlock {
        self.edid.lock().clone()
    }

    pub fn presence(&self) -> &Arc<Presence> {
        &self.presence
    }
}

fn warn_on_failure(what: &str, result: Result<(), RegisterError>) {
    if let Err(e) = result {
        log::warn!("usbdisp: {} failed: {}", what, e);
    }
}
