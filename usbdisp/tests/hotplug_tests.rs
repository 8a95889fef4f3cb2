//! Hotplug state machine and capability block tests

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use common::{adapter, Wiring};
use usbdisp::monitor::HotplugEvent;
use usbdisp::regs::{self, VgaStatus};
use usbdisp::{ChipRevision, DisplayMode};

const CONNECTED: u32 = VgaStatus::CONNECTED.bits();
const DISCONNECTED: u32 = 0;

#[test]
fn test_plug_in() {
    let fx = adapter(ChipRevision::Dx, Wiring::default());
    fx.regs.preset(regs::LPM_WORKAROUND, 1 << 17);
    let seen = fx.adapter.presence().generation();

    assert_eq!(fx.adapter.handle_interrupt_status(CONNECTED), HotplugEvent::PluggedIn);

    assert!(fx.adapter.is_monitor_present());
    assert_eq!(fx.adapter.presence().generation(), seen + 1);
    assert_eq!(fx.regs.value(regs::LPM_WORKAROUND) & (1 << 17), 0);
    let bus = fx.regs.value(regs::BUS_CTRL);
    assert_eq!(bus & ((1 << 19) | (1 << 20)), (1 << 19) | (1 << 20));
}

#[test]
fn test_redundant_signals_ignored() {
    let fx = adapter(ChipRevision::Dx, Wiring::default());

    assert_eq!(fx.adapter.handle_interrupt_status(DISCONNECTED), HotplugEvent::Ignored);
    assert!(fx.regs.writes().is_empty());

    fx.adapter.handle_interrupt_status(CONNECTED);
    fx.regs.clear_log();
    let generation = fx.adapter.presence().generation();

    assert_eq!(fx.adapter.handle_interrupt_status(CONNECTED), HotplugEvent::Ignored);
    assert_eq!(fx.adapter.presence().generation(), generation);
    assert!(fx.regs.writes().is_empty());
}

#[test]
fn test_plug_out() {
    let fx = adapter(ChipRevision::Dx, Wiring { hdmi: false, i2c: true });
    fx.adapter.handle_interrupt_status(CONNECTED);
    fx.adapter.set_display_mode(DisplayMode::rgb24(640, 480, 60)).unwrap();
    assert!(!fx.adapter.capability_block().is_empty());
    assert!(fx.adapter.mode_controller().cached_pll().is_some());

    fx.regs.preset(regs::INT_CTRL, fx.regs.value(regs::INT_CTRL) | (1 << 26));
    fx.regs.clear_log();

    assert_eq!(fx.adapter.handle_interrupt_status(DISCONNECTED), HotplugEvent::PluggedOut);

    assert!(!fx.adapter.is_monitor_present());
    assert!(!fx.adapter.pipeline().is_running());
    assert!(fx.adapter.capability_block().is_empty());
    assert_eq!(fx.adapter.mode_controller().cached_pll(), None);
    assert_eq!(fx.regs.value(regs::INT_CTRL) & (1 << 26), 0);
    assert_ne!(fx.regs.value(regs::LPM_WORKAROUND) & (1 << 17), 0);

    // benign disconnect: no soft reset
    assert!(fx.regs.writes_to(regs::APP_RESET).is_empty());

    // next mode set reprograms the PLL
    fx.adapter.set_display_mode(DisplayMode::rgb24(640, 480, 60)).unwrap();
    assert_eq!(fx.regs.writes_to(regs::PLL).len(), 1);
}

#[test]
fn test_original_revision_leaves_lpm_register() {
    let fx = adapter(ChipRevision::Original, Wiring::default());
    fx.adapter.handle_interrupt_status(CONNECTED);
    fx.adapter.handle_interrupt_status(DISCONNECTED);
    assert!(fx.regs.writes_to(regs::LPM_WORKAROUND).is_empty());
}

#[test]
fn test_register_failure_does_not_block_transition() {
    let fx = adapter(ChipRevision::Dx, Wiring::default());
    fx.regs.fail(regs::BUS_CTRL);

    assert_eq!(fx.adapter.handle_interrupt_status(CONNECTED), HotplugEvent::PluggedIn);
    assert!(fx.adapter.is_monitor_present());
}

#[test]
fn test_edid_over_i2c() {
    let fx = adapter(ChipRevision::Original, Wiring { hdmi: false, i2c: true });
    fx.adapter.handle_interrupt_status(CONNECTED);

    let i2c = fx.i2c.as_ref().unwrap();
    assert_eq!(i2c.reads.load(Ordering::SeqCst), 32);

    let edid = fx.adapter.capability_block();
    let block = edid.block(0).unwrap();
    assert_eq!(&block[..127], &i2c.block[..127]);
    assert_eq!(block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)), 0);
    assert_eq!(edid.valid_blocks(), 1);
}

#[test]
fn test_edid_prefers_hdmi_chip() {
    let fx = adapter(ChipRevision::Original, Wiring { hdmi: true, i2c: true });
    fx.adapter.handle_interrupt_status(CONNECTED);

    assert_eq!(fx.i2c.as_ref().unwrap().reads.load(Ordering::SeqCst), 0);
    // block 0 announces one extension
    assert_eq!(fx.hdmi.as_ref().unwrap().edid_reads.load(Ordering::SeqCst), 2);

    let edid = fx.adapter.capability_block();
    assert_eq!(edid.valid_blocks(), 2);
    assert_eq!(edid.block(1).unwrap()[0], 0xA1);
}

#[test]
fn test_no_edid_source() {
    let fx = adapter(ChipRevision::Original, Wiring::default());
    assert_eq!(fx.adapter.handle_interrupt_status(CONNECTED), HotplugEvent::PluggedIn);
    assert!(fx.adapter.capability_block().is_empty());
}

#[test]
fn test_check_connection_reads_status_register() {
    let fx = adapter(ChipRevision::Original, Wiring::default());
    fx.regs.preset(regs::INT_STATUS, CONNECTED | VgaStatus::EDID_CONNECTED.bits());

    assert_eq!(fx.adapter.check_connection(), Ok(HotplugEvent::PluggedIn));
    assert_eq!(fx.adapter.check_connection(), Ok(HotplugEvent::Ignored));

    fx.regs.preset(regs::INT_STATUS, 0);
    assert_eq!(fx.adapter.check_connection(), Ok(HotplugEvent::PluggedOut));
}

#[test]
fn test_waiter_wakes_on_plug_in() {
    let fx = adapter(ChipRevision::Original, Wiring::default());
    let fx = Arc::new(fx);
    let seen = fx.adapter.presence().generation();

    let waiter = {
        let fx = fx.clone();
        thread::spawn(move || fx.adapter.wait_for_presence_change(seen, 2000))
    };

    fx.adapter.handle_interrupt_status(CONNECTED);
    assert_eq!(waiter.join().unwrap(), Some(seen + 1));
}

#[test]
fn test_wait_times_out_without_change() {
    let fx = adapter(ChipRevision::Original, Wiring::default());
    let seen = fx.adapter.presence().generation();
    assert_eq!(fx.adapter.wait_for_presence_change(seen, 5), None);
}
