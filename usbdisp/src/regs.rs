//! Adapter register offsets, bit definitions and access helpers.
//!
//! Offsets are opaque configuration points; only the bits this driver
//! touches are named.

use bitflags::bitflags;

use crate::driver::traits::RegisterIo;
use crate::error::RegisterError;
use crate::mode::{ColorMode16, OutputImage};

// ═══════════════════════════════════════════════════════════════════════════
// REGISTER OFFSETS
// ═══════════════════════════════════════════════════════════════════════════

pub const INT_STATUS: u32 = 0x8000;
pub const FORMAT: u32 = 0x8004;
pub const H_SYNC1: u32 = 0x8008;
pub const H_SYNC2: u32 = 0x800C;
pub const V_SYNC1: u32 = 0x8010;
pub const V_SYNC2: u32 = 0x8014;
pub const ISO_CTRL: u32 = 0x801C;
pub const I2C_CTRL: u32 = 0x8020;
pub const I2C_DATA_RD: u32 = 0x8024;
pub const I2C_DATA_WR: u32 = 0x8028;
pub const PLL: u32 = 0x802C;
pub const INT_CTRL: u32 = 0x803C;
pub const APP_RESET: u32 = 0x8048;
pub const HW_RESET_CTRL: u32 = 0x8088;
pub const BUS_CTRL: u32 = 0x0070;
pub const LPM_WORKAROUND: u32 = 0x0078;

/// Self-clearing application reset bit in `APP_RESET`.
pub const APP_RESET_BIT: u32 = 15;

/// `LPM_WORKAROUND` bit: set while no monitor is attached (Dx only).
pub const LPM_WAKE_BIT: u32 = 17;

/// Bits kept in `HW_RESET_CTRL` at bring-up.
pub const HW_RESET_KEEP: u32 = 1 << 10;

/// `ISO_CTRL` bits 29:16 are cleared after timing is programmed.
pub const ISO_CTRL_KEEP: u32 = 0xC000_FFFF;

bitflags! {
    /// Pixel format / color mode register (`FORMAT`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatBits: u32 {
        const RESET_VGA_CSC   = 1 << 0;
        const RGB565          = 1 << 6;
        const EXTERNAL_DAC    = 1 << 7;
        const COMPRESSION     = 1 << 24;
        const RGB8            = 1 << 25;
        const PALETTE_256     = 1 << 26;
        const FIRST_BYTE_MASK = 1 << 27;
        /// Active low.
        const RESET_DEFAULT   = 1 << 28;
        const RGB555          = 1 << 31;

        const _ = !0;
    }
}

bitflags! {
    /// Interrupt control register (`INT_CTRL`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntCtrlBits: u32 {
        const ISO_FRAME_FEEDBACK = 1 << 13;
        const ISO_AUTO_RECOVER   = (1 << 19) | (1 << 21);
        const BIA                = 1 << 22;
        const ISO_ERR_INT        = 1 << 24;
        const FORCE_PLL_ON       = 1 << 26;
        /// End-of-frame type field, bits 29:27.
        const END_MASK           = 0b111 << 27;
        const END_ZERO_BULK      = 1 << 28;

        const _ = !0;
    }
}

bitflags! {
    /// USB bus control register (`BUS_CTRL`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusCtrlBits: u32 {
        const VIDEO_ENABLE = 1 << 13;
        const REJECT_U2    = 1 << 19;
        const REJECT_U1    = 1 << 20;

        const _ = !0;
    }
}

bitflags! {
    /// I2C controller register (`I2C_CTRL`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cCtrlBits: u32 {
        const EXT_MON_DETECT = 1 << 28;
        const VGA_DETECT     = 1 << 30;

        const _ = !0;
    }
}

bitflags! {
    /// Monitor bits of the interrupt status word (`INT_STATUS`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VgaStatus: u32 {
        const CONNECTED         = 1 << 19;
        const EXT_MON_CONNECTED = 1 << 20;
        const EDID_CONNECTED    = 1 << 21;

        const _ = !0;
    }
}

impl VgaStatus {
    pub fn is_connected(&self) -> bool {
        self.contains(Self::CONNECTED)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCESS HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Write-then-read-back failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    Io(RegisterError),
    Mismatch { offset: u32, wrote: u32, read: u32 },
}

impl From<RegisterError> for VerifyError {
    fn from(e: RegisterError) -> Self {
        Self::Io(e)
    }
}

/// Read-modify-write helpers on top of [`RegisterIo`].
pub trait RegisterIoExt: RegisterIo {
    fn modify<F>(&self, offset: u32, f: F) -> Result<u32, RegisterError>
    where
        F: FnOnce(u32) -> u32,
    {
        let value = f(self.read(offset)?);
        self.write(offset, value)?;
        Ok(value)
    }

    fn set_bit(&self, offset: u32, bit: u32) -> Result<(), RegisterError> {
        self.modify(offset, |v| v | (1 << bit)).map(|_| ())
    }

    fn clear_bit(&self, offset: u32, bit: u32) -> Result<(), RegisterError> {
        self.modify(offset, |v| v & !(1 << bit)).map(|_| ())
    }

    fn check_bit(&self, offset: u32, bit: u32) -> Result<bool, RegisterError> {
        Ok(self.read(offset)? & (1 << bit) != 0)
    }

    fn write_verify(&self, offset: u32, value: u32) -> Result<(), VerifyError> {
        self.write(offset, value)?;
        let read = self.read(offset)?;
        if read != value {
            return Err(VerifyError::Mismatch { offset, wrote: value, read });
        }
        Ok(())
    }
}

impl<T: RegisterIo + ?Sized> RegisterIoExt for T {}

/// Compute the `FORMAT` value for an output mode from the current value.
pub fn format_value(current: u32, output: OutputImage, compression: bool) -> u32 {
    let mut bits = FormatBits::from_bits_retain(current);

    bits.remove(
        FormatBits::RESET_DEFAULT
            | FormatBits::RGB565
            | FormatBits::RGB555
            | FormatBits::COMPRESSION
            | FormatBits::RGB8
            | FormatBits::PALETTE_256
            | FormatBits::FIRST_BYTE_MASK,
    );
    bits.insert(FormatBits::RESET_VGA_CSC);

    if compression {
        bits.insert(FormatBits::COMPRESSION);
    }

    match output {
        OutputImage::Rgb16(ColorMode16::Rgb555) => bits.insert(FormatBits::RGB555),
        OutputImage::Rgb16(ColorMode16::Rgb565) => bits.insert(FormatBits::RGB565),
        OutputImage::Rgb24 => {}
    }

    bits.insert(FormatBits::EXTERNAL_DAC);
    bits.bits()
}

/// Compute the `INT_CTRL` value from the current value.
pub fn int_ctrl_value(current: u32) -> u32 {
    let mut bits = IntCtrlBits::from_bits_retain(current);
    bits.remove(
        IntCtrlBits::BIA
            | IntCtrlBits::ISO_ERR_INT
            | IntCtrlBits::ISO_AUTO_RECOVER
            | IntCtrlBits::ISO_FRAME_FEEDBACK
            | IntCtrlBits::END_MASK,
    );
    bits.insert(IntCtrlBits::END_ZERO_BULK);
    bits.bits()
}
