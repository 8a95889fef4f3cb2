//! Requested and negotiated display parameters.

use core::fmt;

use super::format::{ColorFormat, ColorMode16, OutputImage};
use super::timing::{TimingEntry, TimingTable};
use crate::config::LinkSpeed;

/// Highest refresh rate the lower-bandwidth link can carry.
pub const LOW_BANDWIDTH_MAX_REFRESH: u32 = 60;

/// A mode request from the host display subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub input: ColorFormat,
    pub output: ColorFormat,
    pub compression: bool,
}

impl DisplayMode {
    pub const fn new(
        width: u32,
        height: u32,
        refresh: u32,
        input: ColorFormat,
        output: ColorFormat,
    ) -> Self {
        Self {
            width,
            height,
            refresh,
            input,
            output,
            compression: false,
        }
    }

    /// 24-bit in, 24-bit out.
    pub const fn rgb24(width: u32, height: u32, refresh: u32) -> Self {
        Self::new(width, height, refresh, ColorFormat::Rgb24, ColorFormat::Rgb24)
    }

    /// Degenerate 0x0 geometry: turn the display off.
    pub const fn off() -> Self {
        Self::new(0, 0, 0, ColorFormat::Rgb24, ColorFormat::Rgb24)
    }

    pub const fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn is_off(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Negotiated geometry and formats, as programmed into the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayParams {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub input_format: ColorFormat,
    pub input_bpp: u32,
    pub output: OutputImage,
    pub compression: bool,
    pub pll: u32,
    pub h_total_time: u32,
    pub v_total_time: u32,
    pub table: TimingTable,
    /// The link forced refresh, output format or compression away from the request.
    pub overridden: bool,
}

impl DisplayParams {
    /// Derive formats from a request, applying the low-bandwidth link policy.
    ///
    /// Timing fields stay zero until [`DisplayParams::apply_timing`].
    pub fn negotiate(mode: &DisplayMode, speed: LinkSpeed) -> Self {
        let mut params = Self {
            width: mode.width,
            height: mode.height,
            refresh: mode.refresh,
            input_format: mode.input,
            input_bpp: mode.input.bytes_per_pixel() as u32,
            output: OutputImage::from(mode.output),
            compression: mode.compression,
            pll: 0,
            h_total_time: 0,
            v_total_time: 0,
            table: TimingTable::Bits24,
            overridden: false,
        };

        if speed.is_bandwidth_limited() {
            let forced = OutputImage::Rgb16(ColorMode16::Rgb555);
            params.overridden = params.refresh > LOW_BANDWIDTH_MAX_REFRESH
                || params.output != forced
                || !params.compression;
            params.refresh = params.refresh.min(LOW_BANDWIDTH_MAX_REFRESH);
            params.output = forced;
            params.compression = true;
        }

        params.table = TimingTable::for_output(params.output);
        params
    }

    pub fn apply_timing(&mut self, entry: &TimingEntry) {
        self.pll = entry.pll;
        self.h_total_time = entry.h_total_time;
        self.v_total_time = entry.v_total_time;
    }
}

impl fmt::Display for DisplayParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{} {} -> {}{}",
            self.width,
            self.height,
            self.refresh,
            self.input_format,
            self.output.color_format(),
            if self.compression { " (compressed)" } else { "" }
        )
    }
}
