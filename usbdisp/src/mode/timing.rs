//! Video timing tables.
//!
//! Entries are derived at compile time from standard VESA/CEA timings.
//!
//! # Register encoding
//! ```text
//! H_SYNC1 = (h_total << 16)  | h_active
//! H_SYNC2 = (h_sync  << 16)  | (h_sync + h_back_porch + 1)
//! V_SYNC1 = (v_total << 16)  | v_active
//! V_SYNC2 = (v_sync  << 16)  | (v_sync + v_back_porch + 1)
//! PLL     = (post_div << 16) | (feedback_div << 8) | ref_div
//! ```

use super::format::OutputImage;

/// PLL reference clock (kHz).
pub const PLL_REF_KHZ: u32 = 10_000;

/// Lowest VCO frequency the PLL locks at (kHz).
pub const PLL_VCO_MIN_KHZ: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingTable {
    /// 24-bit output.
    Bits24,
    /// 16-bit (565/555) output.
    Bits16,
}

impl TimingTable {
    pub fn for_output(output: OutputImage) -> Self {
        match output {
            OutputImage::Rgb24 => Self::Bits24,
            OutputImage::Rgb16(_) => Self::Bits16,
        }
    }

    pub fn entries(&self) -> &'static [TimingEntry] {
        match self {
            Self::Bits24 => TABLE_24BIT,
            Self::Bits16 => TABLE_16BIT,
        }
    }
}

/// Precomputed register set for one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingEntry {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub h_sync_reg_1: u32,
    pub h_sync_reg_2: u32,
    pub v_sync_reg_1: u32,
    pub v_sync_reg_2: u32,
    pub h_total_time: u32,
    pub v_total_time: u32,
    pub pll: u32,
}

impl TimingEntry {
    /// Sync registers in programming order (`H_SYNC1`, `H_SYNC2`, `V_SYNC1`,
    /// `V_SYNC2`), with the adjustments an HDMI companion chip needs.
    pub fn sync_registers(&self, hdmi: bool) -> [u32; 4] {
        let mut h2 = self.h_sync_reg_2;
        let mut v2 = self.v_sync_reg_2;

        if hdmi && self.refresh == 60 {
            match (self.width, self.height) {
                (640, 480) => {
                    h2 = 0x0060_0091;
                    v2 = 0x0242_0024;
                }
                (1280, 720) => v2 = 0x01A5_001A,
                _ => {}
            }
        }

        [self.h_sync_reg_1, h2, self.v_sync_reg_1, v2]
    }
}

const fn pll_value(pixel_clock_khz: u32) -> u32 {
    let mut post = 1;
    while pixel_clock_khz * post < PLL_VCO_MIN_KHZ && post < 0xFF {
        post += 1;
    }
    let feedback = (pixel_clock_khz * post + PLL_REF_KHZ / 2) / PLL_REF_KHZ;
    (post << 16) | ((feedback & 0xFF) << 8) | 1
}

const fn vesa(
    width: u32,
    height: u32,
    refresh: u32,
    pixel_clock_khz: u32,
    (h_front, h_sync, h_back): (u32, u32, u32),
    (v_front, v_sync, v_back): (u32, u32, u32),
) -> TimingEntry {
    let h_total = width + h_front + h_sync + h_back;
    let v_total = height + v_front + v_sync + v_back;
    TimingEntry {
        width,
        height,
        refresh,
        h_sync_reg_1: (h_total << 16) | width,
        h_sync_reg_2: (h_sync << 16) | (h_sync + h_back + 1),
        v_sync_reg_1: (v_total << 16) | height,
        v_sync_reg_2: (v_sync << 16) | (v_sync + v_back + 1),
        h_total_time: h_total,
        v_total_time: v_total,
        pll: pll_value(pixel_clock_khz),
    }
}

const MODE_640X480_60: TimingEntry = vesa(640, 480, 60, 25_175, (16, 96, 48), (10, 2, 33));
const MODE_640X480_75: TimingEntry = vesa(640, 480, 75, 31_500, (16, 64, 120), (1, 3, 16));
const MODE_800X600_60: TimingEntry = vesa(800, 600, 60, 40_000, (40, 128, 88), (1, 4, 23));
const MODE_800X600_75: TimingEntry = vesa(800, 600, 75, 49_500, (16, 80, 160), (1, 3, 21));
const MODE_1024X768_60: TimingEntry = vesa(1024, 768, 60, 65_000, (24, 136, 160), (3, 6, 29));
const MODE_1024X768_75: TimingEntry = vesa(1024, 768, 75, 78_750, (16, 96, 176), (1, 3, 28));
const MODE_1280X720_60: TimingEntry = vesa(1280, 720, 60, 74_250, (110, 40, 220), (5, 5, 20));
const MODE_1280X800_60: TimingEntry = vesa(1280, 800, 60, 83_500, (72, 128, 200), (3, 6, 22));
const MODE_1280X1024_60: TimingEntry = vesa(1280, 1024, 60, 108_000, (48, 112, 248), (1, 3, 38));
const MODE_1360X768_60: TimingEntry = vesa(1360, 768, 60, 85_500, (64, 112, 256), (3, 6, 18));
const MODE_1366X768_60: TimingEntry = vesa(1366, 768, 60, 85_500, (70, 143, 213), (3, 3, 24));
const MODE_1440X900_60: TimingEntry = vesa(1440, 900, 60, 106_500, (80, 152, 232), (3, 6, 25));
// reduced blanking
const MODE_1600X900_60: TimingEntry = vesa(1600, 900, 60, 108_000, (24, 80, 96), (1, 3, 96));
const MODE_1680X1050_60: TimingEntry = vesa(1680, 1050, 60, 146_250, (104, 176, 280), (3, 6, 30));
const MODE_1920X1080_60: TimingEntry = vesa(1920, 1080, 60, 148_500, (88, 44, 148), (4, 5, 36));

static TABLE_24BIT: &[TimingEntry] = &[
    MODE_640X480_60,
    MODE_640X480_75,
    MODE_800X600_60,
    MODE_800X600_75,
    MODE_1024X768_60,
    MODE_1024X768_75,
    MODE_1280X720_60,
    MODE_1280X800_60,
    MODE_1280X1024_60,
    MODE_1360X768_60,
    MODE_1366X768_60,
    MODE_1440X900_60,
    MODE_1600X900_60,
    MODE_1680X1050_60,
    MODE_1920X1080_60,
];

static TABLE_16BIT: &[TimingEntry] = &[
    MODE_640X480_60,
    MODE_800X600_60,
    MODE_1024X768_60,
    MODE_1280X720_60,
    MODE_1280X800_60,
    MODE_1280X1024_60,
    MODE_1360X768_60,
    MODE_1366X768_60,
    MODE_1440X900_60,
    MODE_1600X900_60,
    MODE_1680X1050_60,
    MODE_1920X1080_60,
];

pub fn lookup(table: TimingTable, width: u32, height: u32, refresh: u32) -> Option<&'static TimingEntry> {
    table
        .entries()
        .iter()
        .find(|e| e.width == width && e.height == height && e.refresh == refresh)
}

/// Whether any table carries the mode.
pub fn is_supported(width: u32, height: u32, refresh: u32) -> bool {
    lookup(TimingTable::Bits24, width, height, refresh).is_some()
        || lookup(TimingTable::Bits16, width, height, refresh).is_some()
}
