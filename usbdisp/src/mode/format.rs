//! Pixel formats.

use core::fmt;

/// Framebuffer / requested color format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// 3 bytes per pixel, stored B, G, R.
    Rgb24,
    /// 2 bytes per pixel, little-endian `RRRRRGGG GGGBBBBB`.
    Rgb565,
    /// 2 bytes per pixel, little-endian `0RRRRRGG GGGBBBBB`.
    Rgb555,
}

impl ColorFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgb565 | Self::Rgb555 => 2,
        }
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb24 => "RGB24",
            Self::Rgb565 => "RGB565",
            Self::Rgb555 => "RGB555",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode16 {
    Rgb565,
    Rgb555,
}

/// Representation the adapter sends to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputImage {
    Rgb24,
    Rgb16(ColorMode16),
}

impl OutputImage {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgb16(_) => 2,
        }
    }

    /// Wire color format of this output.
    pub fn color_format(&self) -> ColorFormat {
        match self {
            Self::Rgb24 => ColorFormat::Rgb24,
            Self::Rgb16(ColorMode16::Rgb565) => ColorFormat::Rgb565,
            Self::Rgb16(ColorMode16::Rgb555) => ColorFormat::Rgb555,
        }
    }
}

impl From<ColorFormat> for OutputImage {
    fn from(format: ColorFormat) -> Self {
        match format {
            ColorFormat::Rgb24 => Self::Rgb24,
            ColorFormat::Rgb565 => Self::Rgb16(ColorMode16::Rgb565),
            ColorFormat::Rgb555 => Self::Rgb16(ColorMode16::Rgb555),
        }
    }
}

/// Pack 8-bit components into RGB565.
#[inline]
pub fn pack_565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Pack 8-bit components into RGB555.
#[inline]
pub fn pack_555(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 10) | ((g as u16 >> 3) << 5) | (b as u16 >> 3)
}

/// Drop the low green bit of an RGB565 pixel.
#[inline]
pub fn rgb565_to_555(v: u16) -> u16 {
    ((v >> 11) << 10) | (((v >> 6) & 0x1F) << 5) | (v & 0x1F)
}
