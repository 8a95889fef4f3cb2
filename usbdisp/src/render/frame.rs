//! Frames and line encoding.

use alloc::sync::Arc;

use crate::mode::format::{pack_555, pack_565, rgb565_to_555};
use crate::mode::{ColorFormat, ColorMode16, DisplayParams, OutputImage};

/// One framebuffer update.
///
/// Cloning shares the pixel buffer; it stays alive until the last render
/// context referencing it returns to free.
#[derive(Clone)]
pub struct Frame {
    pixels: Arc<[u8]>,
    width: u32,
    height: u32,
    stride: usize,
    format: ColorFormat,
    frame_num: u64,
}

impl Frame {
    /// Tightly packed frame (`stride = width * bpp`).
    pub fn new(pixels: Arc<[u8]>, width: u32, height: u32, format: ColorFormat, frame_num: u64) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        Self::with_stride(pixels, width, height, stride, format, frame_num)
    }

    pub fn with_stride(
        pixels: Arc<[u8]>,
        width: u32,
        height: u32,
        stride: usize,
        format: ColorFormat,
        frame_num: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            stride,
            format,
            frame_num,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn line_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Pixel bytes of line `y`, without stride padding.
    pub fn line(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.pixels.get(start..start + self.line_bytes())
    }

    /// Buffer holds every line the geometry claims.
    pub fn is_complete(&self) -> bool {
        if self.stride < self.line_bytes() {
            return false;
        }
        match self.height {
            0 => true,
            h => (h as usize - 1) * self.stride + self.line_bytes() <= self.pixels.len(),
        }
    }

    /// Geometry and input format agree with the negotiated mode.
    pub fn matches(&self, params: &DisplayParams) -> bool {
        self.width == params.width
            && self.height == params.height
            && self.format == params.input_format
            && self.is_complete()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("frame_num", &self.frame_num)
            .finish()
    }
}

/// How source pixels become wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEncoding {
    /// Raw copy, `bpp` bytes per pixel.
    Copy(usize),
    Rgb24To565,
    Rgb24To555,
    Rgb565To555,
}

impl LineEncoding {
    pub fn new(input: ColorFormat, output: OutputImage) -> Self {
        match (input, output) {
            (ColorFormat::Rgb24, OutputImage::Rgb16(ColorMode16::Rgb565)) => Self::Rgb24To565,
            (ColorFormat::Rgb24, OutputImage::Rgb16(ColorMode16::Rgb555)) => Self::Rgb24To555,
            (ColorFormat::Rgb565, OutputImage::Rgb16(ColorMode16::Rgb555)) => Self::Rgb565To555,
            (input, _) => Self::Copy(input.bytes_per_pixel()),
        }
    }

    pub fn src_bpp(&self) -> usize {
        match self {
            Self::Copy(bpp) => *bpp,
            Self::Rgb24To565 | Self::Rgb24To555 => 3,
            Self::Rgb565To555 => 2,
        }
    }

    pub fn dst_bpp(&self) -> usize {
        match self {
            Self::Copy(bpp) => *bpp,
            Self::Rgb24To565 | Self::Rgb24To555 | Self::Rgb565To555 => 2,
        }
    }

    /// Pixels per `capacity`-byte transfer; at least one.
    pub fn pixels_per_chunk(&self, capacity: usize) -> usize {
        (capacity / self.dst_bpp()).max(1)
    }

    /// Encode whole pixels of `src` into `dst`. Returns bytes written.
    pub fn encode(&self, src: &[u8], dst: &mut [u8]) -> usize {
        let pixels = (src.len() / self.src_bpp()).min(dst.len() / self.dst_bpp());
        let written = pixels * self.dst_bpp();

        match self {
            Self::Copy(bpp) => {
                let n = pixels * bpp;
                dst[..n].copy_from_slice(&src[..n]);
            }
            Self::Rgb24To565 | Self::Rgb24To555 => {
                let pack = if *self == Self::Rgb24To565 { pack_565 } else { pack_555 };
                for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(2)).take(pixels) {
                    // stored B, G, R
                    let v = pack(s[2], s[1], s[0]);
                    d.copy_from_slice(&v.to_le_bytes());
                }
            }
            Self::Rgb565To555 => {
                for (s, d) in src.chunks_exact(2).zip(dst.chunks_exact_mut(2)).take(pixels) {
                    let v = rgb565_to_555(u16::from_le_bytes([s[0], s[1]]));
                    d.copy_from_slice(&v.to_le_bytes());
                }
            }
        }

        written
    }
}
