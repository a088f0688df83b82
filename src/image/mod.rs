//! 8-bit rasters produced from DICOM pixel data, and their JPEG encoding

mod jpeg;
mod normalization;

pub use jpeg::encode_jpeg;
pub use normalization::{normalize_frame, normalize_pixels, percentile, FLAT_FILL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Gray,
    Rgb,
}

impl Channels {
    #[inline]
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
        }
    }
}

/// Row-major 8-bit raster, channels interleaved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    width: u32,
    height: u32,
    channels: Channels,
    pixels: Vec<u8>,
}

impl NormalizedImage {
    pub(crate) fn new(width: u32, height: u32, channels: Channels, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * channels.count()
        );
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    #[must_use]
    pub fn channels(&self) -> Channels {
        self.channels
    }

    #[inline(always)]
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
