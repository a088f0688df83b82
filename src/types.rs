//! Domain-specific types shared by the conversion pipeline

use std::fmt;
use thiserror::Error;

/// Shape of a decoded pixel buffer: `[frames, rows, columns, samples]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelShape {
    pub frames: u32,
    pub rows: u32,
    pub columns: u32,
    pub samples_per_pixel: u16,
}

impl PixelShape {
    #[must_use]
    pub fn new(frames: u32, rows: u32, columns: u32, samples_per_pixel: u16) -> Self {
        Self {
            frames,
            rows,
            columns,
            samples_per_pixel,
        }
    }

    /// Single-frame grayscale shape
    #[must_use]
    pub fn grayscale(rows: u32, columns: u32) -> Self {
        Self::new(1, rows, columns, 1)
    }

    #[inline]
    #[must_use]
    pub fn pixels_per_frame(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Number of samples making up one frame
    #[inline]
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.pixels_per_frame() * usize::from(self.samples_per_pixel)
    }

    /// Total number of samples in the buffer
    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.frame_len() * self.frames as usize
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.frames > 0 && self.rows > 0 && self.columns > 0 && self.samples_per_pixel > 0
    }
}

impl fmt::Display for PixelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{frames}, {rows}, {columns}, {samples}]",
            frames = self.frames,
            rows = self.rows,
            columns = self.columns,
            samples = self.samples_per_pixel
        )
    }
}

/// Modality rescale parameters (slope and intercept)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleParams {
    pub slope: f64,
    pub intercept: f64,
}

impl RescaleParams {
    #[must_use]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    #[inline(always)]
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        value.mul_add(self.slope, self.intercept)
    }
}

impl Default for RescaleParams {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl fmt::Display for RescaleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope={slope}, intercept={intercept}",
            slope = self.slope,
            intercept = self.intercept
        )
    }
}

/// Bit depth information for pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDepth {
    pub allocated: u16,
    pub stored: u16,
    /// Pixel Representation 1 (two's complement samples)
    pub signed: bool,
}

impl BitDepth {
    #[must_use]
    pub fn new(allocated: u16, stored: u16, signed: bool) -> Self {
        Self {
            allocated,
            stored,
            signed,
        }
    }

    #[inline]
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.allocated / 8)
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.allocated, 8 | 16 | 32) && self.stored > 0 && self.stored <= self.allocated
    }

    /// Largest value the stored bits can hold, used as the VOI LUT output ceiling
    #[must_use]
    pub fn max_stored_value(&self) -> f64 {
        2f64.powi(i32::from(self.stored)) - 1.0
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{stored}/{allocated} bits {sign}",
            stored = self.stored,
            allocated = self.allocated,
            sign = if self.signed { "signed" } else { "unsigned" }
        )
    }
}

/// Window center/width pair declared by the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct WindowHint {
    pub center: f64,
    pub width: f64,
    /// Raw VOI LUT Function value, LINEAR when absent
    pub function: Option<String>,
}

impl WindowHint {
    #[must_use]
    pub fn new(center: f64, width: f64) -> Self {
        Self {
            center,
            width,
            function: None,
        }
    }
}

impl fmt::Display for WindowHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "center={}, width={}", self.center, self.width)?;
        if let Some(function) = &self.function {
            write!(f, ", function={function}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("JPEG quality must be between 1 and 100, got {0}")]
pub struct InvalidQuality(pub i64);

/// JPEG quality in the range 1..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    pub const DEFAULT: Quality = Quality(85);

    /// Validate a raw quality value; out-of-range values are rejected, not clamped
    pub fn new(value: i64) -> Result<Self, InvalidQuality> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(InvalidQuality(value))
        }
    }

    #[inline]
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Quality {
    type Error = InvalidQuality;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid quality `{s}`: {e}"))?;
        Self::new(value).map_err(|e| e.to_string())
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
