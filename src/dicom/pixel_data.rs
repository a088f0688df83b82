//! DICOM pixel data extraction
//!
//! This module turns the decoded pixel data of a DICOM object into a typed
//! [`PixelBuffer`], handling bit depth, signedness, endianness and planar
//! colour layouts. When the dataset declares a window, the VOI LUT is applied
//! before the buffer is handed on; a window that cannot be applied is logged
//! and skipped.

use super::parser;
use super::voi_lut::{self, VoiOutcome};
use crate::error::{ExtractionError, NormalizationError};
use crate::types::{BitDepth, PixelShape};
use dicom::object::DefaultDicomObject;
use dicom::pixeldata::PixelDecoder;
use std::ops::Range;
use tracing::{debug, warn};

/// Pixel samples in the numeric type they were stored with
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    /// Samples after a VOI LUT, or floating point input
    F64(Vec<f64>),
}

macro_rules! for_each_samples {
    ($samples:expr, $v:ident => $body:expr) => {
        match $samples {
            Samples::U8($v) => $body,
            Samples::I8($v) => $body,
            Samples::U16($v) => $body,
            Samples::I16($v) => $body,
            Samples::U32($v) => $body,
            Samples::I32($v) => $body,
            Samples::F64($v) => $body,
        }
    };
}

impl Samples {
    #[must_use]
    pub fn len(&self) -> usize {
        for_each_samples!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Promote every sample to `f64`; exact for all stored integer types
    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        self.to_f64_range(0..self.len())
    }

    /// Promote a contiguous range of samples to `f64`
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds
    #[must_use]
    pub fn to_f64_range(&self, range: Range<usize>) -> Vec<f64> {
        match self {
            Samples::F64(v) => v[range].to_vec(),
            Samples::U32(v) => v[range].iter().map(|&s| f64::from(s)).collect(),
            Samples::I32(v) => v[range].iter().map(|&s| f64::from(s)).collect(),
            Samples::U16(v) => v[range].iter().map(|&s| f64::from(s)).collect(),
            Samples::I16(v) => v[range].iter().map(|&s| f64::from(s)).collect(),
            Samples::U8(v) => v[range].iter().map(|&s| f64::from(s)).collect(),
            Samples::I8(v) => v[range].iter().map(|&s| f64::from(s)).collect(),
        }
    }

    /// numpy-style name of the sample type, for logs
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Samples::U8(_) => "uint8",
            Samples::I8(_) => "int8",
            Samples::U16(_) => "uint16",
            Samples::I16(_) => "int16",
            Samples::U32(_) => "uint32",
            Samples::I32(_) => "int32",
            Samples::F64(_) => "float64",
        }
    }

    /// Reorder `RRR..GGG..BBB..` frames into `RGBRGB..`
    fn planar_to_interleaved(self, shape: PixelShape) -> Self {
        let pixels = shape.pixels_per_frame();
        let channels = usize::from(shape.samples_per_pixel);
        let frame_len = shape.frame_len();

        fn interleave<T: Copy>(v: Vec<T>, pixels: usize, channels: usize, frame_len: usize) -> Vec<T> {
            v.chunks_exact(frame_len)
                .flat_map(|frame| {
                    (0..pixels).flat_map(move |p| (0..channels).map(move |c| frame[c * pixels + p]))
                })
                .collect()
        }

        match self {
            Samples::U8(v) => Samples::U8(interleave(v, pixels, channels, frame_len)),
            Samples::I8(v) => Samples::I8(interleave(v, pixels, channels, frame_len)),
            Samples::U16(v) => Samples::U16(interleave(v, pixels, channels, frame_len)),
            Samples::I16(v) => Samples::I16(interleave(v, pixels, channels, frame_len)),
            Samples::U32(v) => Samples::U32(interleave(v, pixels, channels, frame_len)),
            Samples::I32(v) => Samples::I32(interleave(v, pixels, channels, frame_len)),
            Samples::F64(v) => Samples::F64(interleave(v, pixels, channels, frame_len)),
        }
    }
}

macro_rules! impl_from_vec {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for Samples {
                fn from(v: Vec<$t>) -> Self {
                    Samples::$variant(v)
                }
            }
        )*
    };
}

impl_from_vec!(u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32, f64 => F64);

/// Raw pixel samples together with their `[frames, rows, columns, samples]` shape
///
/// Samples are stored frame by frame, row-major, with colour channels
/// interleaved. The sample count always matches the shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    shape: PixelShape,
    samples: Samples,
}

impl PixelBuffer {
    /// # Errors
    ///
    /// Returns an error if the shape has a zero dimension or does not match
    /// the number of samples
    pub fn new(shape: PixelShape, samples: impl Into<Samples>) -> Result<Self, NormalizationError> {
        let samples = samples.into();
        if !shape.is_valid() || samples.len() != shape.sample_count() {
            return Err(NormalizationError::ShapeMismatch {
                shape,
                actual: samples.len(),
            });
        }
        Ok(Self { shape, samples })
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> PixelShape {
        self.shape
    }

    #[inline]
    #[must_use]
    pub fn samples(&self) -> &Samples {
        &self.samples
    }
}

/// Extract the raw pixel buffer from a DICOM object, applying the declared
/// window (VOI LUT) when there is one
///
/// # Errors
///
/// Returns an error if the pixel data cannot be decoded or does not match
/// the image attributes. A window that cannot be applied is not an error.
pub fn extract_pixel_data(obj: &DefaultDicomObject) -> Result<PixelBuffer, ExtractionError> {
    let buffer = extract_raw_pixel_data(obj)?;

    match voi_lut::apply_voi_lut(obj, &buffer) {
        VoiOutcome::Applied(windowed) => {
            debug!("Applied VOI LUT window");
            Ok(windowed)
        }
        VoiOutcome::Skipped { reason } => {
            warn!("Failed to apply VOI LUT: {reason}");
            Ok(buffer)
        }
        VoiOutcome::NotDeclared => Ok(buffer),
    }
}

/// Extract pixel samples exactly as stored, without any LUT
pub fn extract_raw_pixel_data(obj: &DefaultDicomObject) -> Result<PixelBuffer, ExtractionError> {
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| ExtractionError::PixelDecode(Box::new(e)))?;

    let shape = PixelShape::new(
        decoded.number_of_frames(),
        decoded.rows(),
        decoded.columns(),
        decoded.samples_per_pixel(),
    );
    if !shape.is_valid() {
        return Err(ExtractionError::InvalidShape(shape));
    }

    let bit_depth = parser::extract_bit_depth(obj)?;
    let transfer_syntax = parser::extract_transfer_syntax(obj);

    // the parser already converted multi-byte values to native byte order
    let mut samples = samples_from_bytes(decoded.data(), bit_depth, shape.sample_count())?;

    // Codecs hand back interleaved samples; only native data keeps the planar layout
    if shape.samples_per_pixel > 1
        && parser::extract_planar_configuration(obj) == Some(1)
        && !parser::is_compressed(&transfer_syntax)
    {
        samples = samples.planar_to_interleaved(shape);
    }

    debug!(
        "Extracted {} pixel buffer with shape {shape} ({bit_depth})",
        samples.type_name()
    );

    PixelBuffer::new(shape, samples).map_err(|_| ExtractionError::InvalidShape(shape))
}

/// Interpret native-endian bytes as samples of the given depth
///
/// Signed samples with fewer stored than allocated bits are sign-extended.
fn samples_from_bytes(
    data: &[u8],
    bit_depth: BitDepth,
    count: usize,
) -> Result<Samples, ExtractionError> {
    if !bit_depth.is_valid() {
        return Err(ExtractionError::UnsupportedBitDepth(bit_depth));
    }

    let expected = count * bit_depth.bytes_per_sample();
    if data.len() < expected {
        return Err(ExtractionError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    let data = &data[..expected];
    let shift = u32::from(bit_depth.allocated - bit_depth.stored);

    let samples = match (bit_depth.allocated, bit_depth.signed) {
        (8, false) => Samples::U8(data.to_vec()),
        (8, true) => Samples::I8(data.iter().map(|&b| ((b << shift) as i8) >> shift).collect()),
        (16, signed) => {
            let values = data.chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]]));
            if signed {
                Samples::I16(values.map(|v| ((v << shift) as i16) >> shift).collect())
            } else {
                Samples::U16(values.collect())
            }
        }
        (32, signed) => {
            let values = data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]));
            if signed {
                Samples::I32(values.map(|v| ((v << shift) as i32) >> shift).collect())
            } else {
                Samples::U32(values.collect())
            }
        }
        _ => return Err(ExtractionError::UnsupportedBitDepth(bit_depth)),
    };

    Ok(samples)
}
