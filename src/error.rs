//! Error types for each pipeline stage and the unified conversion failure

use crate::types::{BitDepth, PixelShape};
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Input is not a parseable DICOM file, or it has no usable pixel data
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open DICOM file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("DICOM file has no pixel data")]
    MissingPixelData,

    #[error("DICOM file has empty pixel data")]
    EmptyPixelData,
}

/// Pixel data could not be read even though the file decoded
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to decode pixel data: {0}")]
    PixelDecode(#[source] BoxError),

    #[error("Invalid image attributes: {0:#}")]
    Attributes(#[from] anyhow::Error),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(BitDepth),

    #[error("Invalid pixel buffer shape {0}")]
    InvalidShape(PixelShape),

    #[error("Pixel data too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Unexpected failure while rescaling samples to 8 bits
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("Unsupported buffer shape {0}: expected 1 or 3 samples per pixel")]
    UnsupportedShape(PixelShape),

    #[error("Pixel buffer holds {actual} samples but shape {shape} needs {}", shape.sample_count())]
    ShapeMismatch { shape: PixelShape, actual: usize },

    #[error("Frame {frame} requested but the buffer has {frames} frame(s)")]
    FrameOutOfRange { frame: u32, frames: u32 },
}

/// The failure of one pipeline stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("Failed to encode JPEG: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Short name of the stage that failed, used in logs
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode",
            PipelineError::Extraction(_) => "extract",
            PipelineError::Normalization(_) => "normalize",
            PipelineError::Encode(_) => "encode",
            PipelineError::Write { .. } => "write",
        }
    }
}

/// Unified conversion failure surfaced to callers of the orchestrator
#[derive(Debug, Error)]
#[error("DICOM conversion failed: {source}")]
pub struct ConversionError {
    #[source]
    source: PipelineError,
}

impl ConversionError {
    /// The stage error this failure wraps
    #[must_use]
    pub fn cause(&self) -> &PipelineError {
        &self.source
    }
}

impl From<PipelineError> for ConversionError {
    fn from(source: PipelineError) -> Self {
        ConversionError { source }
    }
}

impl From<DecodeError> for ConversionError {
    fn from(err: DecodeError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<ExtractionError> for ConversionError {
    fn from(err: ExtractionError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<NormalizationError> for ConversionError {
    fn from(err: NormalizationError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<image::ImageError> for ConversionError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::from(err).into()
    }
}
