//! DICOM to JPEG conversion pipeline
//!
//! decode → pixel-data check → extract → normalize → encode → write.
//! Every stage failure surfaces as a single [`ConversionError`].

use crate::dicom::{self, PixelBuffer};
use crate::error::{ConversionError, PipelineError};
use crate::image::{self, NormalizedImage};
use crate::types::Quality;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

/// Options controlling a single conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    pub quality: Quality,
    /// Zero-based frame of a multi-frame image to render
    pub frame: u32,
}

impl ConvertOptions {
    #[must_use]
    pub fn new(quality: Quality) -> Self {
        Self { quality, frame: 0 }
    }

    #[must_use]
    pub fn with_frame(mut self, frame: u32) -> Self {
        self.frame = frame;
        self
    }
}

/// Convert a DICOM file to `output_dir/<stem>.jpg`, returning the written path
///
/// An existing file with the same name is overwritten.
///
/// # Errors
///
/// Returns a [`ConversionError`] wrapping the first stage that failed
pub fn convert_to_jpeg(
    input: &Path,
    output_dir: &Path,
    quality: Quality,
) -> Result<PathBuf, ConversionError> {
    convert_with_options(input, output_dir, ConvertOptions::new(quality))
}

/// [`convert_to_jpeg`] with explicit frame selection
///
/// # Errors
///
/// Returns a [`ConversionError`] wrapping the first stage that failed
pub fn convert_with_options(
    input: &Path,
    output_dir: &Path,
    options: ConvertOptions,
) -> Result<PathBuf, ConversionError> {
    run_pipeline(input, output_dir, options).map_err(|e| {
        error!("Failed to convert DICOM to JPG ({} stage): {e}", e.stage());
        ConversionError::from(e)
    })
}

fn run_pipeline(
    input: &Path,
    output_dir: &Path,
    options: ConvertOptions,
) -> Result<PathBuf, PipelineError> {
    info!("Converting {} (quality {})", input.display(), options.quality);

    let obj = dicom::open_dicom_file(input)?;
    dicom::ensure_pixel_data(&obj)?;

    let buffer: PixelBuffer = dicom::extract_pixel_data(&obj)?;
    let photometric = dicom::photometric_interpretation(&obj);
    debug!("Pixel buffer shape {} ({photometric})", buffer.shape());

    let normalized: NormalizedImage = image::normalize_frame(&buffer, &photometric, options.frame)?;
    let jpeg = image::encode_jpeg(&normalized, options.quality)?;

    let output_path = output_dir.join(output_file_name(input));
    write_atomically(&output_path, &jpeg)?;

    info!(
        "Wrote {} ({}x{}, {} bytes)",
        output_path.display(),
        normalized.width(),
        normalized.height(),
        jpeg.len()
    );
    Ok(output_path)
}

/// `<input stem>.jpg`; falls back to `image.jpg` for a path without a stem
fn output_file_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".as_ref());
    let mut name = stem.to_os_string();
    name.push(".jpg");
    PathBuf::from(name)
}

/// Write through a temporary file in the same directory, then rename over `path`
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let write_error = |source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(bytes).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;

    Ok(())
}
