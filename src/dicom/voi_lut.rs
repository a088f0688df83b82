//! Window/level (VOI LUT) application
//!
//! Applying a window is best effort: any problem with the declared window
//! yields [`VoiOutcome::Skipped`] with the reason, which the caller logs
//! before carrying on with the untouched buffer.

use super::parser;
use super::pixel_data::{PixelBuffer, Samples};
use crate::types::{BitDepth, RescaleParams, WindowHint};
use dicom::object::DefaultDicomObject;
use dicom_pixeldata::{VoiLutFunction, WindowLevel, WindowLevelTransform};

/// Result of trying to apply the dataset's window to a pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub enum VoiOutcome {
    /// The window was applied; samples are now `f64` in `[0, 2^BitsStored - 1]`
    Applied(PixelBuffer),
    /// A window was declared but could not be applied
    Skipped { reason: String },
    /// The dataset lacks Window Center or Window Width
    NotDeclared,
}

/// Apply the window declared by `obj` (if any) to `buffer`
pub fn apply_voi_lut(obj: &DefaultDicomObject, buffer: &PixelBuffer) -> VoiOutcome {
    let hint = match parser::extract_window_hint(obj) {
        None => return VoiOutcome::NotDeclared,
        Some(Ok(hint)) => hint,
        Some(Err(e)) => {
            return skipped(format!("{e:#}"));
        }
    };

    let photometric = super::photometric_interpretation(obj);
    if !photometric.is_grayscale() {
        return skipped(format!("windowing does not apply to {photometric} data"));
    }

    let bit_depth = match parser::extract_bit_depth(obj) {
        Ok(depth) => depth,
        Err(e) => {
            return skipped(format!("{e:#}"));
        }
    };

    apply_window(buffer, &hint, parser::extract_rescale_params(obj), bit_depth)
}

/// Rescale then window every sample of a single-sample-per-pixel buffer
pub fn apply_window(
    buffer: &PixelBuffer,
    hint: &WindowHint,
    rescale: RescaleParams,
    bit_depth: BitDepth,
) -> VoiOutcome {
    let shape = buffer.shape();
    if shape.samples_per_pixel != 1 {
        return skipped(format!(
            "windowing needs one sample per pixel, got {}",
            shape.samples_per_pixel
        ));
    }

    let function = match hint.function.as_deref() {
        None => VoiLutFunction::Linear,
        Some(name) => match VoiLutFunction::try_from(name) {
            Ok(function) => function,
            Err(_) => return skipped(format!("unsupported VOI LUT function {name}")),
        },
    };

    if !hint.center.is_finite() || !hint.width.is_finite() {
        return skipped(format!("window is not finite ({hint})"));
    }
    let width_ok = match function {
        VoiLutFunction::LinearExact => hint.width > 0.0,
        VoiLutFunction::Linear | VoiLutFunction::Sigmoid => hint.width >= 1.0,
    };
    if !width_ok {
        return skipped(format!("invalid window width for {function:?} ({hint})"));
    }

    let transform = WindowLevelTransform::new(
        function,
        WindowLevel {
            center: hint.center,
            width: hint.width,
        },
    );
    let y_max = bit_depth.max_stored_value();

    let windowed: Vec<f64> = buffer
        .samples()
        .to_f64()
        .into_iter()
        .map(|v| transform.apply(rescale.apply(v), y_max))
        .collect();

    match PixelBuffer::new(shape, Samples::F64(windowed)) {
        Ok(buffer) => VoiOutcome::Applied(buffer),
        Err(e) => skipped(e.to_string()),
    }
}

fn skipped(reason: String) -> VoiOutcome {
    VoiOutcome::Skipped { reason }
}
