//! Explicit optional tag lookups over a decoded dataset
//!
//! Every accessor returns `None` for an absent or unreadable tag instead of
//! failing, so callers decide what a missing value means.

use crate::types::{BitDepth, RescaleParams, WindowHint};
use anyhow::{Context, Result};
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::DefaultDicomObject;

/// Text value of a tag, trimmed of DICOM padding; `None` when absent or empty
pub fn read_text(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    obj.get(tag)
        .and_then(|e| e.value().to_str().ok())
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
        .filter(|s| !s.is_empty())
}

#[inline]
pub fn read_int(obj: &DefaultDicomObject, tag: Tag) -> Option<i64> {
    obj.get(tag)
        .and_then(|e| e.to_int::<i64>().ok())
}

/// First value of a (possibly multi-valued) decimal tag
#[inline]
pub fn read_float(obj: &DefaultDicomObject, tag: Tag) -> Option<f64> {
    obj.get(tag)
        .and_then(|e| e.to_float64().ok())
}

#[inline]
pub fn has_tag(obj: &DefaultDicomObject, tag: Tag) -> bool {
    obj.get(tag).is_some()
}

pub fn extract_bit_depth(obj: &DefaultDicomObject) -> Result<BitDepth> {
    let allocated = read_int(obj, tags::BITS_ALLOCATED)
        .and_then(|v| u16::try_from(v).ok())
        .context("Missing or invalid Bits Allocated tag")?;

    // Bits Stored defaults to the allocated size when absent
    let stored = read_int(obj, tags::BITS_STORED)
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(allocated);

    let signed = read_int(obj, tags::PIXEL_REPRESENTATION) == Some(1);

    Ok(BitDepth::new(allocated, stored, signed))
}

#[inline]
pub fn extract_planar_configuration(obj: &DefaultDicomObject) -> Option<u16> {
    read_int(obj, tags::PLANAR_CONFIGURATION).and_then(|v| u16::try_from(v).ok())
}

pub fn extract_rescale_params(obj: &DefaultDicomObject) -> RescaleParams {
    // Optional tags, mostly present on CT/PET
    let slope = read_float(obj, tags::RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = read_float(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0);

    RescaleParams::new(slope, intercept)
}

/// Window hint, only when both Window Center and Window Width are declared
///
/// The inner `Result` fails when the tags exist but cannot be parsed as
/// numbers, which callers treat as a soft failure.
pub fn extract_window_hint(obj: &DefaultDicomObject) -> Option<Result<WindowHint>> {
    if !has_tag(obj, tags::WINDOW_CENTER) || !has_tag(obj, tags::WINDOW_WIDTH) {
        return None;
    }

    let hint = (|| {
        let center = read_float(obj, tags::WINDOW_CENTER)
            .context("Window Center is not a decimal value")?;
        let width = read_float(obj, tags::WINDOW_WIDTH)
            .context("Window Width is not a decimal value")?;

        Ok(WindowHint {
            center,
            width,
            function: read_text(obj, tags::VOILUT_FUNCTION),
        })
    })();

    Some(hint)
}

/// Transfer syntax UID of the file, without trailing padding
pub fn extract_transfer_syntax(obj: &DefaultDicomObject) -> String {
    obj.meta()
        .transfer_syntax()
        .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// Detect if transfer syntax uses compression
#[inline]
#[must_use]
pub fn is_compressed(uid: &str) -> bool {
    uid.starts_with("1.2.840.10008.1.2.4") // JPEG family, JPEG-LS, JPEG 2000
        || uid.starts_with("1.2.840.10008.1.2.5") // RLE lossless
}
