//! DICOM file decoding, pixel extraction and metadata
//!
//! This module opens DICOM files and turns them into typed pixel buffers and
//! flat metadata records.

mod metadata;
mod parser;
mod photometric;
mod pixel_data;
mod validation;
mod voi_lut;

// Re-export public API
pub use metadata::{extract_metadata, read_metadata, DicomMetadata, MetadataRecord, MetadataValue};
pub use photometric::PhotometricInterpretation;
pub use pixel_data::{extract_pixel_data, extract_raw_pixel_data, PixelBuffer, Samples};
pub use validation::validate_dicom_file;
pub use voi_lut::{apply_voi_lut, apply_window, VoiOutcome};

use crate::error::DecodeError;
use dicom::core::value::Value;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use std::path::Path;
use std::str::FromStr;

/// Open and parse a DICOM file
///
/// # Errors
///
/// Returns [`DecodeError::Open`] if the file is missing or not valid DICOM
pub fn open_dicom_file(file_path: &Path) -> Result<DefaultDicomObject, DecodeError> {
    open_file(file_path).map_err(|e| DecodeError::Open {
        path: file_path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Photometric Interpretation of the dataset; MONOCHROME2 when absent
#[must_use]
pub fn photometric_interpretation(obj: &DefaultDicomObject) -> PhotometricInterpretation {
    parser::read_text(obj, tags::PHOTOMETRIC_INTERPRETATION)
        .map(|s| PhotometricInterpretation::from_str(&s).unwrap_or_default())
        .unwrap_or_default()
}

/// Check that the dataset carries a non-empty Pixel Data element
///
/// # Errors
///
/// Returns [`DecodeError::MissingPixelData`] or [`DecodeError::EmptyPixelData`]
pub fn ensure_pixel_data(obj: &DefaultDicomObject) -> Result<(), DecodeError> {
    let element = obj.get(tags::PIXEL_DATA).ok_or(DecodeError::MissingPixelData)?;

    let empty = match element.value() {
        Value::Primitive(v) => v.calculate_byte_len() == 0,
        Value::PixelSequence(seq) => seq.fragments().iter().all(|f| f.is_empty()),
        Value::Sequence(_) => true,
    };
    if empty {
        return Err(DecodeError::EmptyPixelData);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::DatasetBuilder;
    use assert_matches::assert_matches;

    #[test]
    fn test_open_missing_file_fails() {
        let result = open_dicom_file(Path::new("/nonexistent/file.dcm"));
        assert_matches!(result, Err(DecodeError::Open { .. }));
    }

    #[test]
    fn test_open_written_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = DatasetBuilder::grayscale_u8(2, 2, &[0, 1, 2, 3]).write(dir.path(), "a.dcm");

        let obj = open_dicom_file(&path).unwrap();
        assert!(ensure_pixel_data(&obj).is_ok());
        assert_eq!(photometric_interpretation(&obj), PhotometricInterpretation::Monochrome2);
    }

    #[test]
    fn test_photometric_defaults_when_absent() {
        let obj = DatasetBuilder::grayscale_u8(1, 1, &[0])
            .without(tags::PHOTOMETRIC_INTERPRETATION)
            .build();
        assert_eq!(photometric_interpretation(&obj), PhotometricInterpretation::Monochrome2);

        let obj = DatasetBuilder::grayscale_u8(1, 1, &[0]).photometric("MONOCHROME1").build();
        assert_eq!(photometric_interpretation(&obj), PhotometricInterpretation::Monochrome1);
    }

    #[test]
    fn test_missing_pixel_data() {
        let obj = DatasetBuilder::grayscale_u8(1, 1, &[0]).without(tags::PIXEL_DATA).build();
        assert_matches!(ensure_pixel_data(&obj), Err(DecodeError::MissingPixelData));
    }

    #[test]
    fn test_empty_pixel_data() {
        let obj = DatasetBuilder::grayscale_u8(0, 0, &[]).build();
        assert_matches!(ensure_pixel_data(&obj), Err(DecodeError::EmptyPixelData));
    }
}
