use super::{ensure_pixel_data, extract_raw_pixel_data, open_dicom_file};
use crate::error::DecodeError;
use std::path::Path;
use tracing::{error, warn};

/// Whether the file decodes as DICOM and carries readable, non-empty pixel data
///
/// Never fails: every problem is logged and reported as `false`.
pub fn validate_dicom_file(path: &Path) -> bool {
    let obj = match open_dicom_file(path) {
        Ok(obj) => obj,
        Err(e) => {
            error!("DICOM validation failed: {e}");
            return false;
        }
    };

    if let Err(e) = ensure_pixel_data(&obj) {
        match e {
            DecodeError::MissingPixelData | DecodeError::EmptyPixelData => warn!("{e}"),
            DecodeError::Open { .. } => error!("DICOM validation failed: {e}"),
        }
        return false;
    }

    // a decoded buffer is never empty
    match extract_raw_pixel_data(&obj) {
        Ok(_) => true,
        Err(e) => {
            error!("DICOM validation failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::DatasetBuilder;
    use dicom::dictionary_std::tags;

    #[test]
    fn test_text_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        std::fs::write(&path, "plain text, not DICOM").unwrap();

        assert!(!validate_dicom_file(&path));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        assert!(!validate_dicom_file(Path::new("/nonexistent/image.dcm")));
    }

    #[test]
    fn test_grayscale_file_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = DatasetBuilder::grayscale_u16(2, 2, &[1, 2, 3, 4]).write(dir.path(), "ok.dcm");

        assert!(validate_dicom_file(&path));
    }

    #[test]
    fn test_file_without_pixel_data_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = DatasetBuilder::grayscale_u8(1, 1, &[0])
            .without(tags::PIXEL_DATA)
            .write(dir.path(), "no_pixels.dcm");

        assert!(!validate_dicom_file(&path));
    }

    #[test]
    fn test_truncated_pixel_data_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = DatasetBuilder::grayscale_u8(4, 4, &[0; 4]).write(dir.path(), "short.dcm");

        assert!(!validate_dicom_file(&path));
    }
}
