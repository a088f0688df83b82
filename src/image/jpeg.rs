//! JPEG encoding of normalized rasters

use super::{Channels, NormalizedImage};
use crate::types::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageResult};

/// Encode the raster as a baseline JPEG at the given quality
///
/// # Errors
///
/// Returns the encoder error if the raster cannot be encoded
pub fn encode_jpeg(image: &NormalizedImage, quality: Quality) -> ImageResult<Vec<u8>> {
    let color = match image.channels() {
        Channels::Gray => ExtendedColorType::L8,
        Channels::Rgb => ExtendedColorType::Rgb8,
    };

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.get()).write_image(
        image.pixels(),
        image.width(),
        image.height(),
        color,
    )?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> NormalizedImage {
        let pixels = (0..height)
            .flat_map(|_| (0..width).map(move |x| (x * 255 / (width - 1)) as u8))
            .collect();
        NormalizedImage::new(width, height, Channels::Gray, pixels)
    }

    #[test]
    fn test_encoded_gray_image_keeps_dimensions() {
        let image = gradient(64, 32);
        let bytes = encode_jpeg(&image, Quality::new(100).unwrap()).unwrap();

        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "missing JPEG SOI marker");
        let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (64, 32));

        for (original, roundtrip) in image.pixels().iter().zip(decoded.as_raw()) {
            assert!(original.abs_diff(*roundtrip) <= 8);
        }
    }

    #[test]
    fn test_lower_quality_produces_smaller_output() {
        let image = gradient(128, 128);
        let high = encode_jpeg(&image, Quality::new(100).unwrap()).unwrap();
        let low = encode_jpeg(&image, Quality::new(10).unwrap()).unwrap();

        assert!(low.len() < high.len());
    }

    #[test]
    fn test_rgb_image_encodes() {
        let pixels = [255, 0, 0].repeat(16 * 16);
        let image = NormalizedImage::new(16, 16, Channels::Rgb, pixels);
        let bytes = encode_jpeg(&image, Quality::default()).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(8, 8).0;
        assert!(pixel[0] > 200 && pixel[1] < 60 && pixel[2] < 60, "got {pixel:?}");
    }
}
