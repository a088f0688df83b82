//! Pixel normalization: raw samples of any depth to an 8-bit raster
//!
//! The pipeline, in order:
//!
//! 1. keep a single frame (frame 0 unless asked otherwise);
//! 2. promote samples to `f64`;
//! 3. invert MONOCHROME1 data (`max - s`) so low values are always dark;
//! 4. replace NaN and infinities with `0.0`;
//! 5. clip to the 1st/99th percentiles and stretch that range to `0..=255`,
//!    or fill with mid-gray when the frame is flat;
//! 6. round to `u8`.
//!
//! Percentile clipping keeps hot pixels and other outliers from squeezing the
//! useful dynamic range into a narrow band. Percentiles are found with
//! `select_nth_unstable_by`, so the cost stays linear in the pixel count.

use super::{Channels, NormalizedImage};
use crate::dicom::{PhotometricInterpretation, PixelBuffer};
use crate::error::NormalizationError;
use tracing::{debug, info};

/// Output value of every pixel of a flat image
pub const FLAT_FILL: u8 = 128;

const LOWER_PERCENTILE: f64 = 1.0;
const UPPER_PERCENTILE: f64 = 99.0;

/// Normalize frame 0 of `buffer` to an 8-bit image
///
/// # Errors
///
/// Returns an error if the buffer does not hold 1 or 3 samples per pixel
pub fn normalize_pixels(
    buffer: &PixelBuffer,
    photometric: &PhotometricInterpretation,
) -> Result<NormalizedImage, NormalizationError> {
    normalize_frame(buffer, photometric, 0)
}

/// Normalize one frame of `buffer` to an 8-bit image
///
/// # Errors
///
/// Returns an error if the buffer does not hold 1 or 3 samples per pixel or
/// if `frame` is out of range
pub fn normalize_frame(
    buffer: &PixelBuffer,
    photometric: &PhotometricInterpretation,
    frame: u32,
) -> Result<NormalizedImage, NormalizationError> {
    let shape = buffer.shape();
    let channels = match shape.samples_per_pixel {
        1 => Channels::Gray,
        3 => Channels::Rgb,
        _ => return Err(NormalizationError::UnsupportedShape(shape)),
    };
    if frame >= shape.frames {
        return Err(NormalizationError::FrameOutOfRange {
            frame,
            frames: shape.frames,
        });
    }
    if shape.frames > 1 {
        info!("Multi-frame DICOM detected ({} frames), using frame {frame}", shape.frames);
    }

    let frame_len = shape.frame_len();
    let start = frame as usize * frame_len;
    let mut values = buffer.samples().to_f64_range(start..start + frame_len);

    if photometric.should_invert() {
        invert(&mut values);
    }

    replace_non_finite(&mut values);
    stretch_to_u8_range(&mut values);

    let pixels = values.into_iter().map(to_u8).collect();

    Ok(NormalizedImage::new(shape.columns, shape.rows, channels, pixels))
}

/// `s -> max - s`, with the maximum taken over finite samples
fn invert(values: &mut [f64]) {
    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if max.is_finite() {
        for v in values.iter_mut() {
            *v = max - *v;
        }
    }
}

fn replace_non_finite(values: &mut [f64]) {
    for v in values.iter_mut().filter(|v| !v.is_finite()) {
        *v = 0.0;
    }
}

/// Clip to the 1st/99th percentiles and map that range onto `0.0..=255.0`
fn stretch_to_u8_range(values: &mut [f64]) {
    let (min, max) = find_min_max(values);
    if max <= min {
        debug!("Flat image (all samples = {min}), filling with {FLAT_FILL}");
        values.fill(f64::from(FLAT_FILL));
        return;
    }

    let (p_low, p_high) = percentile_bounds(values);
    if p_high <= p_low {
        // almost flat: clipping would collapse every sample onto one value
        debug!("Percentile range is empty ({p_low}), filling with {FLAT_FILL}");
        values.fill(f64::from(FLAT_FILL));
        return;
    }

    let range = p_high - p_low;
    for v in values.iter_mut() {
        *v = (v.clamp(p_low, p_high) - p_low) / range * 255.0;
    }
}

#[inline]
fn to_u8(value: f64) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

#[inline]
#[must_use]
pub fn find_min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        })
}

/// The 1st and 99th percentiles of `values`
#[must_use]
pub fn percentile_bounds(values: &[f64]) -> (f64, f64) {
    let mut scratch = values.to_vec();
    (
        percentile(&mut scratch, LOWER_PERCENTILE),
        percentile(&mut scratch, UPPER_PERCENTILE),
    )
}

/// Linearly interpolated percentile (`q` in `0..=100`) of a non-empty slice
///
/// Reorders `values`. Uses the same interpolation as numpy's default
/// `percentile` method.
#[must_use]
pub fn percentile(values: &mut [f64], q: f64) -> f64 {
    debug_assert!(!values.is_empty());
    let rank = q / 100.0 * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let t = rank - lower as f64;

    let (_, &mut a, above) = values.select_nth_unstable_by(lower, f64::total_cmp);
    if t == 0.0 || above.is_empty() {
        return a;
    }
    let b = above.iter().copied().fold(f64::INFINITY, f64::min);

    lerp(a, b, t)
}

/// numpy's `_lerp`: interpolate from the nearer end to stay symmetric
#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelShape;
    use crate::test_support::ramp_u16;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;

    fn gray(rows: u32, columns: u32, values: Vec<u16>) -> PixelBuffer {
        PixelBuffer::new(PixelShape::grayscale(rows, columns), values).unwrap()
    }

    #[test]
    fn test_uniform_ramp_spans_full_range() {
        let buffer = gray(512, 512, ramp_u16(512, 512, 4095));
        let image = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2).unwrap();

        assert_eq!(image.width(), 512);
        assert_eq!(image.height(), 512);
        assert_eq!(image.channels(), Channels::Gray);
        assert_eq!(image.pixels().len(), 512 * 512);

        let min = *image.pixels().iter().min().unwrap();
        let max = *image.pixels().iter().max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_constant_image_is_mid_gray() {
        let buffer = gray(64, 64, vec![500; 64 * 64]);
        let image = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2).unwrap();

        assert_eq!(image.width(), 64);
        assert_eq!(image.height(), 64);
        assert!(image.pixels().iter().all(|&p| p == FLAT_FILL));
    }

    #[test]
    fn test_constant_image_is_mid_gray_for_any_type() {
        let shape = PixelShape::grayscale(3, 3);
        let buffers = [
            PixelBuffer::new(shape, vec![7u8; 9]).unwrap(),
            PixelBuffer::new(shape, vec![-300i16; 9]).unwrap(),
            PixelBuffer::new(shape, vec![70_000u32; 9]).unwrap(),
            PixelBuffer::new(shape, vec![0.25f64; 9]).unwrap(),
        ];

        for buffer in &buffers {
            for pi in [PhotometricInterpretation::Monochrome1, PhotometricInterpretation::Monochrome2] {
                let image = normalize_pixels(buffer, &pi).unwrap();
                assert!(image.pixels().iter().all(|&p| p == FLAT_FILL), "{buffer:?}");
            }
        }
    }

    #[test]
    fn test_monochrome1_is_inverse_of_monochrome2() {
        let values: Vec<u16> = (0..400u16).map(|i| (i * 37) % 1000 + (i % 7) * 3).collect();
        let buffer = gray(20, 20, values);

        let mono2 = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2).unwrap();
        let mono1 = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome1).unwrap();

        for (a, b) in mono2.pixels().iter().zip(mono1.pixels()) {
            let expected = 255 - i16::from(*a);
            assert!((expected - i16::from(*b)).abs() <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_non_finite_values_behave_like_zero() {
        let shape = PixelShape::grayscale(1, 6);
        let with_nan = PixelBuffer::new(
            shape,
            vec![f64::NAN, 10.0, f64::INFINITY, 20.0, f64::NEG_INFINITY, 30.0],
        )
        .unwrap();
        let with_zero = PixelBuffer::new(shape, vec![0.0, 10.0, 0.0, 20.0, 0.0, 30.0]).unwrap();

        let a = normalize_pixels(&with_nan, &PhotometricInterpretation::Monochrome2).unwrap();
        let b = normalize_pixels(&with_zero, &PhotometricInterpretation::Monochrome2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_only_first_frame_matters() {
        let shape = PixelShape::new(3, 4, 4, 1);
        let first: Vec<u16> = (0..16).map(|v| v * 10).collect();

        let mut one = first.clone();
        one.extend(vec![0u16; 16]);
        one.extend(vec![65535u16; 16]);

        let mut two = first.clone();
        two.extend((0..16).map(|v| 9000 - v));
        two.extend(vec![3u16; 16]);

        let single = gray(4, 4, first);
        let expected = normalize_pixels(&single, &PhotometricInterpretation::Monochrome2).unwrap();

        for values in [one, two] {
            let buffer = PixelBuffer::new(shape, values).unwrap();
            let image = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2).unwrap();
            assert_eq!(image, expected);
        }
    }

    #[test]
    fn test_percentile_values_map_to_extremes() {
        let values: Vec<u16> = (0..=1000).collect();
        let p_low = percentile(&mut values.iter().map(|&v| f64::from(v)).collect::<Vec<_>>(), 1.0);
        let p_high = percentile(&mut values.iter().map(|&v| f64::from(v)).collect::<Vec<_>>(), 99.0);
        assert_relative_eq!(p_low, 10.0);
        assert_relative_eq!(p_high, 990.0);

        let buffer = PixelBuffer::new(PixelShape::grayscale(1, 1001), values).unwrap();
        let image = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2).unwrap();
        let pixels = image.pixels();

        // every sample at or below p1 is black, at or above p99 is white
        assert!(pixels[..=10].iter().all(|&p| p == 0));
        assert!(pixels[990..].iter().all(|&p| p == 255));
        assert_eq!(pixels[500], 128);
    }

    #[test]
    fn test_outliers_do_not_compress_range() {
        let mut values: Vec<u16> = (0..1000).map(|i| 1000 + (i % 200)).collect();
        values[0] = 60000;
        let buffer = gray(1, 1000, values);
        let image = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2).unwrap();

        // the hot pixel saturates but the rest keeps a wide spread
        let rest = &image.pixels()[1..];
        assert_eq!(image.pixels()[0], 255);
        let spread = rest.iter().max().unwrap() - rest.iter().min().unwrap();
        assert!(spread > 200, "spread was {spread}");
    }

    #[test]
    fn test_percentile_interpolates() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        // rank 0.5 * 3 = 1.5 -> halfway between 2 and 3
        assert_relative_eq!(percentile(&mut values, 50.0), 2.5);
        assert_relative_eq!(percentile(&mut values, 0.0), 1.0);
        assert_relative_eq!(percentile(&mut values, 100.0), 4.0);
    }

    #[test]
    fn test_rgb_keeps_three_channels() {
        let shape = PixelShape::new(1, 2, 2, 3);
        let samples: Vec<u8> = vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 250];
        let buffer = PixelBuffer::new(shape, samples).unwrap();
        let image = normalize_pixels(&buffer, &PhotometricInterpretation::Rgb).unwrap();

        assert_eq!(image.channels(), Channels::Rgb);
        assert_eq!(image.pixels().len(), 12);
    }

    #[test]
    fn test_unsupported_sample_count() {
        let buffer = PixelBuffer::new(PixelShape::new(1, 1, 2, 2), vec![1u8, 2, 3, 4]).unwrap();
        let result = normalize_pixels(&buffer, &PhotometricInterpretation::Monochrome2);
        assert_matches!(result, Err(NormalizationError::UnsupportedShape(_)));
    }

    #[test]
    fn test_frame_out_of_range() {
        let buffer = gray(2, 2, vec![1, 2, 3, 4]);
        let result = normalize_frame(&buffer, &PhotometricInterpretation::Monochrome2, 1);
        assert_matches!(result, Err(NormalizationError::FrameOutOfRange { frame: 1, frames: 1 }));
    }

    #[test]
    fn test_select_other_frame() {
        let buffer = PixelBuffer::new(PixelShape::new(2, 1, 2, 1), vec![5u16, 5, 0, 100]).unwrap();
        let image = normalize_frame(&buffer, &PhotometricInterpretation::Monochrome2, 1).unwrap();
        assert_eq!(image.pixels(), &[0, 255]);
    }
}
