//! Image preprocessing ahead of OCR.
//!
//! Scanned intake documents arrive skewed, noisy, and unevenly lit. The
//! pipeline is fixed: grayscale → deskew → denoise → adaptive binarize, and
//! the output is the black-and-white tile handed to the OCR engine.
//!
//! Deskew estimates the dominant rotation from Hough lines over an inverse
//! adaptive threshold of the page. Accepted line angles are averaged in the
//! OpenCV convention (degrees from the x-axis, positive = counter-clockwise);
//! angles near 180° count as small negative rotations. Near-horizontal lines
//! (80°–100°) are text baselines, not skew evidence, and are discarded.

use crate::error::ExtractError;
use image::{GrayImage, Luma};
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use std::path::Path;
use tracing::debug;

/// Non-local means filter strength.
const DENOISE_STRENGTH: f32 = 30.0;

/// Block size for both adaptive thresholds.
const THRESHOLD_BLOCK: u32 = 31;

/// Constant subtracted from the local mean before comparison.
const THRESHOLD_C: i16 = 15;

/// Minimum Hough votes for a line to count toward the skew estimate.
const HOUGH_VOTE_THRESHOLD: u32 = 180;

/// Which local statistic the adaptive threshold compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockStat {
    Mean,
    Gaussian,
}

/// Preprocess a page image for OCR.
///
/// Fails with [`ExtractError::ImageRead`] when the file cannot be opened,
/// decoded, or decodes to an empty image.
pub fn preprocess(path: &Path) -> Result<GrayImage, ExtractError> {
    let img = image::open(path).map_err(|e| ExtractError::ImageRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let gray = img.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(ExtractError::ImageRead {
            path: path.to_path_buf(),
            detail: "image decoded to zero pixels".into(),
        });
    }

    let deskewed = deskew(&gray);
    let denoised = nl_means_denoise(&deskewed, DENOISE_STRENGTH);
    Ok(adaptive_threshold(
        &denoised,
        THRESHOLD_BLOCK,
        THRESHOLD_C,
        BlockStat::Gaussian,
        false,
    ))
}

/// Straighten the page by the average accepted Hough-line angle.
fn deskew(gray: &GrayImage) -> GrayImage {
    let bw = adaptive_threshold(gray, THRESHOLD_BLOCK, THRESHOLD_C, BlockStat::Mean, true);
    let lines = detect_lines(
        &bw,
        LineDetectionOptions {
            vote_threshold: HOUGH_VOTE_THRESHOLD,
            suppression_radius: 8,
        },
    );

    match average_skew_degrees(lines.iter().map(|l| l.angle_in_degrees)) {
        Some(angle) => {
            debug!("deskew: rotating by {angle:.2} degrees");
            // rotate_about_center is clockwise-positive; the estimate is
            // counter-clockwise-positive, so negate to rotate the page back.
            rotate_about_center(
                gray,
                -angle.to_radians(),
                Interpolation::Bilinear,
                Luma([255u8]),
            )
        }
        None => gray.clone(),
    }
}

/// Average the accepted line angles into a single skew estimate in degrees.
///
/// Accepts angles in (0°, 45°) as-is and (135°, 180°) as `deg − 180`;
/// discards the near-horizontal band 80°–100° and everything else. Returns
/// `None` when no line qualifies.
fn average_skew_degrees(angles: impl IntoIterator<Item = u32>) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for deg in angles {
        let deg = deg as f32;
        if (80.0..=100.0).contains(&deg) {
            continue;
        }
        if deg > 0.0 && deg < 45.0 {
            sum += deg;
            count += 1;
        } else if deg > 135.0 && deg < 180.0 {
            sum += deg - 180.0;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f32)
}

/// Adaptive threshold: compare each pixel against the local block statistic
/// minus [`THRESHOLD_C`].
///
/// `invert = false` maps foreground (above the threshold) to 255;
/// `invert = true` flips that, which is what the Hough transform wants —
/// ink as white votes on a black field.
fn adaptive_threshold(
    src: &GrayImage,
    block_size: u32,
    c: i16,
    stat: BlockStat,
    invert: bool,
) -> GrayImage {
    let radius = block_size / 2;
    let local = match stat {
        BlockStat::Mean => box_filter(src, radius, radius),
        BlockStat::Gaussian => gaussian_blur_f32(src, gaussian_sigma(block_size)),
    };

    let mut out = GrayImage::new(src.width(), src.height());
    for (x, y, px) in src.enumerate_pixels() {
        let threshold = i16::from(local.get_pixel(x, y)[0]) - c;
        let above = i16::from(px[0]) > threshold;
        let value = if above != invert { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Sigma matching a Gaussian kernel of the given odd block size.
fn gaussian_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size - 1) as f32 * 0.5 - 1.0) + 0.8
}

/// Non-local means denoising over 3×3 patches within a 7×7 search window.
///
/// Each pixel becomes the similarity-weighted average of its search window,
/// where similarity is the mean squared difference between the patches around
/// the two pixels. `h` controls how quickly weight decays with patch
/// distance. Borders clamp.
fn nl_means_denoise(src: &GrayImage, h: f32) -> GrayImage {
    const PATCH_RADIUS: i32 = 1;
    const SEARCH_RADIUS: i32 = 3;
    const PATCH_AREA: f32 = ((2 * PATCH_RADIUS + 1) * (2 * PATCH_RADIUS + 1)) as f32;

    let (width, height) = src.dimensions();
    let (w, ht) = (width as i32, height as i32);
    let inv_h2 = 1.0 / (h * h);

    let sample = |x: i32, y: i32| -> f32 {
        f32::from(src.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, ht - 1) as u32)[0])
    };

    let mut out = GrayImage::new(width, height);
    for y in 0..ht {
        for x in 0..w {
            let mut acc = 0.0f32;
            let mut weight_sum = 0.0f32;
            for dy in -SEARCH_RADIUS..=SEARCH_RADIUS {
                for dx in -SEARCH_RADIUS..=SEARCH_RADIUS {
                    let mut dist2 = 0.0f32;
                    for py in -PATCH_RADIUS..=PATCH_RADIUS {
                        for px in -PATCH_RADIUS..=PATCH_RADIUS {
                            let d = sample(x + px, y + py) - sample(x + dx + px, y + dy + py);
                            dist2 += d * d;
                        }
                    }
                    let weight = (-(dist2 / PATCH_AREA) * inv_h2).exp();
                    acc += weight * sample(x + dx, y + dy);
                    weight_sum += weight;
                }
            }
            let value = (acc / weight_sum).round().clamp(0.0, 255.0) as u8;
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn skew_average_accepts_the_low_band() {
        assert_eq!(average_skew_degrees([10, 20]), Some(15.0));
    }

    #[test]
    fn skew_average_maps_high_band_to_negative() {
        assert_eq!(average_skew_degrees([170]), Some(-10.0));
        assert_eq!(average_skew_degrees([150, 178]), Some((-30.0 - 2.0) / 2.0));
    }

    #[test]
    fn skew_average_discards_baselines_and_out_of_band_angles() {
        assert_eq!(average_skew_degrees([90]), None);
        assert_eq!(average_skew_degrees([80, 100]), None);
        assert_eq!(average_skew_degrees([60, 120]), None);
        assert_eq!(average_skew_degrees([0, 45, 135]), None);
        assert_eq!(average_skew_degrees(Vec::<u32>::new()), None);
    }

    #[test]
    fn skew_average_mixes_both_bands() {
        // +10 and -10 cancel.
        assert_eq!(average_skew_degrees([10, 170]), Some(0.0));
    }

    #[test]
    fn adaptive_threshold_uniform_image_is_all_foreground() {
        // v > v - C holds everywhere, so binary output saturates white.
        let img = uniform(64, 64, 128);
        let out = adaptive_threshold(&img, THRESHOLD_BLOCK, THRESHOLD_C, BlockStat::Mean, false);
        assert!(out.pixels().all(|p| p[0] == 255));

        let inv = adaptive_threshold(&img, THRESHOLD_BLOCK, THRESHOLD_C, BlockStat::Mean, true);
        assert!(inv.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn adaptive_threshold_marks_ink_dark_on_binary_and_white_on_inverse() {
        let mut img = uniform(64, 64, 255);
        img.put_pixel(32, 32, Luma([0]));

        let binary =
            adaptive_threshold(&img, THRESHOLD_BLOCK, THRESHOLD_C, BlockStat::Mean, false);
        assert_eq!(binary.get_pixel(32, 32)[0], 0);
        assert_eq!(binary.get_pixel(0, 0)[0], 255);

        let inverse =
            adaptive_threshold(&img, THRESHOLD_BLOCK, THRESHOLD_C, BlockStat::Mean, true);
        assert_eq!(inverse.get_pixel(32, 32)[0], 255);
        assert_eq!(inverse.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn nl_means_preserves_uniform_regions() {
        let img = uniform(12, 12, 200);
        let out = nl_means_denoise(&img, DENOISE_STRENGTH);
        assert!(out.pixels().all(|p| p[0] == 200));
    }

    #[test]
    fn nl_means_attenuates_impulse_noise() {
        let mut img = uniform(15, 15, 0);
        img.put_pixel(7, 7, Luma([255]));
        let out = nl_means_denoise(&img, DENOISE_STRENGTH);
        assert!(out.get_pixel(7, 7)[0] < 255);
    }

    #[test]
    fn gaussian_sigma_matches_block_31() {
        assert!((gaussian_sigma(31) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn preprocess_rejects_missing_file() {
        let err = preprocess(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, ExtractError::ImageRead { .. }));
    }

    #[test]
    fn preprocess_produces_a_binary_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let mut img = uniform(40, 40, 230);
        for x in 5..35 {
            img.put_pixel(x, 20, Luma([10]));
        }
        img.save(&path).unwrap();

        let out = preprocess(&path).unwrap();
        assert_eq!(out.dimensions(), (40, 40));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
