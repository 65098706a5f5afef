//! Template differencing: isolate user ink from the printed guides.
//!
//! Both the rectified scan and the blank reference are lightly blurred to
//! absorb sub-pixel registration jitter, differenced, blurred again to heal
//! one-pixel stroke breaks, then binarized to an ink=255 mask.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::raster::{absolute_difference, blur_gray, rebinarize};

/// Differencing parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Pre-difference Gaussian sigma applied to both inputs.
    pub pre_blur_sigma: f32,
    /// Post-difference healing blur sigma.
    pub heal_blur_sigma: f32,
    /// Binarization cutoff on the 0–255 difference scale.
    pub threshold: u8,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            pre_blur_sigma: 0.6,
            heal_blur_sigma: 0.6,
            threshold: 30,
        }
    }
}

/// Absolute difference of scan and reference after registration blurs.
///
/// The result is a grayscale difference map, not yet binarized; kept for
/// diagnostics.
pub fn difference_image(scan: &GrayImage, reference: &GrayImage, config: &DiffConfig) -> GrayImage {
    debug_assert_eq!(scan.dimensions(), reference.dimensions());
    let scan_b = blur_gray(scan, config.pre_blur_sigma);
    let ref_b = blur_gray(reference, config.pre_blur_sigma);
    let diff = absolute_difference(&scan_b, &ref_b);
    blur_gray(&diff, config.heal_blur_sigma)
}

/// Binarize a difference map: `|scan − ref| > threshold` becomes ink=255.
pub fn threshold_difference(diff: &GrayImage, threshold: u8) -> GrayImage {
    rebinarize(diff, threshold.saturating_add(1))
}
