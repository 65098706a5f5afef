//! Morphological cleanup of the ink mask.
//!
//! Closing bridges small stroke gaps, opening removes specks. Closing must
//! run first so that opening does not erase the thin bridges it just built.
//! Disc (L2) structuring elements avoid axis-aligned artifacts in diagonal
//! strokes.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::raster::ensure_ink_polarity;

/// Kernel sizes for mask cleanup. A size of 0 skips that operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    /// Closing kernel diameter in pixels (gap bridging).
    pub close_size: u8,
    /// Opening kernel diameter in pixels (speck removal).
    pub open_size: u8,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            close_size: 3,
            open_size: 2,
        }
    }
}

fn radius(size: u8) -> u8 {
    (size / 2).max(1)
}

/// Close then open the ink mask with disc kernels.
///
/// Input polarity is normalized to ink=255 first; a dominant-white mask is
/// inverted rather than rejected.
pub fn clean_mask(mask: &GrayImage, config: &MorphologyConfig) -> Result<GrayImage, PipelineError> {
    let mut out = ensure_ink_polarity(mask)?;
    if config.close_size > 0 {
        out = imageproc::morphology::close(&out, Norm::L2, radius(config.close_size));
    }
    if config.open_size > 0 {
        out = imageproc::morphology::open(&out, Norm::L2, radius(config.open_size));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::count_ink;
    use image::Luma;

    #[test]
    fn closing_bridges_one_pixel_gap_in_stroke() {
        // 3px-thick horizontal stroke with a one-column break at x=14.
        let mut mask = GrayImage::new(30, 12);
        for x in 5..24 {
            if x == 14 {
                continue;
            }
            for y in 4..7 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let cfg = MorphologyConfig {
            close_size: 3,
            open_size: 0,
        };
        let out = clean_mask(&mask, &cfg).unwrap();
        assert_eq!(out.get_pixel(14, 5).0[0], 255);
    }

    #[test]
    fn opening_removes_isolated_speck() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(10, 10, Luma([255]));
        let cfg = MorphologyConfig {
            close_size: 0,
            open_size: 2,
        };
        let out = clean_mask(&mask, &cfg).unwrap();
        assert_eq!(count_ink(&out), 0);
    }

    #[test]
    fn zero_sizes_are_identity() {
        let mut mask = GrayImage::new(12, 12);
        mask.put_pixel(3, 3, Luma([255]));
        let cfg = MorphologyConfig {
            close_size: 0,
            open_size: 0,
        };
        let out = clean_mask(&mask, &cfg).unwrap();
        assert_eq!(out, mask);
    }

    #[test]
    fn inverted_input_is_normalized_before_cleanup() {
        // Thick bar stored inverted (ink=0 on white).
        let mut inverted = GrayImage::from_pixel(30, 30, Luma([255]));
        for x in 5..25 {
            for y in 12..18 {
                inverted.put_pixel(x, y, Luma([0]));
            }
        }
        let out = clean_mask(&inverted, &MorphologyConfig::default()).unwrap();
        assert_eq!(out.get_pixel(15, 15).0[0], 255);
        assert_eq!(out.get_pixel(2, 2).0[0], 0);
    }
}
