//! Shared raster operations: grayscale conversion, binarization, polarity
//! normalization, blurring, differencing.
//!
//! Binary masks in this crate are ink=255 on background=0. Functions that
//! consume binary input either assert that polarity or normalize to it.

use image::{GrayImage, Luma, RgbaImage};

use crate::error::PipelineError;

/// Convert an RGBA scan to grayscale luminance (0.299 R + 0.587 G + 0.114 B).
pub fn luminance(rgba: &RgbaImage) -> GrayImage {
    let (w, h) = rgba.dimensions();
    let mut out = GrayImage::new(w, h);
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, _] = src.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        dst.0 = [y.round().clamp(0.0, 255.0) as u8];
    }
    out
}

/// Otsu binarization with inverted polarity: dark pixels become ink=255.
pub fn binarize_ink(gray: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(gray);
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    for (src, dst) in gray.pixels().zip(out.pixels_mut()) {
        dst.0 = [if src.0[0] <= level { 255 } else { 0 }];
    }
    out
}

/// Threshold at a fixed cutoff: values `>= cutoff` become 255, others 0.
pub fn rebinarize(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    for (src, dst) in gray.pixels().zip(out.pixels_mut()) {
        dst.0 = [if src.0[0] >= cutoff { 255 } else { 0 }];
    }
    out
}

/// True if every pixel is 0 or 255.
pub fn is_binary(img: &GrayImage) -> bool {
    img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
}

/// Normalize a binary mask to ink=255 polarity.
///
/// A mask whose foreground (255) pixels dominate is assumed to be inverted
/// (background=255) and is flipped. A non-binary buffer is a programming
/// error and is rejected.
pub fn ensure_ink_polarity(mask: &GrayImage) -> Result<GrayImage, PipelineError> {
    if !is_binary(mask) {
        return Err(PipelineError::InvalidPolarity);
    }
    let total = mask.width() as u64 * mask.height() as u64;
    let white: u64 = mask.pixels().filter(|p| p.0[0] == 255).count() as u64;
    if white * 2 > total {
        tracing::warn!("mask is dominant-white; inverting to ink=255 polarity");
        let mut out = mask.clone();
        for p in out.pixels_mut() {
            p.0 = [255 - p.0[0]];
        }
        Ok(out)
    } else {
        Ok(mask.clone())
    }
}

/// Gaussian-blur a `GrayImage` through an f32 buffer.
pub fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut f = image::ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
    for (src, dst) in img.pixels().zip(f.pixels_mut()) {
        dst.0 = [src.0[0] as f32 / 255.0];
    }
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    let mut out = GrayImage::new(w, h);
    for (src, dst) in blurred.pixels().zip(out.pixels_mut()) {
        dst.0 = [(src.0[0].clamp(0.0, 1.0) * 255.0).round() as u8];
    }
    out
}

/// Per-pixel absolute difference of two same-sized images.
pub fn absolute_difference(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (w, h) = a.dimensions();
    let mut out = GrayImage::new(w, h);
    for ((pa, pb), dst) in a.pixels().zip(b.pixels()).zip(out.pixels_mut()) {
        dst.0 = [pa.0[0].abs_diff(pb.0[0])];
    }
    out
}

/// Number of nonzero pixels.
pub fn count_ink(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}
