//! Per-cell extraction from the cleaned page mask.
//!
//! Each cell's writing area is the cell rectangle minus the label band at
//! the top and a small inset on the remaining sides. Within that crop,
//! connected components are filtered by area and by centroid position so
//! that residual label ink never reaches the vectorizer.
//!
//! Filtering is by component id, never by erosion, so holes inside
//! letterforms survive: a hole is background and is never a foreground
//! component.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};

use crate::template::TemplateCoordinates;

/// Inset applied to the left, right and bottom edges of the writing area.
const WRITING_AREA_INSET_PX: u32 = 4;

/// Per-cell component filter parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFilterConfig {
    /// Components smaller than this many pixels are dust.
    pub min_area: u32,
    /// Components whose centroid lies within this top fraction of the
    /// writing area are treated as label residue.
    pub reject_top_fraction: f64,
}

impl Default for CellFilterConfig {
    fn default() -> Self {
        Self {
            min_area: 50,
            reject_top_fraction: 0.15,
        }
    }
}

/// One cell's writing area in page coordinates, with guide positions
/// translated into writing-area pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRegion {
    /// Grid row.
    pub row: u32,
    /// Grid column.
    pub col: u32,
    /// Left edge in page pixels.
    pub x: u32,
    /// Top edge in page pixels (bottom of the label band).
    pub y: u32,
    /// Writing area width.
    pub width: u32,
    /// Writing area height.
    pub height: u32,
    /// Cap-height line, pixels from the writing-area top.
    pub cap_height_y: f64,
    /// x-height line, pixels from the writing-area top.
    pub x_height_y: f64,
    /// Baseline, pixels from the writing-area top.
    pub baseline_y: f64,
    /// Descender line, pixels from the writing-area top.
    pub descender_y: f64,
}

/// Compute the writing area of cell (row, col).
pub fn writing_area(coords: &TemplateCoordinates, row: u32, col: u32) -> CellRegion {
    let [cell_x, cell_y] = coords.grid.cell_origin(row, col);
    let g = &coords.cell_guides;
    let inset = WRITING_AREA_INSET_PX as f64;

    let x = cell_x + inset;
    let y = cell_y + g.label_top;
    let width = (coords.grid.cell_width - 2.0 * inset).max(1.0);
    let height = (coords.grid.cell_height - g.label_top - inset).max(1.0);

    CellRegion {
        row,
        col,
        x: x.round() as u32,
        y: y.round() as u32,
        width: width.round() as u32,
        height: height.round() as u32,
        cap_height_y: g.cap_height - g.label_top,
        x_height_y: g.x_height - g.label_top,
        baseline_y: g.baseline - g.label_top,
        descender_y: g.descender - g.label_top,
    }
}

/// Crop the page mask to a cell's writing area.
pub fn crop_writing_area(mask: &GrayImage, region: &CellRegion) -> GrayImage {
    image::imageops::crop_imm(mask, region.x, region.y, region.width, region.height).to_image()
}

/// Filter a cell mask's connected components in place of the raw crop.
///
/// Drops components below the area floor and components whose centroid lies
/// in the label-rejection band at the top of the writing area.
pub fn filter_components(cell_mask: &GrayImage, config: &CellFilterConfig) -> GrayImage {
    let (w, h) = cell_mask.dimensions();
    let labels = connected_components(cell_mask, Connectivity::Eight, Luma([0u8]));

    let mut max_label = 0u32;
    for p in labels.pixels() {
        max_label = max_label.max(p.0[0]);
    }
    if max_label == 0 {
        return GrayImage::new(w, h);
    }

    // Per-label area and centroid-y accumulation. Label 0 is background.
    let mut area = vec![0u32; max_label as usize + 1];
    let mut sum_y = vec![0u64; max_label as usize + 1];
    for y in 0..h {
        for x in 0..w {
            let label = labels.get_pixel(x, y).0[0] as usize;
            if label > 0 {
                area[label] += 1;
                sum_y[label] += y as u64;
            }
        }
    }

    let reject_band = config.reject_top_fraction * h as f64;
    let mut keep = vec![false; max_label as usize + 1];
    let mut dropped_small = 0usize;
    let mut dropped_label_band = 0usize;
    for label in 1..=max_label as usize {
        if area[label] == 0 {
            continue;
        }
        let centroid_y = sum_y[label] as f64 / area[label] as f64;
        if area[label] < config.min_area {
            dropped_small += 1;
        } else if centroid_y < reject_band {
            dropped_label_band += 1;
        } else {
            keep[label] = true;
        }
    }
    if dropped_small + dropped_label_band > 0 {
        tracing::debug!(
            "cell filter dropped {} small and {} label-band components",
            dropped_small,
            dropped_label_band
        );
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let label = labels.get_pixel(x, y).0[0] as usize;
            if label > 0 && keep[label] {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }
    out
}

/// Crop and filter one cell in a single step.
pub fn extract_cell(mask: &GrayImage, region: &CellRegion, config: &CellFilterConfig) -> GrayImage {
    filter_components(&crop_writing_area(mask, region), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::count_ink;
    use crate::template::TemplateConfig;
    use crate::test_utils::draw_filled_square;

    #[test]
    fn writing_area_excludes_label_band() {
        let coords = TemplateConfig::default().coordinates();
        let region = writing_area(&coords, 0, 0);
        let g = &coords.cell_guides;
        assert_eq!(region.y, (coords.grid.start_y + g.label_top).round() as u32);
        assert!(region.baseline_y > region.cap_height_y);
        assert!((region.baseline_y - (g.baseline - g.label_top)).abs() < 1e-9);
        // Writing area fits inside the cell.
        assert!((region.height as f64) < coords.grid.cell_height);
    }

    #[test]
    fn small_components_are_dropped() {
        let mut mask = GrayImage::new(100, 100);
        draw_filled_square(&mut mask, 30, 50, 20, 255); // 400 px, kept
        draw_filled_square(&mut mask, 70, 70, 4, 255); // 16 px, dust
        let out = filter_components(&mask, &CellFilterConfig::default());
        assert_eq!(count_ink(&out), 400);
        assert_eq!(out.get_pixel(72, 72).0[0], 0);
    }

    #[test]
    fn label_band_components_are_dropped() {
        let mut mask = GrayImage::new(100, 100);
        // Centroid at y≈8, well within the top 15%.
        draw_filled_square(&mut mask, 40, 2, 12, 255);
        // Centroid at y=56.
        draw_filled_square(&mut mask, 40, 50, 12, 255);
        let out = filter_components(&mask, &CellFilterConfig::default());
        assert_eq!(count_ink(&out), 144);
        assert_eq!(out.get_pixel(45, 5).0[0], 0);
        assert_eq!(out.get_pixel(45, 55).0[0], 255);
    }

    #[test]
    fn holes_survive_component_filtering() {
        // A ring: foreground is one component, the hole is background.
        let mut mask = GrayImage::new(60, 60);
        draw_filled_square(&mut mask, 20, 20, 20, 255);
        draw_filled_square(&mut mask, 27, 27, 6, 0);
        let before_hole = mask.get_pixel(30, 30).0[0];
        let out = filter_components(&mask, &CellFilterConfig::default());
        assert_eq!(before_hole, 0);
        assert_eq!(out.get_pixel(30, 30).0[0], 0);
        assert_eq!(out.get_pixel(21, 21).0[0], 255);
        assert_eq!(count_ink(&out), 20 * 20 - 6 * 6);
    }
}
