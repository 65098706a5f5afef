//! Outline vectorization of a cell ink mask.
//!
//! The mask is tight-cropped, pre-smoothed and re-binarized, then contour
//! traced. Classification into outlines and holes comes from the tracer's
//! border topology (outer border vs hole border with a parent link), never
//! from fill heuristics. Winding is normalized in the y-up sense so the
//! downstream flip into font space needs no special casing: outlines are
//! counter-clockwise (positive signed area), holes clockwise (negative).

pub mod monoline;
pub mod simplify;

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use serde::{Deserialize, Serialize};

use crate::raster::{blur_gray, rebinarize};

/// Axis-aligned bounding box in f64 pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    /// Bbox of a point set. Empty input yields a zero box at the origin.
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        if points.is_empty() {
            return Self {
                x: 0.0,
                y: 0.0,
                w: 0.0,
                h: 0.0,
            };
        }
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
        Self {
            x: min_x,
            y: min_y,
            w: max_x - min_x,
            h: max_y - min_y,
        }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.w <= self.x + self.w
            && other.y + other.h <= self.y + self.h
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.w).max(other.x + other.w);
        let max_y = (self.y + self.h).max(other.y + other.h);
        BoundingBox {
            x: min_x,
            y: min_y,
            w: max_x - min_x,
            h: max_y - min_y,
        }
    }
}

/// A closed loop of points in cell pixel coordinates (y-down storage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<[f64; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Signed area in the y-up sense: counter-clockwise outlines are
    /// positive, clockwise holes negative. Storage is y-down, so the
    /// shoelace sum is negated.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut acc = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            acc += p[0] * q[1] - q[0] * p[1];
        }
        -acc / 2.0
    }

    /// Reverse orientation in place.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }
}

/// Outline tracing parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Padding around the tight ink crop, pixels.
    pub pad: u32,
    /// Pre-trace Gaussian sigma (stair-step reduction).
    pub presmooth_sigma: f32,
    /// Re-binarization cutoff after the pre-smooth.
    pub rebinarize_cutoff: u8,
    /// Paths with bbox area below this fraction of the cell area are dust.
    pub min_bbox_frac: f64,
    /// Outlines with bbox area above this fraction of the cell area are
    /// spurious background.
    pub max_outline_bbox_frac: f64,
    /// Douglas-Peucker epsilon in cell pixels.
    pub simplify_epsilon: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            pad: 2,
            presmooth_sigma: 0.8,
            rebinarize_cutoff: 128,
            min_bbox_frac: 1e-4,
            max_outline_bbox_frac: 0.85,
            simplify_epsilon: 0.6,
        }
    }
}

/// Vectorized content of one cell: outer boundaries and their holes, in
/// cell pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorCell {
    pub outlines: Vec<Contour>,
    pub holes: Vec<Contour>,
    /// Bbox of all outline points within the cell.
    pub bbox: BoundingBox,
}

/// Tight bbox of nonzero pixels: (min_x, min_y, max_x, max_y) inclusive.
fn ink_bbox(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = mask.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut any = false;
    for y in 0..h {
        for x in 0..w {
            if mask.get_pixel(x, y).0[0] > 0 {
                any = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }
    any.then_some((min_x, min_y, max_x, max_y))
}

/// Trace the cell mask into outlines and holes.
///
/// Returns `None` when the cell holds no traceable ink (blank cell).
pub fn trace_cell(mask: &GrayImage, config: &TraceConfig) -> Option<VectorCell> {
    let (cell_w, cell_h) = mask.dimensions();
    let (min_x, min_y, max_x, max_y) = ink_bbox(mask)?;

    let crop_x = min_x.saturating_sub(config.pad);
    let crop_y = min_y.saturating_sub(config.pad);
    let crop_w = (max_x + config.pad + 1).min(cell_w) - crop_x;
    let crop_h = (max_y + config.pad + 1).min(cell_h) - crop_y;
    let crop = image::imageops::crop_imm(mask, crop_x, crop_y, crop_w, crop_h).to_image();

    // Soften stair-step edges so the tracer sees true curvature.
    let smoothed = rebinarize(&blur_gray(&crop, config.presmooth_sigma), config.rebinarize_cutoff);

    let traced = find_contours::<i32>(&smoothed);
    let cell_area = cell_w as f64 * cell_h as f64;
    let min_bbox_area = config.min_bbox_frac * cell_area;
    let max_outline_area = config.max_outline_bbox_frac * cell_area;

    // First pass: gate each traced border, remembering which outer borders
    // survive so holes orphaned by a dropped parent are dropped too.
    let mut keep_outline = vec![false; traced.len()];
    let mut outlines = Vec::new();
    for (i, c) in traced.iter().enumerate() {
        if c.border_type != BorderType::Outer {
            continue;
        }
        let points: Vec<[f64; 2]> = c
            .points
            .iter()
            .map(|p| [(p.x + crop_x as i32) as f64, (p.y + crop_y as i32) as f64])
            .collect();
        let contour = Contour::new(points);
        let bbox_area = contour.bbox().area();
        if bbox_area < min_bbox_area {
            continue; // dust
        }
        if bbox_area > max_outline_area {
            tracing::debug!("dropping spurious background outline ({:.0} px²)", bbox_area);
            continue;
        }
        keep_outline[i] = true;
        outlines.push((i, contour));
    }

    let mut holes = Vec::new();
    for c in traced.iter() {
        if c.border_type != BorderType::Hole {
            continue;
        }
        let parent_kept = c.parent.map(|p| keep_outline[p]).unwrap_or(false);
        if !parent_kept {
            continue;
        }
        let points: Vec<[f64; 2]> = c
            .points
            .iter()
            .map(|p| [(p.x + crop_x as i32) as f64, (p.y + crop_y as i32) as f64])
            .collect();
        let contour = Contour::new(points);
        if contour.bbox().area() < min_bbox_area {
            continue;
        }
        holes.push(contour);
    }

    let mut outlines: Vec<Contour> = outlines.into_iter().map(|(_, c)| c).collect();
    if outlines.is_empty() {
        return None;
    }

    // Winding: outlines CCW (positive y-up area), holes CW (negative).
    for c in &mut outlines {
        if c.signed_area() < 0.0 {
            c.reverse();
        }
    }
    for c in &mut holes {
        if c.signed_area() > 0.0 {
            c.reverse();
        }
    }

    let simplify_contour = |c: Contour| -> Option<Contour> {
        let pts = simplify::douglas_peucker(&c.points, config.simplify_epsilon);
        (pts.len() >= 3).then_some(Contour::new(pts))
    };
    let outlines: Vec<Contour> = outlines.into_iter().filter_map(simplify_contour).collect();
    let holes: Vec<Contour> = holes.into_iter().filter_map(simplify_contour).collect();
    if outlines.is_empty() {
        return None;
    }

    let bbox = outlines
        .iter()
        .map(Contour::bbox)
        .reduce(|a, b| a.union(&b))
        .unwrap();

    Some(VectorCell {
        outlines,
        holes,
        bbox,
    })
}
