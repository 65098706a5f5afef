//! Baseline-anchored normalization of cell vectors into font units.
//!
//! One uniform scale per cell, derived from the template's cap-to-baseline
//! distance, is applied to both axes so relative heights of caps, x-height
//! letters and descenders stay geometrically correct. Coordinates flip to
//! y-up with the baseline at y = 0.

use serde::{Deserialize, Serialize};

use crate::cell::CellRegion;
use crate::glyph::GlyphBounds;
use crate::vectorize::monoline::Stroke;
use crate::vectorize::{Contour, VectorCell};

/// Target font coordinate system, in font units (y-up, baseline 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontMetrics {
    /// Em resolution.
    pub units_per_em: i32,
    /// Cap-height above the baseline.
    pub cap_height: i32,
    /// Ascender above the baseline.
    pub ascender: i32,
    /// Descender below the baseline (negative).
    pub descender: i32,
    /// Left side bearing added to every glyph.
    pub left_bearing: i32,
    /// Right side bearing added to every glyph.
    pub right_bearing: i32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            units_per_em: 1000,
            cap_height: 700,
            ascender: 750,
            descender: -200,
            left_bearing: 10,
            right_bearing: 10,
        }
    }
}

/// A glyph in font units: y-up, baseline at 0, x starting at the left
/// bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGlyph {
    pub outlines: Vec<Contour>,
    pub holes: Vec<Contour>,
    pub advance_width: i32,
    pub bounds: GlyphBounds,
}

/// Map a vectorized cell into font units.
///
/// The scale is `font cap-to-baseline / template cap-to-baseline`; x is
/// measured from the glyph bbox left edge so all coordinates are ≥ 0.
pub fn normalize_cell(
    cell: &VectorCell,
    region: &CellRegion,
    metrics: &FontMetrics,
) -> NormalizedGlyph {
    let template_cap_to_baseline = region.baseline_y - region.cap_height_y;
    debug_assert!(template_cap_to_baseline > 0.0);
    let scale = metrics.cap_height as f64 / template_cap_to_baseline;

    let left = metrics.left_bearing as f64;
    let bbox_x = cell.bbox.x;
    let baseline = region.baseline_y;
    let map_contour = |c: &Contour| -> Contour {
        Contour::new(
            c.points
                .iter()
                .map(|&[x, y]| [(x - bbox_x) * scale + left, (baseline - y) * scale])
                .collect(),
        )
    };

    let outlines: Vec<Contour> = cell.outlines.iter().map(map_contour).collect();
    let holes: Vec<Contour> = cell.holes.iter().map(map_contour).collect();

    let advance_width = (left + cell.bbox.w * scale + metrics.right_bearing as f64).round() as i32;

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in &outlines {
        for p in &c.points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
    }
    let bounds = GlyphBounds {
        x: min_x.round() as i32,
        y: min_y.round() as i32,
        w: (max_x - min_x).round() as i32,
        h: (max_y - min_y).round() as i32,
    };

    NormalizedGlyph {
        outlines,
        holes,
        advance_width,
        bounds,
    }
}

/// Centerline strokes in font units: y-up, baseline at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStrokes {
    pub strokes: Vec<Stroke>,
    pub advance_width: i32,
    pub bounds: GlyphBounds,
}

/// Map monoline strokes into font units with the same anchoring as
/// [`normalize_cell`]. Returns `None` when there are no stroke points.
pub fn normalize_strokes(
    strokes: &[Stroke],
    region: &CellRegion,
    metrics: &FontMetrics,
) -> Option<NormalizedStrokes> {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    for s in strokes {
        for p in &s.points {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
        }
    }
    if !min_x.is_finite() {
        return None;
    }

    let template_cap_to_baseline = region.baseline_y - region.cap_height_y;
    let scale = metrics.cap_height as f64 / template_cap_to_baseline;
    let left = metrics.left_bearing as f64;
    let baseline = region.baseline_y;

    let mapped: Vec<Stroke> = strokes
        .iter()
        .map(|s| {
            Stroke::from_points(
                s.points
                    .iter()
                    .map(|&[x, y]| [(x - min_x) * scale + left, (baseline - y) * scale])
                    .collect(),
            )
        })
        .collect();

    let advance_width =
        (left + (max_x - min_x) * scale + metrics.right_bearing as f64).round() as i32;

    let mut bmin_x = f64::INFINITY;
    let mut bmin_y = f64::INFINITY;
    let mut bmax_x = f64::NEG_INFINITY;
    let mut bmax_y = f64::NEG_INFINITY;
    for s in &mapped {
        for p in &s.points {
            bmin_x = bmin_x.min(p[0]);
            bmin_y = bmin_y.min(p[1]);
            bmax_x = bmax_x.max(p[0]);
            bmax_y = bmax_y.max(p[1]);
        }
    }
    let bounds = GlyphBounds {
        x: bmin_x.round() as i32,
        y: bmin_y.round() as i32,
        w: (bmax_x - bmin_x).round() as i32,
        h: (bmax_y - bmin_y).round() as i32,
    };

    Some(NormalizedStrokes {
        strokes: mapped,
        advance_width,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorize::BoundingBox;

    fn region_100() -> CellRegion {
        CellRegion {
            row: 0,
            col: 0,
            x: 0,
            y: 0,
            width: 100,
            height: 100,
            cap_height_y: 10.0,
            x_height_y: 35.0,
            baseline_y: 80.0,
            descender_y: 95.0,
        }
    }

    fn square_cell(x: f64, y: f64, side: f64) -> VectorCell {
        let outline = Contour::new(vec![
            [x, y + side],
            [x + side, y + side],
            [x + side, y],
            [x, y],
        ]);
        VectorCell {
            bbox: outline.bbox(),
            outlines: vec![outline],
            holes: vec![],
        }
    }

    #[test]
    fn baseline_maps_to_zero_and_y_flips() {
        // Square sitting exactly on the baseline, cap-height tall.
        let cell = square_cell(20.0, 10.0, 70.0);
        let metrics = FontMetrics::default();
        let glyph = normalize_cell(&cell, &region_100(), &metrics);
        // scale = 700 / (80 - 10) = 10
        let ys: Vec<f64> = glyph.outlines[0].points.iter().map(|p| p[1]).collect();
        assert!(ys.iter().any(|&y| y.abs() < 1e-9)); // bottom at baseline
        assert!(ys.iter().any(|&y| (y - 700.0).abs() < 1e-9)); // top at cap
    }

    #[test]
    fn x_is_nonnegative_and_starts_at_bearing() {
        let cell = square_cell(37.0, 10.0, 70.0);
        let glyph = normalize_cell(&cell, &region_100(), &FontMetrics::default());
        let xs: Vec<f64> = glyph.outlines[0].points.iter().map(|p| p[0]).collect();
        let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((min_x - 10.0).abs() < 1e-9);
        assert!(xs.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn advance_width_follows_bbox_and_bearings() {
        let cell = square_cell(20.0, 10.0, 70.0);
        let metrics = FontMetrics::default();
        let glyph = normalize_cell(&cell, &region_100(), &metrics);
        // advance = round(70 * 10) + 10 + 10
        assert_eq!(glyph.advance_width, 720);
        assert!(glyph.advance_width >= 2 * metrics.left_bearing);
    }

    #[test]
    fn uniform_scale_preserves_aspect_ratio() {
        let cell = square_cell(20.0, 30.0, 40.0);
        let glyph = normalize_cell(&cell, &region_100(), &FontMetrics::default());
        assert_eq!(glyph.bounds.w, glyph.bounds.h);
    }

    #[test]
    fn winding_is_preserved_by_the_flip() {
        // CCW in the y-up sense before normalization…
        let cell = square_cell(20.0, 10.0, 50.0);
        assert!(cell.outlines[0].signed_area() > 0.0);
        let glyph = normalize_cell(&cell, &region_100(), &FontMetrics::default());
        // …and still CCW in font space (font contours store y-up directly,
        // so the plain shoelace sign is the negated stored-area sign).
        let pts = &glyph.outlines[0].points;
        let mut shoelace = 0.0;
        for i in 0..pts.len() {
            let p = pts[i];
            let q = pts[(i + 1) % pts.len()];
            shoelace += p[0] * q[1] - q[0] * p[1];
        }
        assert!(shoelace > 0.0);
    }

    #[test]
    fn descender_maps_below_zero() {
        let cell = square_cell(20.0, 80.0, 15.0); // below the baseline
        let glyph = normalize_cell(&cell, &region_100(), &FontMetrics::default());
        let min_y = glyph.outlines[0]
            .points
            .iter()
            .map(|p| p[1])
            .fold(f64::INFINITY, f64::min);
        assert!(min_y < 0.0);
    }

    #[test]
    fn strokes_normalize_with_the_same_anchoring() {
        let stroke = Stroke::from_points(vec![[20.0, 80.0], [90.0, 80.0], [90.0, 10.0]]);
        let n = normalize_strokes(&[stroke], &region_100(), &FontMetrics::default()).unwrap();
        assert_eq!(n.strokes.len(), 1);
        let pts = &n.strokes[0].points;
        // Baseline point lands at y = 0, cap point at 700; x starts at the
        // left bearing.
        assert!((pts[0][0] - 10.0).abs() < 1e-9);
        assert!(pts[0][1].abs() < 1e-9);
        assert!((pts[2][1] - 700.0).abs() < 1e-9);
        // advance = round(70 * 10) + bearings
        assert_eq!(n.advance_width, 720);
    }

    #[test]
    fn empty_strokes_normalize_to_none() {
        assert!(normalize_strokes(&[], &region_100(), &FontMetrics::default()).is_none());
    }

    #[test]
    fn bounds_cover_outlines_only() {
        let outline = Contour::new(vec![[10.0, 20.0], [30.0, 20.0], [30.0, 60.0], [10.0, 60.0]]);
        let cell = VectorCell {
            bbox: BoundingBox::from_points(&outline.points),
            outlines: vec![outline],
            holes: vec![Contour::new(vec![
                [15.0, 30.0],
                [15.0, 50.0],
                [25.0, 50.0],
                [25.0, 30.0],
            ])],
        };
        let glyph = normalize_cell(&cell, &region_100(), &FontMetrics::default());
        assert_eq!(glyph.bounds.w, 200); // 20 px * scale 10
        assert_eq!(glyph.bounds.h, 400);
    }
}
