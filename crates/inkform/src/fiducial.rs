//! Corner fiducial detection.
//!
//! Locates the four printed registration squares in a scanned page. The scan
//! is Otsu-binarized (ink=255), external contours are traced, and candidates
//! are gated by area, aspect ratio and solidity before a per-quadrant
//! nearest-to-corner selection.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::raster::binarize_ink;

/// Candidate gating thresholds for fiducial detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialConfig {
    /// Minimum candidate area as a fraction of the image area.
    pub min_area_frac: f64,
    /// Maximum candidate area as a fraction of the image area.
    pub max_area_frac: f64,
    /// Minimum bbox aspect ratio (w/h).
    pub min_aspect: f64,
    /// Maximum bbox aspect ratio (w/h).
    pub max_aspect: f64,
    /// Minimum solidity (contour area / convex hull area).
    pub min_solidity: f64,
    /// Corner quadrant extent as a fraction of each image dimension.
    pub corner_margin_frac: f64,
}

impl Default for FiducialConfig {
    fn default() -> Self {
        Self {
            min_area_frac: 1e-4,
            max_area_frac: 1e-2,
            min_aspect: 0.5,
            max_aspect: 2.0,
            min_solidity: 0.7,
            corner_margin_frac: 0.2,
        }
    }
}

/// A detected fiducial marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Bbox center in scan pixels.
    pub center: [f64; 2],
    /// Contour area in pixels².
    pub area: f64,
    /// Axis-aligned bbox corners, TL TR BR BL.
    pub bbox_corners: [[f64; 2]; 4],
}

/// Detection outcome for the four corners.
///
/// On failure the partial result and the binarized scan are still returned
/// so the host can show the user what the detector saw.
#[derive(Debug, Clone)]
pub struct FiducialDetection {
    /// Markers in TL, TR, BL, BR order.
    pub markers: [Option<Marker>; 4],
    /// True iff all four quadrants produced a selection.
    pub success: bool,
    /// The Otsu-binarized scan used for contour extraction.
    pub binarized: GrayImage,
}

impl FiducialDetection {
    /// Which corners were found, TL TR BL BR.
    pub fn found_mask(&self) -> [bool; 4] {
        [
            self.markers[0].is_some(),
            self.markers[1].is_some(),
            self.markers[2].is_some(),
            self.markers[3].is_some(),
        ]
    }

    /// All four centers, if detection succeeded.
    pub fn centers(&self) -> Option<[[f64; 2]; 4]> {
        let mut out = [[0.0; 2]; 4];
        for (dst, m) in out.iter_mut().zip(self.markers.iter()) {
            *dst = m.as_ref()?.center;
        }
        Some(out)
    }
}

struct Candidate {
    center: [f64; 2],
    area: f64,
    bbox: [f64; 4], // min_x, min_y, max_x, max_y
}

/// Shoelace area of an integer contour, in pixels².
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        acc += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (acc.abs() as f64) / 2.0
}

/// Locate the four corner fiducials in a grayscale scan.
pub fn detect_fiducials(gray: &GrayImage, config: &FiducialConfig) -> FiducialDetection {
    let (w, h) = gray.dimensions();
    let binarized = binarize_ink(gray);
    let image_area = w as f64 * h as f64;
    let min_area = config.min_area_frac * image_area;
    let max_area = config.max_area_frac * image_area;

    let contours = find_contours::<i32>(&binarized);
    let mut candidates = Vec::new();
    for contour in &contours {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let area = contour_area(&contour.points);
        if area < min_area || area > max_area {
            continue;
        }
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let bw = (max_x - min_x + 1) as f64;
        let bh = (max_y - min_y + 1) as f64;
        let aspect = bw / bh;
        if aspect < config.min_aspect || aspect > config.max_aspect {
            continue;
        }
        let hull = imageproc::geometry::convex_hull(contour.points.as_slice());
        let hull_area = contour_area(&hull);
        if hull_area <= 0.0 || area / hull_area < config.min_solidity {
            continue;
        }
        candidates.push(Candidate {
            center: [
                (min_x as f64 + max_x as f64) / 2.0,
                (min_y as f64 + max_y as f64) / 2.0,
            ],
            area,
            bbox: [min_x as f64, min_y as f64, max_x as f64, max_y as f64],
        });
    }
    tracing::debug!("{} fiducial candidates after gating", candidates.len());

    // Image corners, TL TR BL BR.
    let corners = [
        [0.0, 0.0],
        [(w - 1) as f64, 0.0],
        [0.0, (h - 1) as f64],
        [(w - 1) as f64, (h - 1) as f64],
    ];
    let mx = config.corner_margin_frac * w as f64;
    let my = config.corner_margin_frac * h as f64;

    let mut markers: [Option<Marker>; 4] = [None, None, None, None];
    for (slot, corner) in corners.iter().enumerate() {
        let mut best: Option<(f64, &Candidate)> = None;
        for cand in &candidates {
            let in_quadrant = (cand.center[0] - corner[0]).abs() <= mx
                && (cand.center[1] - corner[1]).abs() <= my;
            if !in_quadrant {
                continue;
            }
            let dx = cand.center[0] - corner[0];
            let dy = cand.center[1] - corner[1];
            let dist = dx * dx + dy * dy;
            if best.is_none() || dist < best.as_ref().unwrap().0 {
                best = Some((dist, cand));
            }
        }
        markers[slot] = best.map(|(_, c)| {
            let [min_x, min_y, max_x, max_y] = c.bbox;
            Marker {
                center: c.center,
                area: c.area,
                bbox_corners: [
                    [min_x, min_y],
                    [max_x, min_y],
                    [max_x, max_y],
                    [min_x, max_y],
                ],
            }
        });
    }

    let success = markers.iter().all(|m| m.is_some());
    if success {
        tracing::info!("4 fiducials located");
    } else {
        let found = markers.iter().filter(|m| m.is_some()).count();
        tracing::warn!("only {}/4 fiducials located", found);
    }
    FiducialDetection {
        markers,
        success,
        binarized,
    }
}
