//! Monoline extraction: skeletonize the ink and recover centerline strokes.
//!
//! Alternative to outline tracing for plotter/stroke output. The mask is
//! thinned to a 1-pixel skeleton (Zhang–Suen), the skeleton is walked as a
//! graph stored in flat arrays (pixel coordinates + degree, no pointer
//! chains), and the resulting polylines are joined, pruned, smoothed and
//! endpoint-welded.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::simplify;
use crate::error::PipelineError;
use crate::raster::ensure_ink_polarity;

/// Monoline extraction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MonolineConfig {
    /// Safety cap on thinning iterations.
    pub max_thinning_iterations: usize,
    /// Maximum endpoint-joining passes.
    pub join_passes: usize,
    /// Chaikin smoothing rounds.
    pub chaikin_iterations: usize,
    /// Endpoint weld clustering radius in pixels.
    pub weld_radius: f64,
}

impl Default for MonolineConfig {
    fn default() -> Self {
        Self {
            max_thinning_iterations: 1000,
            join_passes: 10,
            chaikin_iterations: 2,
            weld_radius: 2.5,
        }
    }
}

/// A polyline stroke along the ink centerline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<[f64; 2]>,
    /// Sum of segment lengths in pixels.
    pub length: f64,
}

impl Stroke {
    pub fn from_points(points: Vec<[f64; 2]>) -> Self {
        let length = polyline_length(&points);
        Self { points, length }
    }

    /// True when the stroke closes on itself exactly.
    pub fn is_closed(&self) -> bool {
        self.points.len() > 2 && self.points.first() == self.points.last()
    }
}

fn polyline_length(points: &[[f64; 2]]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let dx = w[1][0] - w[0][0];
            let dy = w[1][1] - w[0][1];
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

// ── Zhang–Suen thinning ──────────────────────────────────────────────────

/// Neighbor values P2..P9 (N, NE, E, SE, S, SW, W, NW).
fn neighbors(grid: &[bool], w: usize, h: usize, x: usize, y: usize) -> [bool; 8] {
    let at = |dx: isize, dy: isize| -> bool {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
            false
        } else {
            grid[ny as usize * w + nx as usize]
        }
    };
    [
        at(0, -1),
        at(1, -1),
        at(1, 0),
        at(1, 1),
        at(0, 1),
        at(-1, 1),
        at(-1, 0),
        at(-1, -1),
    ]
}

/// Thin an ink=255 mask to a 1-pixel skeleton.
///
/// Terminates when neither sub-iteration removes a pixel, or at the safety
/// cap. The cap is generous: the iteration count scales with the maximum
/// stroke half-width.
pub fn thin_zhang_suen(mask: &GrayImage, max_iterations: usize) -> GrayImage {
    let (w32, h32) = mask.dimensions();
    let (w, h) = (w32 as usize, h32 as usize);
    let mut grid: Vec<bool> = mask.pixels().map(|p| p.0[0] > 0).collect();
    let mut to_remove: Vec<usize> = Vec::new();

    for _ in 0..max_iterations {
        let mut changed = false;
        for sub in 0..2 {
            to_remove.clear();
            for y in 0..h {
                for x in 0..w {
                    if !grid[y * w + x] {
                        continue;
                    }
                    let nb = neighbors(&grid, w, h, x, y);
                    let [p2, p3, p4, p5, p6, p7, p8, p9] = nb;
                    let count = nb.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&count) {
                        continue;
                    }
                    // 0→1 transitions in the cyclic order P2..P9, P2.
                    let seq = [p2, p3, p4, p5, p6, p7, p8, p9, p2];
                    let transitions = seq.windows(2).filter(|w| !w[0] && w[1]).count();
                    if transitions != 1 {
                        continue;
                    }
                    let ok = if sub == 0 {
                        !(p2 && p4 && p6) && !(p4 && p6 && p8)
                    } else {
                        !(p2 && p4 && p8) && !(p2 && p6 && p8)
                    };
                    if ok {
                        to_remove.push(y * w + x);
                    }
                }
            }
            if !to_remove.is_empty() {
                changed = true;
                for &i in &to_remove {
                    grid[i] = false;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut out = GrayImage::new(w32, h32);
    for y in 0..h {
        for x in 0..w {
            if grid[y * w + x] {
                out.put_pixel(x as u32, y as u32, image::Luma([255]));
            }
        }
    }
    out
}

// ── Skeleton graph walk ──────────────────────────────────────────────────

const OFFSETS: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

struct SkeletonGraph {
    w: usize,
    h: usize,
    on: Vec<bool>,
    degree: Vec<u8>,
}

impl SkeletonGraph {
    fn build(skeleton: &GrayImage) -> Self {
        let (w32, h32) = skeleton.dimensions();
        let (w, h) = (w32 as usize, h32 as usize);
        let on: Vec<bool> = skeleton.pixels().map(|p| p.0[0] > 0).collect();
        let mut degree = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                if !on[y * w + x] {
                    continue;
                }
                let mut d = 0u8;
                for (dx, dy) in OFFSETS {
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx >= 0
                        && ny >= 0
                        && nx < w as isize
                        && ny < h as isize
                        && on[ny as usize * w + nx as usize]
                    {
                        d += 1;
                    }
                }
                degree[y * w + x] = d;
            }
        }
        Self { w, h, on, degree }
    }

    fn is_junction(&self, idx: usize) -> bool {
        self.degree[idx] > 2
    }

    fn neighbors_of(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let x = (idx % self.w) as isize;
        let y = (idx / self.w) as isize;
        OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let nx = x + dx;
            let ny = y + dy;
            if nx >= 0 && ny >= 0 && nx < self.w as isize && ny < self.h as isize {
                let n = ny as usize * self.w + nx as usize;
                self.on[n].then_some(n)
            } else {
                None
            }
        })
    }

    fn point(&self, idx: usize) -> [f64; 2] {
        [(idx % self.w) as f64, (idx / self.w) as f64]
    }
}

/// Walk from `start` consuming unvisited pixels until a junction or dead end.
fn walk_path(
    graph: &SkeletonGraph,
    visited: &mut [bool],
    start: usize,
    first_step: usize,
) -> Vec<usize> {
    let mut path = vec![start, first_step];
    visited[start] = true;
    if !graph.is_junction(first_step) {
        visited[first_step] = true;
    }
    if graph.is_junction(first_step) {
        return path;
    }
    let mut prev = start;
    let mut current = first_step;
    loop {
        let mut next = None;
        for n in graph.neighbors_of(current) {
            if n == prev {
                continue;
            }
            if graph.is_junction(n) {
                next = Some(n);
                break;
            }
            if !visited[n] {
                next = Some(n);
                break;
            }
        }
        match next {
            Some(n) => {
                path.push(n);
                if graph.is_junction(n) {
                    break;
                }
                visited[n] = true;
                prev = current;
                current = n;
            }
            None => break,
        }
    }
    path
}

/// Extract raw polylines from a skeleton image.
fn walk_skeleton(skeleton: &GrayImage) -> Vec<Vec<[f64; 2]>> {
    let graph = SkeletonGraph::build(skeleton);
    let n = graph.w * graph.h;
    let mut visited = vec![false; n];
    let mut strokes: Vec<Vec<[f64; 2]>> = Vec::new();

    // Pass 1: open paths from endpoints and branches from junctions.
    for idx in 0..n {
        if !graph.on[idx] || visited[idx] || graph.degree[idx] != 1 {
            continue;
        }
        let Some(first) = graph.neighbors_of(idx).find(|&s| !visited[s] || graph.is_junction(s))
        else {
            visited[idx] = true;
            strokes.push(vec![graph.point(idx)]);
            continue;
        };
        let path = walk_path(&graph, &mut visited, idx, first);
        strokes.push(path.iter().map(|&i| graph.point(i)).collect());
    }

    // Pass 2: remaining unvisited pixels are loops; walk one cycle per seed.
    for idx in 0..n {
        if !graph.on[idx] || visited[idx] || graph.is_junction(idx) {
            continue;
        }
        let Some(first) = graph
            .neighbors_of(idx)
            .find(|&s| !visited[s] && !graph.is_junction(s) && s != idx)
        else {
            visited[idx] = true;
            continue;
        };
        let path = walk_path(&graph, &mut visited, idx, first);
        let mut points: Vec<[f64; 2]> = path.iter().map(|&i| graph.point(i)).collect();
        // Close the loop when the walk returned next to its seed.
        if points.len() > 3 {
            let last = *path.last().unwrap();
            let close = graph.neighbors_of(last).any(|nb| nb == idx);
            if close {
                points.push(graph.point(idx));
            }
        }
        strokes.push(points);
    }

    strokes.retain(|s| s.len() >= 2);
    strokes
}

// ── Joining, pruning, smoothing, welding ─────────────────────────────────

fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// One joining pass: merge the closest terminus pair within `gap`.
///
/// Returns false when no pair qualified.
fn join_once(strokes: &mut Vec<Vec<[f64; 2]>>, gap: f64) -> bool {
    let mut best: Option<(f64, usize, bool, usize, bool)> = None;
    for i in 0..strokes.len() {
        if strokes[i].first() == strokes[i].last() {
            continue; // already closed
        }
        for j in i..strokes.len() {
            if i == j {
                // Self-closure of a long open stroke.
                if strokes[i].len() >= 8 {
                    let d = dist(strokes[i][0], *strokes[i].last().unwrap());
                    if d > 0.0 && d <= gap && best.as_ref().map_or(true, |b| d < b.0) {
                        best = Some((d, i, false, i, false));
                    }
                }
                continue;
            }
            if strokes[j].first() == strokes[j].last() {
                continue;
            }
            for &end_i in &[false, true] {
                for &end_j in &[false, true] {
                    let pi = if end_i { *strokes[i].last().unwrap() } else { strokes[i][0] };
                    let pj = if end_j { *strokes[j].last().unwrap() } else { strokes[j][0] };
                    let d = dist(pi, pj);
                    if d <= gap && best.as_ref().map_or(true, |b| d < b.0) {
                        best = Some((d, i, end_i, j, end_j));
                    }
                }
            }
        }
    }

    let Some((_, i, end_i, j, end_j)) = best else {
        return false;
    };
    if i == j {
        let first = strokes[i][0];
        strokes[i].push(first);
        return true;
    }
    // Orient so we append stroke j after the tail of stroke i.
    let mut a = std::mem::take(&mut strokes[i]);
    let mut b = std::mem::take(&mut strokes[j]);
    if !end_i {
        a.reverse();
    }
    if end_j {
        b.reverse();
    }
    a.extend(b);
    strokes[i] = a;
    strokes.remove(j);
    true
}

/// Count endpoint pairs that are near each other but not welded to the same
/// coordinates.
pub fn count_nearby_endpoints(strokes: &[Stroke], radius: f64) -> usize {
    let mut endpoints: Vec<[f64; 2]> = Vec::new();
    for s in strokes {
        if s.points.is_empty() {
            continue;
        }
        endpoints.push(s.points[0]);
        if s.points.len() > 1 {
            endpoints.push(*s.points.last().unwrap());
        }
    }
    let mut count = 0;
    for i in 0..endpoints.len() {
        for j in (i + 1)..endpoints.len() {
            let d = dist(endpoints[i], endpoints[j]);
            if d > 0.0 && d <= radius {
                count += 1;
            }
        }
    }
    count
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Cluster stroke endpoints within `radius` and snap each cluster to its
/// centroid, so strokes that should meet share exact coordinates.
fn weld_endpoints(strokes: &mut [Vec<[f64; 2]>], radius: f64) {
    // (stroke index, is_tail) per endpoint.
    let mut refs: Vec<(usize, bool)> = Vec::new();
    let mut pts: Vec<[f64; 2]> = Vec::new();
    for (i, s) in strokes.iter().enumerate() {
        if s.is_empty() {
            continue;
        }
        refs.push((i, false));
        pts.push(s[0]);
        if s.len() > 1 {
            refs.push((i, true));
            pts.push(*s.last().unwrap());
        }
    }
    let mut uf = UnionFind::new(pts.len());
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            if dist(pts[i], pts[j]) <= radius {
                uf.union(i, j);
            }
        }
    }
    let n = pts.len();
    let mut sum = vec![[0.0f64; 2]; n];
    let mut cnt = vec![0usize; n];
    for i in 0..n {
        let r = uf.find(i);
        sum[r][0] += pts[i][0];
        sum[r][1] += pts[i][1];
        cnt[r] += 1;
    }
    for i in 0..n {
        let r = uf.find(i);
        let centroid = [sum[r][0] / cnt[r] as f64, sum[r][1] / cnt[r] as f64];
        let (si, tail) = refs[i];
        let len = strokes[si].len();
        if tail {
            strokes[si][len - 1] = centroid;
        } else {
            strokes[si][0] = centroid;
        }
    }
}

/// Ink bbox dimensions (w, h) of a mask, for scale-relative thresholds.
fn mask_ink_extent(mask: &GrayImage) -> (f64, f64) {
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
    if !any {
        return (0.0, 0.0);
    }
    ((max_x - min_x + 1) as f64, (max_y - min_y + 1) as f64)
}

/// Extract centerline strokes from an ink mask.
///
/// Join runs before pruning so short branches near joints get absorbed
/// rather than discarded.
pub fn extract_strokes(
    mask: &GrayImage,
    config: &MonolineConfig,
) -> Result<Vec<Stroke>, PipelineError> {
    let mask = ensure_ink_polarity(mask)?;
    let (bbox_w, bbox_h) = mask_ink_extent(&mask);
    if bbox_w == 0.0 {
        return Ok(Vec::new());
    }
    let min_dim = bbox_w.min(bbox_h);

    let skeleton = thin_zhang_suen(&mask, config.max_thinning_iterations);
    let mut strokes = walk_skeleton(&skeleton);
    tracing::debug!("{} raw skeleton strokes", strokes.len());

    let join_gap = (0.3 * min_dim).max(5.0);
    for _ in 0..config.join_passes {
        let mut progressed = false;
        let max_merges = strokes.len().max(1);
        for _ in 0..max_merges {
            if join_once(&mut strokes, join_gap) {
                progressed = true;
            } else {
                break;
            }
        }
        if !progressed {
            break;
        }
    }

    let min_length = (0.05 * min_dim).max(3.0);
    strokes.retain(|s| polyline_length(s) >= min_length);

    let dp_epsilon = (0.005 * min_dim).max(0.5);
    let smoothed: Vec<Stroke> = strokes
        .into_iter()
        .map(|points| {
            let closed = points.len() > 2 && points.first() == points.last();
            let pts = if closed {
                let mut open: Vec<[f64; 2]> = points;
                open.pop();
                let avg = simplify::moving_average_closed(&open, 2);
                let mut smooth = simplify::chaikin_closed(&avg, config.chaikin_iterations);
                smooth.push(smooth[0]);
                simplify::douglas_peucker(&smooth, dp_epsilon)
            } else {
                let avg = simplify::moving_average(&points, 2);
                let smooth = simplify::chaikin(&avg, config.chaikin_iterations);
                simplify::douglas_peucker(&smooth, dp_epsilon)
            };
            pts
        })
        .map(Stroke::from_points)
        .collect();

    let mut raw: Vec<Vec<[f64; 2]>> = smoothed.into_iter().map(|s| s.points).collect();
    weld_endpoints(&mut raw, config.weld_radius);
    let strokes: Vec<Stroke> = raw.into_iter().map(Stroke::from_points).collect();
    tracing::debug!("{} strokes after join/prune/weld", strokes.len());
    Ok(strokes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn line_mask(w: u32, h: u32, thickness: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        let y0 = h / 2 - thickness / 2;
        for x in 5..w - 5 {
            for y in y0..y0 + thickness {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn thinning_reduces_bar_to_single_pixel_line() {
        let mask = line_mask(60, 20, 5);
        let skeleton = thin_zhang_suen(&mask, 1000);
        // Any interior column holds exactly one skeleton pixel.
        for x in 12..48 {
            let col: usize = (0..20)
                .filter(|&y| skeleton.get_pixel(x, y).0[0] > 0)
                .count();
            assert_eq!(col, 1, "column {}", x);
        }
    }

    #[test]
    fn thinning_terminates_quickly_on_blank_input() {
        let mask = GrayImage::new(64, 64);
        let skeleton = thin_zhang_suen(&mask, 1000);
        assert!(skeleton.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn thinning_converges_well_below_the_safety_cap() {
        // Iterations scale with stroke half-width, so a thick blob settles
        // long before the cap; raising the cap changes nothing.
        let mask = line_mask(60, 40, 20);
        let capped = thin_zhang_suen(&mask, 1000);
        let uncapped = thin_zhang_suen(&mask, 10_000);
        assert_eq!(capped, uncapped);
    }

    #[test]
    fn straight_bar_yields_one_stroke() {
        let mask = line_mask(80, 24, 4);
        let strokes = extract_strokes(&mask, &MonolineConfig::default()).unwrap();
        assert_eq!(strokes.len(), 1);
        assert!(strokes[0].length > 50.0);
        assert!(!strokes[0].is_closed());
    }

    #[test]
    fn skeleton_ring_becomes_single_closed_stroke() {
        // 1px-wide digital circle, radius 15.
        let mut mask = GrayImage::new(50, 50);
        for i in 0..360 {
            let a = (i as f64).to_radians();
            let x = (25.0 + 15.0 * a.cos()).round() as u32;
            let y = (25.0 + 15.0 * a.sin()).round() as u32;
            mask.put_pixel(x, y, Luma([255]));
        }
        let strokes = extract_strokes(&mask, &MonolineConfig::default()).unwrap();
        assert_eq!(strokes.len(), 1);
        assert!(strokes[0].is_closed());
        assert_eq!(count_nearby_endpoints(&strokes, 3.0), 0);
    }

    #[test]
    fn short_spurs_are_pruned() {
        let mut mask = line_mask(80, 30, 4);
        // A 2px nub attached to the bar; far below the length floor.
        mask.put_pixel(40, 10, Luma([255]));
        let strokes = extract_strokes(&mask, &MonolineConfig::default()).unwrap();
        assert_eq!(strokes.len(), 1);
    }

    #[test]
    fn gap_in_stroke_is_joined() {
        let mut mask = GrayImage::new(100, 20);
        for x in 5..45 {
            mask.put_pixel(x, 10, Luma([255]));
        }
        // 4px gap, within the default join distance.
        for x in 48..95 {
            mask.put_pixel(x, 10, Luma([255]));
        }
        let strokes = extract_strokes(&mask, &MonolineConfig::default()).unwrap();
        assert_eq!(strokes.len(), 1);
    }

    #[test]
    fn welded_termini_share_exact_coordinates() {
        // An L shape drawn as two separate 1px strokes meeting at a corner.
        let mut mask = GrayImage::new(40, 40);
        for x in 5..20 {
            mask.put_pixel(x, 30, Luma([255]));
        }
        for y in 8..29 {
            mask.put_pixel(21, y, Luma([255]));
        }
        let strokes = extract_strokes(&mask, &MonolineConfig::default()).unwrap();
        // Either joined into one stroke, or welded to identical coordinates.
        assert_eq!(count_nearby_endpoints(&strokes, 2.0), 0);
    }
}
