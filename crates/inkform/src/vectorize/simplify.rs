//! Polyline smoothing and simplification primitives.
//!
//! Douglas-Peucker removes vertices whose perpendicular distance from the
//! chord falls below epsilon; Chaikin corner-cutting and a small moving
//! average round off stair-step artifacts before simplification.

/// Perpendicular distance from `p` to the segment `a`–`b`.
fn perpendicular_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-24 {
        let ex = p[0] - a[0];
        let ey = p[1] - a[1];
        return (ex * ex + ey * ey).sqrt();
    }
    (dy * (p[0] - a[0]) - dx * (p[1] - a[1])).abs() / len_sq.sqrt()
}

fn dp_recurse(points: &[[f64; 2]], epsilon: f64, keep: &mut [bool], lo: usize, hi: usize) {
    if hi <= lo + 1 {
        return;
    }
    let mut max_dist = -1.0f64;
    let mut max_idx = lo + 1;
    for i in (lo + 1)..hi {
        let d = perpendicular_distance(points[i], points[lo], points[hi]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }
    // epsilon = 0 keeps every vertex (identity).
    if max_dist > epsilon || epsilon == 0.0 {
        keep[max_idx] = true;
        dp_recurse(points, epsilon, keep, lo, max_idx);
        dp_recurse(points, epsilon, keep, max_idx, hi);
    }
}

/// Douglas-Peucker simplification of an open polyline. Endpoints are always
/// retained; `epsilon = 0` is the identity.
pub fn douglas_peucker(points: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    dp_recurse(points, epsilon, &mut keep, 0, points.len() - 1);
    points
        .iter()
        .zip(keep.iter())
        .filter(|(_, &k)| k)
        .map(|(&p, _)| p)
        .collect()
}

/// Neighbor-averaging smooth of an open polyline; endpoints are fixed.
pub fn moving_average(points: &[[f64; 2]], window: usize) -> Vec<[f64; 2]> {
    if points.len() < 3 || window < 2 {
        return points.to_vec();
    }
    let reach = window - 1;
    let n = points.len();
    let mut out = Vec::with_capacity(n);
    out.push(points[0]);
    for i in 1..n - 1 {
        let lo = i.saturating_sub(reach);
        let hi = (i + reach).min(n - 1);
        let count = (hi - lo + 1) as f64;
        let sx: f64 = points[lo..=hi].iter().map(|p| p[0]).sum();
        let sy: f64 = points[lo..=hi].iter().map(|p| p[1]).sum();
        out.push([sx / count, sy / count]);
    }
    out.push(points[n - 1]);
    out
}

/// Neighbor-averaging smooth of a closed polyline (no repeated last point).
pub fn moving_average_closed(points: &[[f64; 2]], window: usize) -> Vec<[f64; 2]> {
    let n = points.len();
    if n < 4 || window < 2 {
        return points.to_vec();
    }
    let reach = (window - 1) as isize;
    let mut out = Vec::with_capacity(n);
    for i in 0..n as isize {
        let mut sx = 0.0;
        let mut sy = 0.0;
        let mut count = 0.0;
        for d in -reach..=reach {
            let j = (i + d).rem_euclid(n as isize) as usize;
            sx += points[j][0];
            sy += points[j][1];
            count += 1.0;
        }
        out.push([sx / count, sy / count]);
    }
    out
}

/// One round of Chaikin corner cutting on an open polyline.
fn chaikin_once(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let n = points.len();
    let mut out = Vec::with_capacity(2 * n);
    out.push(points[0]);
    for i in 0..n - 1 {
        let p = points[i];
        let q = points[i + 1];
        out.push([0.75 * p[0] + 0.25 * q[0], 0.75 * p[1] + 0.25 * q[1]]);
        out.push([0.25 * p[0] + 0.75 * q[0], 0.25 * p[1] + 0.75 * q[1]]);
    }
    out.push(points[n - 1]);
    out
}

/// Chaikin corner cutting, `iterations` rounds, endpoints preserved.
pub fn chaikin(points: &[[f64; 2]], iterations: usize) -> Vec<[f64; 2]> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut current = points.to_vec();
    for _ in 0..iterations {
        current = chaikin_once(&current);
    }
    current
}

/// Chaikin corner cutting on a closed polyline (no repeated last point).
pub fn chaikin_closed(points: &[[f64; 2]], iterations: usize) -> Vec<[f64; 2]> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut current = points.to_vec();
    for _ in 0..iterations {
        let n = current.len();
        let mut next = Vec::with_capacity(2 * n);
        for i in 0..n {
            let p = current[i];
            let q = current[(i + 1) % n];
            next.push([0.75 * p[0] + 0.25 * q[0], 0.75 * p[1] + 0.25 * q[1]]);
            next.push([0.25 * p[0] + 0.75 * q[0], 0.25 * p[1] + 0.75 * q[1]]);
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_epsilon_is_identity() {
        let pts = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 1.0]];
        assert_eq!(douglas_peucker(&pts, 0.0), pts);
    }

    #[test]
    fn collinear_interior_points_are_removed() {
        let pts = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        let out = douglas_peucker(&pts, 0.1);
        assert_eq!(out, vec![[0.0, 0.0], [3.0, 0.0]]);
    }

    #[test]
    fn corners_above_epsilon_survive() {
        let pts = vec![[0.0, 0.0], [5.0, 0.0], [5.0, 5.0]];
        let out = douglas_peucker(&pts, 0.5);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn simplification_is_idempotent() {
        let pts: Vec<[f64; 2]> = (0..50)
            .map(|i| {
                let t = i as f64 / 49.0 * std::f64::consts::TAU;
                [10.0 * t.cos(), 10.0 * t.sin()]
            })
            .collect();
        for eps in [0.0, 0.3, 1.0] {
            let once = douglas_peucker(&pts, eps);
            let twice = douglas_peucker(&once, eps);
            assert_eq!(once, twice, "epsilon {}", eps);
        }
    }

    #[test]
    fn moving_average_fixes_endpoints() {
        let pts = vec![[0.0, 0.0], [1.0, 4.0], [2.0, 0.0]];
        let out = moving_average(&pts, 2);
        assert_eq!(out[0], [0.0, 0.0]);
        assert_eq!(out[2], [2.0, 0.0]);
        assert!((out[1][1] - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn chaikin_rounds_a_corner() {
        let pts = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]];
        let out = chaikin(&pts, 1);
        assert_eq!(out.first(), Some(&[0.0, 0.0]));
        assert_eq!(out.last(), Some(&[10.0, 10.0]));
        // The sharp corner vertex itself is gone.
        assert!(!out.contains(&[10.0, 0.0]));
    }

    #[test]
    fn chaikin_closed_doubles_point_count() {
        let pts = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
        let out = chaikin_closed(&pts, 1);
        assert_eq!(out.len(), 8);
    }
}
