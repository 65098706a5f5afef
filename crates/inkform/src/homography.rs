//! Plane-to-plane homography estimation and perspective rectification.
//!
//! Provides:
//! - Direct Linear Transform (DLT) from ≥4 point correspondences with
//!   Hartley normalization. Exact for the four fiducial correspondences,
//!   least-squares when more points are supplied.
//! - Perspective warp with bilinear interpolation into a fixed-size
//!   template-frame buffer.

use image::GrayImage;
use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::error::PipelineError;

/// Project a 2D point through a 3×3 homography: H * [x, y, 1]^T → [u, v].
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Reprojection error: ||project(H, src) - dst||.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(h, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    (dx * dx + dy * dy).sqrt()
}

/// Compute a normalizing transform: translate centroid to origin, scale so
/// mean distance from origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let normalized: Vec<[f64; 2]> = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

/// Estimate the homography H with dst ≈ project(H, src) from ≥4
/// correspondences using DLT.
///
/// Collinear or near-singular correspondence sets surface as
/// [`PipelineError::HomographyDegenerate`].
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, PipelineError> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return Err(PipelineError::HomographyDegenerate(format!(
            "need 4 matched correspondences, got {}/{}",
            n,
            dst.len()
        )));
    }

    // Hartley normalization
    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // Build 2n × 9 matrix A
    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        // Row 2i:   [  0  0  0 | -sx -sy -1 | dy*sx  dy*sy  dy ]
        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        // Row 2i+1: [ sx  sy  1 |  0  0  0 | -dx*sx -dx*sy -dx ]
        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Solve via A^T A: the solution h is the eigenvector of the smallest
    // eigenvalue of the 9×9 matrix A^T A. This avoids thin-SVD dimension
    // issues.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);

    let mut min_idx = 0;
    let mut min_val = eig.eigenvalues[0].abs();
    for i in 1..9 {
        let v = eig.eigenvalues[i].abs();
        if v < min_val {
            min_val = v;
            min_idx = i;
        }
    }
    let h_vec: Vec<f64> = (0..9).map(|j| eig.eigenvectors[(j, min_idx)]).collect();
    #[rustfmt::skip]
    let h_norm = Matrix3::new(
        h_vec[0], h_vec[1], h_vec[2],
        h_vec[3], h_vec[4], h_vec[5],
        h_vec[6], h_vec[7], h_vec[8],
    );

    // Denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst.try_inverse().ok_or_else(|| {
        PipelineError::HomographyDegenerate("destination normalization not invertible".into())
    })?;
    let h = t_dst_inv * h_norm * t_src;

    // Normalize so h[2][2] = 1; a vanishing corner entry means the
    // correspondences were (near-)collinear.
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return Err(PipelineError::HomographyDegenerate(
            "correspondences collinear or near-singular".into(),
        ));
    }
    let h = h / scale;

    // With exactly 4 correspondences the solution must be exact. A large
    // residual means no homography exists (collinear source points).
    if n == 4 {
        let spread = src
            .iter()
            .chain(dst.iter())
            .flat_map(|p| p.iter())
            .fold(1.0f64, |m, &v| m.max(v.abs()));
        let tolerance = 1e-6 * spread;
        for (s, d) in src.iter().zip(dst.iter()) {
            let err = reprojection_error(&h, s, d);
            if !err.is_finite() || err > tolerance {
                return Err(PipelineError::HomographyDegenerate(format!(
                    "4-point solution inconsistent (residual {:.3e})",
                    err
                )));
            }
        }
    }
    Ok(h)
}

/// Warp `src` through `h` (src→template) into an exactly
/// `out_w × out_h` template-frame image using bilinear interpolation.
///
/// Output pixels that map outside the source are white (paper).
pub fn warp_perspective(
    src: &GrayImage,
    h: &Matrix3<f64>,
    out_w: u32,
    out_h: u32,
) -> Result<GrayImage, PipelineError> {
    let h_inv = h.try_inverse().ok_or_else(|| {
        PipelineError::HomographyDegenerate("homography not invertible".into())
    })?;
    let (src_w, src_h) = src.dimensions();
    let raw = src.as_raw();
    let stride = src_w as usize;

    let mut out = GrayImage::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let [sx, sy] = project(&h_inv, x as f64, y as f64);
            let v = if sx.is_finite()
                && sy.is_finite()
                && sx >= 0.0
                && sy >= 0.0
                && sx <= (src_w - 1) as f64
                && sy <= (src_h - 1) as f64
            {
                let x0 = sx.floor() as usize;
                let y0 = sy.floor() as usize;
                let x1 = (x0 + 1).min(stride - 1);
                let y1 = (y0 + 1).min(src_h as usize - 1);
                let fx = sx - x0 as f64;
                let fy = sy - y0 as f64;
                let p00 = raw[y0 * stride + x0] as f64;
                let p10 = raw[y0 * stride + x1] as f64;
                let p01 = raw[y1 * stride + x0] as f64;
                let p11 = raw[y1 * stride + x1] as f64;
                let top = p00 * (1.0 - fx) + p10 * fx;
                let bot = p01 * (1.0 - fx) + p11 * fx;
                (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8
            } else {
                255
            };
            out.put_pixel(x, y, image::Luma([v]));
        }
    }
    Ok(out)
}
