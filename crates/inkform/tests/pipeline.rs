//! End-to-end pipeline scenarios on synthetic scans.

use image::{GrayImage, Luma, RgbaImage};
use nalgebra::Matrix3;

use inkform::fiducial::detect_fiducials;
use inkform::homography::warp_perspective;
use inkform::raster::count_ink;
use inkform::render::render_blank_page;
use inkform::{CharacterSet, ProcessingOptions, TemplateConfig};

fn to_rgba(gray: &GrayImage) -> RgbaImage {
    let (w, h) = gray.dimensions();
    let mut out = RgbaImage::new(w, h);
    for (src, dst) in gray.pixels().zip(out.pixels_mut()) {
        let v = src.0[0];
        dst.0 = [v, v, v, 255];
    }
    out
}

/// Draw a ring (annulus) in page coordinates.
fn draw_ring(img: &mut GrayImage, cx: f64, cy: f64, r_outer: f64, thickness: f64) {
    let (w, h) = img.dimensions();
    let r_inner = r_outer - thickness;
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= r_outer && d >= r_inner {
                img.put_pixel(x, y, Luma([0]));
            }
        }
    }
}

/// Scan with a cap-height circle sitting on cell (0,0)'s baseline.
///
/// Returns the scan and the circle diameter in page pixels.
fn page_with_circle(config: &TemplateConfig) -> (GrayImage, f64) {
    let coords = config.coordinates();
    let mut page = render_blank_page(config, 0, CharacterSet::Required, None);
    let [cell_x, cell_y] = coords.grid.cell_origin(0, 0);
    let g = &coords.cell_guides;
    let diameter = g.baseline - g.cap_height;
    let cx = cell_x + coords.grid.cell_width / 2.0;
    let cy = cell_y + (g.cap_height + g.baseline) / 2.0;
    draw_ring(&mut page, cx, cy, diameter / 2.0, 3.0);
    (page, diameter)
}

#[test]
fn empty_template_round_trip() {
    let opts = ProcessingOptions::default();
    let page = render_blank_page(&opts.config, 0, CharacterSet::Required, None);
    let result = inkform::process_template_page(&to_rgba(&page), &opts);

    assert!(result.success, "error: {:?}", result.error);
    assert!(result.glyphs.is_empty());

    let detection = result.markers.unwrap();
    assert!(detection.success);
    let coords = opts.config.coordinates();
    let expected = coords.markers.as_array();
    for (found, want) in detection.centers().unwrap().iter().zip(expected.iter()) {
        assert!((found[0] - want[0]).abs() <= 1.0, "{:?} vs {:?}", found, want);
        assert!((found[1] - want[1]).abs() <= 1.0, "{:?} vs {:?}", found, want);
    }

    // The cleaned mask is all but empty: a blank scan differenced against
    // its own reference leaves at most isolated resampling specks.
    let cleaned = result.debug.cleaned.unwrap();
    assert!(count_ink(&cleaned) < 50, "ink: {}", count_ink(&cleaned));

    let required = CharacterSet::Required.chars().len();
    assert_eq!(result.stats.cells_total, required.min(80));
    assert_eq!(result.stats.cells_blank, result.stats.cells_total);
    assert_eq!(result.stats.cells_vectorized, 0);
}

#[test]
fn single_circle_cell_yields_ring_glyph() {
    let opts = ProcessingOptions::default();
    let (page, diameter) = page_with_circle(&opts.config);
    let result = inkform::process_template_page(&to_rgba(&page), &opts);

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.glyphs.len(), 1);

    let glyph = &result.glyphs[0];
    assert_eq!(glyph.unicode, 'A' as u32);

    // One outline plus one hole → exactly two closed contours.
    assert_eq!(glyph.svg_path.matches('Z').count(), 2);
    assert_eq!(glyph.svg_path.matches('M').count(), 2);

    // Circle diameter equals template cap-to-baseline, so the scaled width
    // is the font cap height; advance adds both default bearings.
    let metrics = &opts.metrics;
    let scale = metrics.cap_height as f64 / diameter;
    let expected_advance =
        (diameter * scale).round() as i32 + metrics.left_bearing + metrics.right_bearing;
    assert!(
        (glyph.advance_width - expected_advance).abs() <= 30,
        "advance {} vs expected {}",
        glyph.advance_width,
        expected_advance
    );
    assert!(glyph.advance_width >= 2 * metrics.left_bearing);

    // Ring proportions survive: the glyph is as tall as it is wide, within
    // tracing tolerance.
    assert!((glyph.bounds.w - glyph.bounds.h).abs() <= 20);
}

#[test]
fn ink_crossing_the_label_band_is_cropped_to_the_writing_area() {
    let opts = ProcessingOptions::default();
    let coords = opts.config.coordinates();
    let mut page = render_blank_page(&opts.config, 0, CharacterSet::Required, None);

    // A bar from the very top of cell (0,0) down to half the cell height.
    let [cell_x, cell_y] = coords.grid.cell_origin(0, 0);
    let bar_x = (cell_x + coords.grid.cell_width / 2.0) as u32;
    let bar_h = (coords.grid.cell_height * 0.5) as u32;
    for y in 0..bar_h {
        for dx in 0..8 {
            page.put_pixel(bar_x + dx, cell_y as u32 + y, Luma([0]));
        }
    }

    let result = inkform::process_template_page(&to_rgba(&page), &opts);
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.glyphs.len(), 1);

    // Only the portion below the label band survives; the glyph height is
    // (0.5 − label_top) of the cell, not 0.5.
    let g = &coords.cell_guides;
    let visible_h = coords.grid.cell_height * 0.5 - g.label_top;
    let scale = opts.metrics.cap_height as f64 / (g.baseline - g.cap_height);
    let expected_h = (visible_h * scale).round() as i32;
    let got_h = result.glyphs[0].bounds.h;
    assert!(
        (got_h - expected_h).abs() <= 40,
        "glyph height {} vs expected {}",
        got_h,
        expected_h
    );
}

/// Distortion applied to synthesize a photographed page: slight keystone,
/// 5° rotation about the page center, then a translation into a larger
/// canvas.
fn distortion(coords_w: f64, coords_h: f64) -> Matrix3<f64> {
    let keystone = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.5e-5, 0.0, 1.0);
    let theta = 5.0f64.to_radians();
    let (s, c) = theta.sin_cos();
    let rot = Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0);
    let center = Matrix3::new(
        1.0,
        0.0,
        coords_w / 2.0,
        0.0,
        1.0,
        coords_h / 2.0,
        0.0,
        0.0,
        1.0,
    );
    let center_inv = Matrix3::new(
        1.0,
        0.0,
        -coords_w / 2.0,
        0.0,
        1.0,
        -coords_h / 2.0,
        0.0,
        0.0,
        1.0,
    );
    let shift = Matrix3::new(1.0, 0.0, 60.0, 0.0, 1.0, 50.0, 0.0, 0.0, 1.0);
    shift * center * rot * center_inv * keystone
}

#[test]
fn perspective_distorted_scan_rectifies_within_tolerance() {
    let opts = ProcessingOptions::default();
    let coords = opts.config.coordinates();
    let (page, _) = page_with_circle(&opts.config);

    let d = distortion(coords.page_width as f64, coords.page_height as f64);
    let scan = warp_perspective(&page, &d, 1400, 1750).unwrap();

    let result = inkform::process_template_page(&to_rgba(&scan), &opts);
    assert!(result.success, "error: {:?}", result.error);

    // Rectified fiducials line up with the template to within 2 px.
    let warped = result.debug.warped.unwrap();
    let redetect = detect_fiducials(&warped, &opts.fiducial);
    assert!(redetect.success);
    for (found, want) in redetect
        .centers()
        .unwrap()
        .iter()
        .zip(coords.markers.as_array().iter())
    {
        let dx = found[0] - want[0];
        let dy = found[1] - want[1];
        assert!(
            (dx * dx + dy * dy).sqrt() <= 2.0,
            "{:?} vs {:?}",
            found,
            want
        );
    }

    // The circle cell survives rectification with its topology intact.
    assert_eq!(result.glyphs.len(), 1);
    let glyph = &result.glyphs[0];
    assert_eq!(glyph.svg_path.matches('Z').count(), 2);

    // And matches the undistorted result closely.
    let flat = inkform::process_template_page(&to_rgba(&page), &opts);
    let flat_glyph = &flat.glyphs[0];
    assert!((glyph.advance_width - flat_glyph.advance_width).abs() <= 25);
    assert!((glyph.bounds.w - flat_glyph.bounds.w).abs() <= 25);
    assert!((glyph.bounds.h - flat_glyph.bounds.h).abs() <= 25);
}

#[test]
fn monoline_mode_produces_a_closed_centerline_for_the_circle() {
    let opts = ProcessingOptions {
        mode: inkform::VectorizeMode::Monoline,
        ..Default::default()
    };
    let (page, _) = page_with_circle(&opts.config);
    let result = inkform::process_template_page(&to_rgba(&page), &opts);

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.glyphs.len(), 1);
    let glyph = &result.glyphs[0];
    // The ring skeleton closes into a loop.
    assert!(glyph.svg_path.contains('Z'), "path: {}", glyph.svg_path);
    assert!(glyph.advance_width >= 2 * opts.metrics.left_bearing);
    assert_eq!(result.stats.cells_vectorized, 1);
}

#[test]
fn glyphs_come_out_in_row_major_cell_order() {
    let opts = ProcessingOptions::default();
    let coords = opts.config.coordinates();
    let mut page = render_blank_page(&opts.config, 0, CharacterSet::Required, None);

    // Ink in cells (0, 2), (0, 5) and (1, 1): expect 'C', 'F', 'J'.
    for (row, col) in [(0u32, 2u32), (0, 5), (1, 1)] {
        let [cx, cy] = coords.grid.cell_origin(row, col);
        let g = &coords.cell_guides;
        let x0 = (cx + coords.grid.cell_width * 0.3) as u32;
        let y0 = (cy + g.x_height) as u32;
        for x in x0..x0 + 30 {
            for y in y0..y0 + 30 {
                page.put_pixel(x, y, Luma([0]));
            }
        }
    }

    let result = inkform::process_template_page(&to_rgba(&page), &opts);
    assert!(result.success, "error: {:?}", result.error);
    let unicodes: Vec<u32> = result.glyphs.iter().map(|g| g.unicode).collect();
    assert_eq!(unicodes, vec!['C' as u32, 'F' as u32, 'J' as u32]);
}
