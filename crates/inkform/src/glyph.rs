//! Glyph records handed to the external font assembler.
//!
//! Paths cross the boundary as SVG-dialect strings: absolute `M L C Q Z`
//! commands, decimal numbers, whitespace separated, one command letter per
//! segment, each contour closed with `Z`. Coordinates are font units, y-up,
//! baseline at 0. Path data is built as raw strings to keep full `f64`
//! precision under our control.

use serde::{Deserialize, Serialize};

use crate::normalize::{NormalizedGlyph, NormalizedStrokes};
use crate::vectorize::monoline::Stroke;
use crate::vectorize::Contour;

/// Integer glyph bbox in font units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphBounds {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// One extracted character, ready for font assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRecord {
    /// Unicode code point.
    pub unicode: u32,
    /// Outline path in the `M L C Q Z` sub-dialect.
    pub svg_path: String,
    /// Horizontal advance in font units.
    pub advance_width: i32,
    /// Outline bbox in font units.
    pub bounds: GlyphBounds,
}

/// Format a coordinate with up to `precision` decimals, trimming trailing
/// zeros so integer-valued coordinates print bare.
fn fmt_coord(v: f64, precision: usize) -> String {
    let s = format!("{:.*}", precision, v);
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    // Avoid "-0" after trimming.
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn push_contour(out: &mut String, contour: &Contour, precision: usize) {
    let mut points = contour.points.iter();
    let Some(first) = points.next() else {
        return;
    };
    out.push_str("M ");
    out.push_str(&fmt_coord(first[0], precision));
    out.push(' ');
    out.push_str(&fmt_coord(first[1], precision));
    for p in points {
        out.push_str(" L ");
        out.push_str(&fmt_coord(p[0], precision));
        out.push(' ');
        out.push_str(&fmt_coord(p[1], precision));
    }
    out.push_str(" Z");
}

/// Serialize outlines and holes into one multi-contour path string.
///
/// Outlines come first, then holes; the non-zero fill rule resolves the
/// interior from the winding established upstream.
pub fn svg_path(outlines: &[Contour], holes: &[Contour], precision: usize) -> String {
    let mut out = String::new();
    for c in outlines.iter().chain(holes.iter()) {
        if !out.is_empty() {
            out.push(' ');
        }
        push_contour(&mut out, c, precision);
    }
    out
}

/// Assemble the pipeline's output record for one character.
pub fn glyph_record(unicode: char, glyph: &NormalizedGlyph) -> GlyphRecord {
    GlyphRecord {
        unicode: unicode as u32,
        svg_path: svg_path(&glyph.outlines, &glyph.holes, 2),
        advance_width: glyph.advance_width,
        bounds: glyph.bounds,
    }
}

fn push_stroke(out: &mut String, stroke: &Stroke, precision: usize) {
    let closed = stroke.is_closed();
    let points = if closed {
        &stroke.points[..stroke.points.len() - 1]
    } else {
        &stroke.points[..]
    };
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return;
    };
    out.push_str("M ");
    out.push_str(&fmt_coord(first[0], precision));
    out.push(' ');
    out.push_str(&fmt_coord(first[1], precision));
    for p in iter {
        out.push_str(" L ");
        out.push_str(&fmt_coord(p[0], precision));
        out.push(' ');
        out.push_str(&fmt_coord(p[1], precision));
    }
    if closed {
        out.push_str(" Z");
    }
}

/// Serialize centerline strokes into one path string. Closed strokes end
/// with `Z`; open strokes stay open (plotter pen-up between `M`s).
pub fn stroke_path(strokes: &[Stroke], precision: usize) -> String {
    let mut out = String::new();
    for s in strokes {
        if !out.is_empty() {
            out.push(' ');
        }
        push_stroke(&mut out, s, precision);
    }
    out
}

/// Assemble a monoline output record for one character.
pub fn stroke_record(unicode: char, strokes: &NormalizedStrokes) -> GlyphRecord {
    GlyphRecord {
        unicode: unicode as u32,
        svg_path: stroke_path(&strokes.strokes, 2),
        advance_width: strokes.advance_width,
        bounds: strokes.bounds,
    }
}
