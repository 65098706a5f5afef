//! Blank template rendering.
//!
//! Produces the expected printed page as a grayscale reference image. The
//! differencer subtracts this from the rectified scan, so the geometry
//! layers here (markers, cell borders, guide lines) must match the printed
//! template exactly; they use the same [`TemplateCoordinates`] the detector
//! and the cell extractor use.
//!
//! Text layers (cell labels, the large guide glyph) need a font and are
//! skipped when none is supplied. Both layers are recoverable downstream:
//! labels land in the label band the cell filter rejects, and the guide
//! glyph is printed lighter than the subtraction threshold.

use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use std::sync::{Mutex, OnceLock};

use crate::charset::{cell_label, CharacterSet};
use crate::template::{TemplateConfig, TemplateCoordinates};

/// Paper white.
const BG: Luma<u8> = Luma([255]);
/// Fiducial ink.
const MARKER: Luma<u8> = Luma([0]);
/// Cell border gray.
const CELL_BORDER: Luma<u8> = Luma([200]);
/// Guide line gray.
const GUIDE_LINE: Luma<u8> = Luma([220]);
/// Label text gray.
const LABEL_TEXT: Luma<u8> = Luma([120]);
/// Guide glyph gray. Kept above `255 - subtract threshold` so a reference
/// rendered without a font still differences to zero against the print.
const GUIDE_GLYPH: Luma<u8> = Luma([235]);

fn draw_marker(img: &mut GrayImage, center: [f64; 2], size: u32) {
    let half = size as i32 / 2;
    let cx = center[0].round() as i32;
    let cy = center[1].round() as i32;
    draw_filled_rect_mut(
        img,
        Rect::at(cx - half, cy - half).of_size(size, size),
        MARKER,
    );
    // Stroked square around the filled one, one size step out. The step is
    // even so both squares keep the same center parity.
    let outer = size + 2 * (size / 6).max(2);
    let oh = outer as i32 / 2;
    draw_hollow_rect_mut(
        img,
        Rect::at(cx - oh, cy - oh).of_size(outer, outer),
        MARKER,
    );
}

fn draw_cell(
    img: &mut GrayImage,
    coords: &TemplateCoordinates,
    row: u32,
    col: u32,
    ch: Option<char>,
    font: Option<&FontVec>,
) {
    let [x, y] = coords.grid.cell_origin(row, col);
    let w = coords.grid.cell_width;
    let h = coords.grid.cell_height;
    let g = &coords.cell_guides;

    // Guide glyph behind everything else.
    if let (Some(ch), Some(font)) = (ch, font) {
        let scale = PxScale::from((h * 0.55) as f32);
        let text = ch.to_string();
        let (tw, th) = text_size(scale, font, &text);
        let tx = x + (w - tw as f64) / 2.0;
        let ty = y + g.label_top + (h - g.label_top - th as f64) / 2.0;
        draw_text_mut(
            img,
            GUIDE_GLYPH,
            tx.round() as i32,
            ty.round() as i32,
            scale,
            font,
            &text,
        );
    }

    // Horizontal guide lines.
    for offset in [g.cap_height, g.x_height, g.baseline, g.descender] {
        let ly = (y + offset) as f32;
        draw_line_segment_mut(img, (x as f32, ly), ((x + w) as f32, ly), GUIDE_LINE);
    }

    // Cell border.
    draw_hollow_rect_mut(
        img,
        Rect::at(x.round() as i32, y.round() as i32).of_size(w.round() as u32, h.round() as u32),
        CELL_BORDER,
    );

    // Label in the band above the writing area.
    if let (Some(ch), Some(font)) = (ch, font) {
        let scale = PxScale::from((g.label_top * 0.7) as f32);
        draw_text_mut(
            img,
            LABEL_TEXT,
            (x + 3.0).round() as i32,
            (y + 2.0).round() as i32,
            scale,
            font,
            &cell_label(ch),
        );
    }
}

/// Render the blank template page for `page_number` of `charset`.
///
/// Output is exactly `page_width × page_height`. Pass a font to include the
/// label and guide-glyph text layers (printing); pass `None` for the
/// differencing reference.
pub fn render_blank_page(
    config: &TemplateConfig,
    page_number: usize,
    charset: CharacterSet,
    font: Option<&FontVec>,
) -> GrayImage {
    let coords = config.coordinates();
    let mut img = GrayImage::from_pixel(coords.page_width, coords.page_height, BG);

    let chars = charset.page_chars(config.cells_per_page(), page_number);
    for row in 0..config.rows_per_page {
        for col in 0..config.cells_per_row {
            let idx = (row * config.cells_per_row + col) as usize;
            draw_cell(&mut img, &coords, row, col, chars.get(idx).copied(), font);
        }
    }

    for center in coords.markers.as_array() {
        draw_marker(&mut img, center, coords.marker_size);
    }

    img
}

// ── Blank-template cache ─────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    page_size: crate::template::PageSize,
    cells_per_row: u32,
    rows_per_page: u32,
    dpi: u32,
    /// Guide fractions by bit pattern; they parameterize the render.
    guide_bits: [u64; 5],
    page_number: usize,
    charset: CharacterSet,
}

impl CacheKey {
    fn new(config: &TemplateConfig, page_number: usize, charset: CharacterSet) -> Self {
        let g = &config.guides;
        Self {
            page_size: config.page_size,
            cells_per_row: config.cells_per_row,
            rows_per_page: config.rows_per_page,
            dpi: config.dpi,
            guide_bits: [
                g.label_top.to_bits(),
                g.cap_height.to_bits(),
                g.x_height.to_bits(),
                g.baseline.to_bits(),
                g.descender.to_bits(),
            ],
            page_number,
            charset,
        }
    }
}

/// Bounded LRU cache of font-less reference pages.
///
/// The only process-wide mutable state in the crate. Thread-safe; entries
/// are released on [`TemplateCache::clear`] or by LRU eviction.
pub struct TemplateCache {
    entries: Mutex<Vec<(CacheKey, GrayImage)>>,
    capacity: usize,
}

impl TemplateCache {
    /// Create a cache bounded to `capacity` rendered pages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Fetch the reference page, rendering on miss.
    pub fn get_or_render(
        &self,
        config: &TemplateConfig,
        page_number: usize,
        charset: CharacterSet,
    ) -> GrayImage {
        let key = CacheKey::new(config, page_number, charset);
        let mut entries = self.entries.lock().expect("template cache poisoned");
        if let Some(pos) = entries.iter().position(|(k, _)| *k == key) {
            let entry = entries.remove(pos);
            let img = entry.1.clone();
            entries.push(entry);
            return img;
        }
        drop(entries);

        let img = render_blank_page(config, page_number, charset, None);

        let mut entries = self.entries.lock().expect("template cache poisoned");
        if entries.iter().all(|(k, _)| *k != key) {
            if entries.len() >= self.capacity {
                entries.remove(0);
            }
            entries.push((key, img.clone()));
        }
        img
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("template cache poisoned").len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release all cached pages.
    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("template cache poisoned")
            .clear();
    }
}

/// Process-wide reference cache used by the pipeline.
pub fn template_cache() -> &'static TemplateCache {
    static CACHE: OnceLock<TemplateCache> = OnceLock::new();
    CACHE.get_or_init(|| TemplateCache::with_capacity(8))
}
