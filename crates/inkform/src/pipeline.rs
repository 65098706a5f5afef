//! Page pipeline orchestration.
//!
//! This module defines call order and stage boundaries; algorithmic
//! primitives live in the stage modules. One invocation processes one
//! scanned page: rectify against the template, isolate ink, vectorize each
//! cell, and emit glyph records in row-major cell order.
//!
//! The pipeline owns all its buffers; apart from the blank-template cache
//! there is no shared state, so hosts may run pages in parallel.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::cell::{extract_cell, writing_area, CellFilterConfig};
use crate::charset::CharacterSet;
use crate::diff::{difference_image, threshold_difference, DiffConfig};
use crate::error::PipelineError;
use crate::fiducial::{detect_fiducials, FiducialConfig, FiducialDetection};
use crate::glyph::{glyph_record, stroke_record, GlyphRecord};
use crate::homography::{estimate_homography_dlt, warp_perspective};
use crate::morphology::{clean_mask, MorphologyConfig};
use crate::normalize::{normalize_cell, normalize_strokes, FontMetrics};
use crate::raster::{count_ink, luminance};
use crate::render::template_cache;
use crate::template::TemplateConfig;
use crate::vectorize::monoline::{extract_strokes, MonolineConfig};
use crate::vectorize::{trace_cell, TraceConfig};

/// Which vectorization path produces the glyph outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizeMode {
    /// Filled outline tracing (font output).
    #[default]
    Outline,
    /// Skeleton centerline strokes (plotter/stroke art).
    Monoline,
}

/// Pipeline options with the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Template grid/page/DPI selection.
    pub config: TemplateConfig,
    /// Which character list the page belongs to.
    pub character_set: CharacterSet,
    /// Which slice of the character list this page holds.
    pub page_number: usize,
    /// Differencing binarization cutoff, 0–255.
    pub subtract_threshold: u8,
    /// Morphological closing kernel size; 0 disables.
    pub morphology_close_size: u8,
    /// Morphological opening kernel size; 0 disables.
    pub morphology_open_size: u8,
    /// Per-cell connected-component area floor in pixels.
    pub min_component_area: u32,
    /// Top fraction of the writing area where component centroids are
    /// treated as label residue.
    pub reject_top_fraction: f64,
    /// Fiducial detector gates.
    pub fiducial: FiducialConfig,
    /// Which vectorization path to run.
    pub mode: VectorizeMode,
    /// Outline tracing parameters.
    pub trace: TraceConfig,
    /// Monoline extraction parameters.
    pub monoline: MonolineConfig,
    /// Target font coordinate system.
    pub metrics: FontMetrics,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            config: TemplateConfig::default(),
            character_set: CharacterSet::default(),
            page_number: 0,
            subtract_threshold: 30,
            morphology_close_size: 3,
            morphology_open_size: 2,
            min_component_area: 50,
            reject_top_fraction: 0.15,
            fiducial: FiducialConfig::default(),
            mode: VectorizeMode::default(),
            trace: TraceConfig::default(),
            monoline: MonolineConfig::default(),
            metrics: FontMetrics::default(),
        }
    }
}

/// Per-page cell accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStats {
    /// Cells assigned a character on this page.
    pub cells_total: usize,
    /// Cells with no ink after filtering.
    pub cells_blank: usize,
    /// Cells that produced a glyph record.
    pub cells_vectorized: usize,
}

/// Intermediate images retained for host-side diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DebugImages {
    /// Rectified grayscale scan in template coordinates.
    pub warped: Option<GrayImage>,
    /// Healed absolute difference against the blank reference.
    pub subtracted: Option<GrayImage>,
    /// Binarized difference (ink=255).
    pub thresholded: Option<GrayImage>,
    /// Post-morphology ink mask.
    pub cleaned: Option<GrayImage>,
}

/// Result of one page invocation.
///
/// On failure `error` is set and whatever debug images existed at the point
/// of failure are still populated, so the host can guide the user.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    /// Glyphs in row-major cell order. Blank cells are absent.
    pub glyphs: Vec<GlyphRecord>,
    pub debug: DebugImages,
    /// Fiducial detection outcome, including its binarized scan.
    pub markers: Option<FiducialDetection>,
    /// Cell accounting for the page.
    pub stats: PageStats,
    pub error: Option<PipelineError>,
}

impl ProcessingResult {
    fn failed(
        error: PipelineError,
        debug: DebugImages,
        markers: Option<FiducialDetection>,
    ) -> Self {
        Self {
            success: false,
            glyphs: Vec::new(),
            debug,
            markers,
            stats: PageStats::default(),
            error: Some(error),
        }
    }
}

/// Progress callback: `(stage, percent)`; return `false` to cancel.
pub type ProgressFn<'a> = dyn FnMut(&str, f32) -> bool + 'a;

/// Process one scanned template page with default (no-op) progress.
pub fn process_template_page(scan: &RgbaImage, opts: &ProcessingOptions) -> ProcessingResult {
    process_template_page_with_progress(scan, opts, &mut |_, _| true)
}

/// Process one scanned template page, reporting progress at stage
/// transitions and per cell. Cancellation is cooperative: a `false` return
/// is observed between cells and surfaces as [`PipelineError::Cancelled`].
pub fn process_template_page_with_progress(
    scan: &RgbaImage,
    opts: &ProcessingOptions,
    progress: &mut ProgressFn<'_>,
) -> ProcessingResult {
    let mut debug = DebugImages::default();

    if let Err(err) = opts.config.validate() {
        return ProcessingResult::failed(err, debug, None);
    }
    let coords = opts.config.coordinates();
    if !progress("geometry", 0.0) {
        return ProcessingResult::failed(PipelineError::Cancelled, debug, None);
    }

    let reference = template_cache().get_or_render(&opts.config, opts.page_number, opts.character_set);
    if !progress("render", 8.0) {
        return ProcessingResult::failed(PipelineError::Cancelled, debug, None);
    }

    let gray = luminance(scan);
    let detection = detect_fiducials(&gray, &opts.fiducial);
    if !detection.success {
        let err = PipelineError::FiducialsMissing {
            found: detection.found_mask(),
        };
        return ProcessingResult::failed(err, debug, Some(detection));
    }
    if !progress("fiducials", 20.0) {
        return ProcessingResult::failed(PipelineError::Cancelled, debug, Some(detection));
    }

    let observed = detection.centers().expect("all four markers present");
    let expected = coords.markers.as_array();
    let warped = match estimate_homography_dlt(&observed, &expected)
        .and_then(|h| warp_perspective(&gray, &h, coords.page_width, coords.page_height))
    {
        Ok(w) => w,
        Err(err) => return ProcessingResult::failed(err, debug, Some(detection)),
    };
    debug.warped = Some(warped.clone());
    if !progress("rectify", 35.0) {
        return ProcessingResult::failed(PipelineError::Cancelled, debug, Some(detection));
    }

    let diff_cfg = DiffConfig {
        threshold: opts.subtract_threshold,
        ..DiffConfig::default()
    };
    let subtracted = difference_image(&warped, &reference, &diff_cfg);
    let thresholded = threshold_difference(&subtracted, diff_cfg.threshold);
    debug.subtracted = Some(subtracted);
    debug.thresholded = Some(thresholded.clone());
    if !progress("subtract", 48.0) {
        return ProcessingResult::failed(PipelineError::Cancelled, debug, Some(detection));
    }

    let morph_cfg = MorphologyConfig {
        close_size: opts.morphology_close_size,
        open_size: opts.morphology_open_size,
    };
    let cleaned = match clean_mask(&thresholded, &morph_cfg) {
        Ok(c) => c,
        Err(err) => return ProcessingResult::failed(err, debug, Some(detection)),
    };
    debug.cleaned = Some(cleaned.clone());
    if !progress("morphology", 55.0) {
        return ProcessingResult::failed(PipelineError::Cancelled, debug, Some(detection));
    }

    let filter_cfg = CellFilterConfig {
        min_area: opts.min_component_area,
        reject_top_fraction: opts.reject_top_fraction,
    };
    let chars = opts
        .character_set
        .page_chars(opts.config.cells_per_page(), opts.page_number);
    let n_cells = chars.len().max(1);

    let mut glyphs = Vec::new();
    let mut stats = PageStats {
        cells_total: chars.len(),
        ..Default::default()
    };
    for (idx, &ch) in chars.iter().enumerate() {
        let pct = 55.0 + 45.0 * idx as f32 / n_cells as f32;
        if !progress("cells", pct) {
            return ProcessingResult::failed(PipelineError::Cancelled, debug, Some(detection));
        }
        let row = idx as u32 / opts.config.cells_per_row;
        let col = idx as u32 % opts.config.cells_per_row;
        let region = writing_area(&coords, row, col);
        let cell_mask = extract_cell(&cleaned, &region, &filter_cfg);
        if count_ink(&cell_mask) == 0 {
            tracing::debug!("cell ({}, {}) '{}' is blank; skipped", row, col, ch);
            stats.cells_blank += 1;
            continue;
        }
        let record = match opts.mode {
            VectorizeMode::Outline => trace_cell(&cell_mask, &opts.trace)
                .map(|cell| glyph_record(ch, &normalize_cell(&cell, &region, &opts.metrics))),
            VectorizeMode::Monoline => match extract_strokes(&cell_mask, &opts.monoline) {
                Ok(strokes) => normalize_strokes(&strokes, &region, &opts.metrics)
                    .map(|n| stroke_record(ch, &n)),
                Err(err) => return ProcessingResult::failed(err, debug, Some(detection)),
            },
        };
        match record {
            Some(record) => {
                stats.cells_vectorized += 1;
                glyphs.push(record);
            }
            None => {
                tracing::debug!("cell ({}, {}) '{}' produced no paths; skipped", row, col, ch);
                stats.cells_blank += 1;
            }
        }
    }
    progress("done", 100.0);
    tracing::info!("{} glyphs extracted from {} cells", glyphs.len(), chars.len());

    ProcessingResult {
        success: true,
        glyphs,
        debug,
        markers: Some(detection),
        stats,
        error: None,
    }
}
