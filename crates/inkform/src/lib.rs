//! inkform — raster→vector pipeline turning a scanned handwriting template
//! into baseline-aligned glyph outlines in font units.
//!
//! The pipeline stages are:
//!
//! 1. **Template** – pure geometry: config → page/marker/grid coordinates.
//! 2. **Render** – the expected printed page as a reference image (cached).
//! 3. **Fiducial** – locate the four corner registration squares.
//! 4. **Homography** – rectify the scan into template coordinates.
//! 5. **Diff** – subtract the reference, binarize to an ink mask.
//! 6. **Morphology** – close gaps, remove specks.
//! 7. **Cell** – per-cell crop + connected-component filtering.
//! 8. **Vectorize** – contour tracing (outlines/holes) or monoline strokes.
//! 9. **Normalize** – map to font units, baseline at y = 0, fix advance.
//! 10. **Glyph** – emit records with SVG-dialect path strings.
//!
//! # Public API
//! [`process_template_page`] runs the whole page pipeline;
//! [`ProcessingOptions`] tunes it. Stage modules are public so hosts can
//! run individual steps (e.g. render a printable template, or extract
//! monoline strokes for plotter output).

pub mod cell;
pub mod charset;
pub mod diff;
pub mod error;
pub mod fiducial;
pub mod glyph;
pub mod homography;
pub mod morphology;
pub mod normalize;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod template;
pub mod vectorize;

#[cfg(test)]
pub(crate) mod test_utils;

pub use charset::CharacterSet;
pub use error::PipelineError;
pub use fiducial::{FiducialConfig, FiducialDetection, Marker};
pub use glyph::{GlyphBounds, GlyphRecord};
pub use normalize::FontMetrics;
pub use pipeline::{
    process_template_page, process_template_page_with_progress, DebugImages, PageStats,
    ProcessingOptions, ProcessingResult, VectorizeMode,
};
pub use render::{render_blank_page, template_cache, TemplateCache};
pub use template::{PageSize, TemplateConfig, TemplateCoordinates};
pub use vectorize::monoline::{extract_strokes, MonolineConfig, Stroke};
pub use vectorize::{Contour, TraceConfig, VectorCell};
