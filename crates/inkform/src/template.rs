//! Template geometry: configuration → page coordinates.
//!
//! Everything downstream (rendering, rectification, cell extraction,
//! normalization) consumes the coordinates derived here. The derivation is a
//! pure function of [`TemplateConfig`]; no stage recomputes geometry on its
//! own.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Page margin, in millimetres, on all four sides of the cell grid.
const MARGIN_MM: f64 = 15.0;
/// Side length of the square corner fiducials, in millimetres.
const MARKER_SIZE_MM: f64 = 6.0;
/// Gap between a fiducial and the content rectangle, in millimetres.
const MARKER_OFFSET_MM: f64 = 2.0;

/// Convert millimetres to pixels at the given resolution.
pub fn mm_to_pixels(mm: f64, dpi: u32) -> u32 {
    (mm * dpi as f64 / 25.4).round() as u32
}

/// Physical page format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// US letter, 215.9 × 279.4 mm.
    #[default]
    Letter,
    /// ISO A4, 210 × 297 mm.
    A4,
}

impl PageSize {
    /// Page dimensions (width, height) in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            Self::Letter => (215.9, 279.4),
            Self::A4 => (210.0, 297.0),
        }
    }
}

/// Guide-line positions within a cell, as fractions of the cell height.
///
/// Hand-tuned to the printed template; overridable because other template
/// generations may shift the bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellGuideFractions {
    /// Bottom of the label band at the top of the cell.
    pub label_top: f64,
    /// Cap-height line.
    pub cap_height: f64,
    /// x-height line.
    pub x_height: f64,
    /// Baseline.
    pub baseline: f64,
    /// Descender line.
    pub descender: f64,
}

impl Default for CellGuideFractions {
    fn default() -> Self {
        Self {
            label_top: 0.18,
            cap_height: 0.25,
            x_height: 0.45,
            baseline: 0.75,
            descender: 0.90,
        }
    }
}

/// Immutable template description selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Physical page format.
    pub page_size: PageSize,
    /// Number of cells per grid row.
    pub cells_per_row: u32,
    /// Number of grid rows per page.
    pub rows_per_page: u32,
    /// Render/scan resolution in dots per inch.
    pub dpi: u32,
    /// Guide-line fractions within a cell.
    pub guides: CellGuideFractions,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::Letter,
            cells_per_row: 8,
            rows_per_page: 10,
            dpi: 150,
            guides: CellGuideFractions::default(),
        }
    }
}

impl TemplateConfig {
    /// Validate dimensions before any processing begins.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.cells_per_row < 1 || self.rows_per_page < 1 {
            return Err(PipelineError::ConfigInvalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.cells_per_row, self.rows_per_page
            )));
        }
        if self.dpi == 0 {
            return Err(PipelineError::ConfigInvalid("dpi must be positive".into()));
        }
        let g = &self.guides;
        let ordered = 0.0 < g.label_top
            && g.label_top < g.cap_height
            && g.cap_height < g.x_height
            && g.x_height < g.baseline
            && g.baseline < g.descender
            && g.descender < 1.0;
        if !ordered {
            return Err(PipelineError::ConfigInvalid(
                "cell guide fractions must be strictly increasing within (0, 1)".into(),
            ));
        }
        Ok(())
    }

    /// Number of cells on one page.
    pub fn cells_per_page(&self) -> usize {
        self.cells_per_row as usize * self.rows_per_page as usize
    }

    /// Derive the full page coordinate set.
    pub fn coordinates(&self) -> TemplateCoordinates {
        let (page_w_mm, page_h_mm) = self.page_size.dimensions_mm();
        let page_width = mm_to_pixels(page_w_mm, self.dpi);
        let page_height = mm_to_pixels(page_h_mm, self.dpi);
        let margin = mm_to_pixels(MARGIN_MM, self.dpi);
        // Odd side length gives the fiducial square an exact center pixel.
        let marker_size = mm_to_pixels(MARKER_SIZE_MM, self.dpi) | 1;
        let marker_offset = mm_to_pixels(MARKER_OFFSET_MM, self.dpi);

        let margins = Margins {
            top: margin,
            bottom: margin,
            left: margin,
            right: margin,
        };

        // Fiducial centers sit just outside the content rectangle, toward the
        // page corners. Centers land on whole pixels so the rasterized
        // template and these coordinates agree exactly.
        let near = (margin as f64 - marker_offset as f64 - marker_size as f64 / 2.0).round();
        let far_x = page_width as f64 - near;
        let far_y = page_height as f64 - near;
        let markers = MarkerCenters {
            tl: [near, near],
            tr: [far_x, near],
            bl: [near, far_y],
            br: [far_x, far_y],
        };

        let content_w = (page_width - margins.left - margins.right) as f64;
        let content_h = (page_height - margins.top - margins.bottom) as f64;
        let cell_width = content_w / self.cells_per_row as f64;
        let cell_height = content_h / self.rows_per_page as f64;
        let grid = GridLayout {
            cells_per_row: self.cells_per_row,
            rows_per_page: self.rows_per_page,
            cell_width,
            cell_height,
            start_x: margins.left as f64,
            start_y: margins.top as f64,
        };

        let g = &self.guides;
        let cell_guides = CellGuides {
            label_top: g.label_top * cell_height,
            cap_height: g.cap_height * cell_height,
            x_height: g.x_height * cell_height,
            baseline: g.baseline * cell_height,
            descender: g.descender * cell_height,
        };

        TemplateCoordinates {
            page_width,
            page_height,
            margins,
            marker_size,
            markers,
            grid,
            cell_guides,
        }
    }
}

/// Page margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// Expected fiducial center positions in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerCenters {
    pub tl: [f64; 2],
    pub tr: [f64; 2],
    pub bl: [f64; 2],
    pub br: [f64; 2],
}

impl MarkerCenters {
    /// Centers in TL, TR, BL, BR order.
    pub fn as_array(&self) -> [[f64; 2]; 4] {
        [self.tl, self.tr, self.bl, self.br]
    }
}

/// Cell grid placement in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub cells_per_row: u32,
    pub rows_per_page: u32,
    /// Cell width in pixels (fractional; cells tile the content rectangle).
    pub cell_width: f64,
    /// Cell height in pixels.
    pub cell_height: f64,
    /// Left edge of column 0.
    pub start_x: f64,
    /// Top edge of row 0.
    pub start_y: f64,
}

impl GridLayout {
    /// Top-left corner of cell (row, col) in page pixels.
    pub fn cell_origin(&self, row: u32, col: u32) -> [f64; 2] {
        [
            self.start_x + col as f64 * self.cell_width,
            self.start_y + row as f64 * self.cell_height,
        ]
    }
}

/// Guide-line y-offsets within a cell, in pixels from the cell top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellGuides {
    pub label_top: f64,
    pub cap_height: f64,
    pub x_height: f64,
    pub baseline: f64,
    pub descender: f64,
}

/// Everything derived from a [`TemplateConfig`]: page, margins, fiducials,
/// grid, per-cell guide lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCoordinates {
    /// Page width in pixels.
    pub page_width: u32,
    /// Page height in pixels.
    pub page_height: u32,
    /// Margins in pixels.
    pub margins: Margins,
    /// Fiducial square side length in pixels.
    pub marker_size: u32,
    /// Fiducial centers.
    pub markers: MarkerCenters,
    /// Cell grid.
    pub grid: GridLayout,
    /// Guide y-offsets within a cell.
    pub cell_guides: CellGuides,
}
