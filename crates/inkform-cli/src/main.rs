//! inkform CLI — render handwriting templates and process scanned pages.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use inkform::{CharacterSet, PageSize, ProcessingOptions, TemplateConfig};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "inkform")]
#[command(about = "Turn scanned handwriting templates into vector font glyphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Page format (letter or a4).
    #[arg(long, global = true, default_value = "letter")]
    page_size: String,

    /// Cells per grid row.
    #[arg(long, global = true, default_value = "8")]
    cells_per_row: u32,

    /// Grid rows per page.
    #[arg(long, global = true, default_value = "10")]
    rows_per_page: u32,

    /// Template resolution in DPI.
    #[arg(long, global = true, default_value = "150")]
    dpi: u32,

    /// Character set (required or all).
    #[arg(long, global = true, default_value = "required")]
    character_set: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a blank template page to a PNG.
    Render {
        /// Which template page to render.
        #[arg(long, default_value = "0")]
        page: usize,

        /// Output PNG path.
        #[arg(long)]
        out: PathBuf,

        /// TTF/OTF font for labels and guide glyphs.
        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// Process a scanned page into glyph records (JSON).
    Process {
        /// Path to the scanned page image.
        #[arg(long)]
        image: PathBuf,

        /// Path to write glyph records (JSON).
        #[arg(long)]
        out: PathBuf,

        /// Which slice of the character list the page holds.
        #[arg(long, default_value = "0")]
        page: usize,

        /// Subtraction binarization threshold (0–255).
        #[arg(long, default_value = "30")]
        threshold: u8,

        /// Morphological closing kernel size (0 disables).
        #[arg(long, default_value = "3")]
        close: u8,

        /// Morphological opening kernel size (0 disables).
        #[arg(long, default_value = "2")]
        open: u8,

        /// Per-cell component area floor in pixels.
        #[arg(long, default_value = "50")]
        min_area: u32,

        /// Emit centerline strokes instead of filled outlines.
        #[arg(long)]
        monoline: bool,

        /// Directory for the intermediate debug images (PNG).
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },

    /// Extract centerline strokes from an ink image (plotter output).
    Monoline {
        /// Path to the ink image (dark strokes on light background).
        #[arg(long)]
        image: PathBuf,

        /// Path to write strokes (JSON).
        #[arg(long)]
        out: PathBuf,

        /// Endpoint weld radius in pixels.
        #[arg(long, default_value = "2.5")]
        weld_radius: f64,
    },

    /// Print derived template coordinates as JSON.
    PageInfo,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = parse_config(&cli)?;
    let charset = parse_charset(&cli.character_set)?;

    match cli.command {
        Commands::Render { page, ref out, ref font } => run_render(&config, charset, page, out, font.as_deref()),
        Commands::Process {
            ref image,
            ref out,
            page,
            threshold,
            close,
            open,
            min_area,
            monoline,
            ref debug_dir,
        } => run_process(
            &config,
            charset,
            image,
            out,
            page,
            threshold,
            close,
            open,
            min_area,
            monoline,
            debug_dir.as_deref(),
        ),
        Commands::Monoline {
            ref image,
            ref out,
            weld_radius,
        } => run_monoline(image, out, weld_radius),
        Commands::PageInfo => run_page_info(&config),
    }
}

fn run_monoline(image_path: &Path, out: &Path, weld_radius: f64) -> CliResult<()> {
    let gray = image::open(image_path)?.to_luma8();
    let mask = inkform::raster::binarize_ink(&gray);
    let config = inkform::MonolineConfig {
        weld_radius,
        ..Default::default()
    };
    let strokes = inkform::extract_strokes(&mask, &config)?;
    let json = serde_json::to_string_pretty(&strokes)?;
    fs::write(out, json)?;
    tracing::info!("{} strokes written to {}", strokes.len(), out.display());
    Ok(())
}

fn parse_config(cli: &Cli) -> CliResult<TemplateConfig> {
    let page_size = match cli.page_size.as_str() {
        "letter" => PageSize::Letter,
        "a4" => PageSize::A4,
        other => return Err(format!("unknown page size: {}", other).into()),
    };
    let config = TemplateConfig {
        page_size,
        cells_per_row: cli.cells_per_row,
        rows_per_page: cli.rows_per_page,
        dpi: cli.dpi,
        ..Default::default()
    };
    config.validate()?;
    Ok(config)
}

fn parse_charset(value: &str) -> CliResult<CharacterSet> {
    match value {
        "required" => Ok(CharacterSet::Required),
        "all" => Ok(CharacterSet::All),
        other => Err(format!("unknown character set: {}", other).into()),
    }
}

fn run_render(
    config: &TemplateConfig,
    charset: CharacterSet,
    page: usize,
    out: &Path,
    font_path: Option<&Path>,
) -> CliResult<()> {
    let font = match font_path {
        Some(path) => {
            let data = fs::read(path)?;
            Some(ab_glyph::FontVec::try_from_vec(data)?)
        }
        None => None,
    };
    let image = inkform::render_blank_page(config, page, charset, font.as_ref());
    image.save(out)?;
    tracing::info!("template page {} written to {}", page, out.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_process(
    config: &TemplateConfig,
    charset: CharacterSet,
    image_path: &Path,
    out: &Path,
    page: usize,
    threshold: u8,
    close: u8,
    open: u8,
    min_area: u32,
    monoline: bool,
    debug_dir: Option<&Path>,
) -> CliResult<()> {
    let scan = image::open(image_path)?.to_rgba8();
    let opts = ProcessingOptions {
        config: *config,
        character_set: charset,
        page_number: page,
        subtract_threshold: threshold,
        morphology_close_size: close,
        morphology_open_size: open,
        min_component_area: min_area,
        mode: if monoline {
            inkform::VectorizeMode::Monoline
        } else {
            inkform::VectorizeMode::Outline
        },
        ..Default::default()
    };

    let result = inkform::process_template_page(&scan, &opts);

    if let Some(dir) = debug_dir {
        fs::create_dir_all(dir)?;
        let dumps: [(&str, Option<&image::GrayImage>); 4] = [
            ("warped", result.debug.warped.as_ref()),
            ("subtracted", result.debug.subtracted.as_ref()),
            ("thresholded", result.debug.thresholded.as_ref()),
            ("cleaned", result.debug.cleaned.as_ref()),
        ];
        for (name, img) in dumps {
            if let Some(img) = img {
                img.save(dir.join(format!("{}.png", name)))?;
            }
        }
        if let Some(markers) = &result.markers {
            markers.binarized.save(dir.join("binarized.png"))?;
        }
    }

    if !result.success {
        let err = result
            .error
            .expect("failed result carries an error");
        return Err(format!("processing failed: {}", err).into());
    }

    let json = serde_json::to_string_pretty(&result.glyphs)?;
    fs::write(out, json)?;
    tracing::info!(
        "{} glyphs written to {}",
        result.glyphs.len(),
        out.display()
    );
    Ok(())
}

fn run_page_info(config: &TemplateConfig) -> CliResult<()> {
    let coords = config.coordinates();
    println!("{}", serde_json::to_string_pretty(&coords)?);
    Ok(())
}
