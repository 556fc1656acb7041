//! bubblegrid CLI: command-line interface for answer sheet scoring.

use clap::{Args, Parser, Subcommand};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use std::path::{Path, PathBuf};

use bubblegrid::{
    detect_column_count, render_debug, segment_columns, ColumnLayout, ColumnSegmentConfig,
    ScanConfig, Scanner, SheetLayout,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const DEFAULT_THRESHOLD: u8 = 150;
const BLUR_SIGMA: f32 = 1.1;

#[derive(Parser)]
#[command(name = "bubblegrid")]
#[command(about = "Score photographed or scanned multiple-choice answer sheets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an answer sheet image.
    Scan(CliScanArgs),

    /// Print the detected column count and column regions.
    Columns {
        /// Path to the input image.
        #[arg(long)]
        image: PathBuf,

        /// Gray level below which a pixel counts as ink.
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u8,
    },

    /// Print the default scan configuration as JSON.
    Config,
}

#[derive(Debug, Clone, Args)]
struct CliScanArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the scan result (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Total number of questions. Required unless --layout is given.
    #[arg(long)]
    questions: Option<usize>,

    /// Choices per question (default 5).
    #[arg(long)]
    alternatives: Option<usize>,

    /// Fixed number of question columns.
    #[arg(long, conflicts_with = "auto_columns")]
    columns: Option<usize>,

    /// Estimate the number of columns from the image.
    #[arg(long)]
    auto_columns: bool,

    /// Fill rate above which a bubble counts as marked (default 0.3).
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Gray level below which a pixel counts as ink (default 150).
    #[arg(long)]
    threshold: Option<u8>,

    /// Nominal bubble radius in pixels.
    #[arg(long)]
    bubble_radius: Option<f32>,

    /// Scan configuration JSON (see `bubblegrid config`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sheet layout JSON (`bubblegrid.sheet.v1`).
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Path to write an annotated PNG.
    #[arg(long)]
    debug_image: Option<PathBuf>,

    /// Path to write the binarized mask as PNG.
    #[arg(long)]
    binary_image: Option<PathBuf>,
}

impl CliScanArgs {
    fn to_layout(&self) -> CliResult<SheetLayout> {
        let mut layout = match (&self.layout, self.questions) {
            (Some(path), _) => SheetLayout::from_json_file(path)?,
            (None, Some(q)) => SheetLayout::new(q),
            (None, None) => return Err("either --questions or --layout is required".into()),
        };
        if let Some(q) = self.questions {
            layout.questions = q;
        }
        if let Some(a) = self.alternatives {
            layout.alternatives = a;
        }
        if let Some(n) = self.columns {
            layout.columns = ColumnLayout::Fixed(n);
        }
        if self.auto_columns {
            layout.columns = ColumnLayout::Auto;
        }
        if let Some(s) = self.sensitivity {
            layout.sensitivity = s;
        }
        if let Some(t) = self.threshold {
            layout.binarize_threshold = t;
        }
        layout.validate()?;
        Ok(layout)
    }

    fn to_config(&self) -> CliResult<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::from_json_file(path)?,
            None => ScanConfig::default(),
        };
        if let Some(r) = self.bubble_radius {
            if !(r.is_finite() && r > 0.0) {
                return Err(format!("--bubble-radius must be positive, got {}", r).into());
            }
            config.set_bubble_radius_hint(r);
        }
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => run_scan(&args),
        Commands::Columns { image, threshold } => run_columns(&image, threshold),
        Commands::Config => run_config(),
    }
}

/// Grayscale, blur, inverse threshold, then a 3x3 opening to drop specks.
fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut bin = imageproc::filter::gaussian_blur_f32(gray, BLUR_SIGMA);
    for p in bin.pixels_mut() {
        *p = if p[0] < threshold { Luma([255]) } else { Luma([0]) };
    }
    imageproc::morphology::open(&bin, Norm::LInf, 1)
}

fn load_image(path: &Path) -> CliResult<image::DynamicImage> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    tracing::info!("Image size: {}x{}", img.width(), img.height());
    Ok(img)
}

// ── config ─────────────────────────────────────────────────────────────

fn run_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&ScanConfig::default())?;
    println!("{}", json);
    Ok(())
}

// ── columns ────────────────────────────────────────────────────────────

fn run_columns(image: &Path, threshold: u8) -> CliResult<()> {
    let img = load_image(image)?;
    let mask = binarize(&img.to_luma8(), threshold);

    let count = detect_column_count(&mask);
    println!("detected columns: {}", count);

    let seg = segment_columns(&mask, count, &ColumnSegmentConfig::default());
    println!("method:           {:?}", seg.method);
    for (i, region) in seg.regions.iter().enumerate() {
        println!(
            "  column {}:       x = [{}, {})  width {}",
            i + 1,
            region.x_start,
            region.x_end,
            region.width()
        );
    }
    Ok(())
}

// ── scan ───────────────────────────────────────────────────────────────

fn run_scan(args: &CliScanArgs) -> CliResult<()> {
    let layout = args.to_layout()?;
    let config = args.to_config()?;

    let img = load_image(&args.image)?;
    let mask = binarize(&img.to_luma8(), layout.binarize_threshold);

    if let Some(path) = &args.binary_image {
        mask.save(path)?;
        tracing::info!("Binary mask written to {}", path.display());
    }

    let questions = layout.questions;
    let scanner = Scanner::with_config(layout, config);
    let output = scanner.scan_with_color(&mask, &img.to_rgb8())?;
    let result = &output.result;

    if result.perspective.corrected {
        tracing::info!(
            "Perspective corrected ({:?}), output {}x{}",
            result.perspective.quad_source,
            result.perspective.output_size[0],
            result.perspective.output_size[1],
        );
    }
    tracing::info!(
        "Answered {}/{} questions ({} suspect) over {} columns",
        result.answered_count(),
        questions,
        result.suspect_count(),
        result.columns.len(),
    );
    for advisory in &result.advisories {
        tracing::warn!("{}", advisory);
    }

    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    if let Some(path) = &args.debug_image {
        match render_debug(&output) {
            Some(canvas) => {
                canvas.save(path)?;
                tracing::info!("Debug image written to {}", path.display());
            }
            None => tracing::warn!("no canvas available, debug image skipped"),
        }
    }

    Ok(())
}
