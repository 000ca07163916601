//! ecgrid CLI — command-line interface for paper-ECG image analysis.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use ecgrid::{AnalyzeConfig, Analyzer, BeatDetector, Lead, PaperLayout, Sex};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ecgrid")]
#[command(about = "Measure calibrated clinical intervals from scanned paper ECG strips")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full measurement chain on an image.
    Analyze(CliAnalyzeArgs),

    /// Estimate the calibration-grid pitch and skew of an image.
    Grid(CliGridArgs),

    /// Segment an image into named lead regions.
    Segment(CliSegmentArgs),

    /// Estimate the frontal-plane QRS axis.
    Axis(CliCommonArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectorArg {
    Basic,
    PanTompkins,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SexArg {
    Male,
    Female,
}

#[derive(Debug, Clone, Args)]
struct CliCommonArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Analysis configuration file (JSON); missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Paper layout: "3x4", "6x2", or "3x4+rhythm".
    #[arg(long)]
    layout: Option<String>,

    /// Lead used for beat detection (clinical name, e.g. "II", "V2").
    #[arg(long)]
    anchor_lead: Option<String>,

    /// Paper speed in mm/s.
    #[arg(long)]
    paper_speed: Option<f64>,

    /// Grid pitch assumed when detection fails (px/mm).
    #[arg(long)]
    default_px_per_mm: Option<f64>,

    /// Beat-detection strategy.
    #[arg(long, value_enum)]
    detector: Option<DetectorArg>,

    /// Estimate and correct page skew before measuring.
    #[arg(long)]
    deskew: bool,

    /// Rescale the page to the target grid pitch before measuring.
    #[arg(long)]
    normalize: bool,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    #[command(flatten)]
    common: CliCommonArgs,

    /// Patient sex, for the Cornell-product threshold.
    #[arg(long, value_enum, default_value_t = SexArg::Male)]
    sex: SexArg,

    /// Path to write the analysis result (JSON); stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliGridArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Also run the skew search and report the best angle.
    #[arg(long)]
    skew: bool,
}

#[derive(Debug, Clone, Args)]
struct CliSegmentArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Paper layout: "3x4", "6x2", or "3x4+rhythm".
    #[arg(long, default_value = "3x4")]
    layout: String,

    /// Proportional inset applied inside every lead cell.
    #[arg(long, default_value = "0.02")]
    margin: f64,
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
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Grid(args) => run_grid(&args),
        Commands::Segment(args) => run_segment(&args),
        Commands::Axis(args) => run_axis(&args),
    }
}

fn load_gray(path: &PathBuf) -> CliResult<image::GrayImage> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path)
        .map_err(|e| -> CliError { format!("Failed to open image {}: {}", path.display(), e).into() })?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);
    Ok(gray)
}

fn build_config(common: &CliCommonArgs) -> CliResult<AnalyzeConfig> {
    let mut config = match &common.config {
        Some(path) => AnalyzeConfig::from_json_file(path)?,
        None => AnalyzeConfig::default(),
    };
    if let Some(layout) = &common.layout {
        config.layout = layout.parse::<PaperLayout>()?;
    }
    if let Some(lead) = &common.anchor_lead {
        config.anchor_lead = lead.parse::<Lead>()?;
    }
    if let Some(speed) = common.paper_speed {
        config.paper_speed_mm_per_s = speed;
    }
    if let Some(pitch) = common.default_px_per_mm {
        config.default_px_per_mm = pitch;
    }
    if let Some(detector) = common.detector {
        config.detector = match detector {
            DetectorArg::Basic => BeatDetector::Basic(Default::default()),
            DetectorArg::PanTompkins => BeatDetector::PanTompkins(Default::default()),
        };
    }
    config.deskew = config.deskew || common.deskew;
    config.normalize = config.normalize || common.normalize;
    Ok(config)
}

// ── analyze ───────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let gray = load_gray(&args.common.image)?;
    let mut config = build_config(&args.common)?;
    config.sex = match args.sex {
        SexArg::Male => Sex::Male,
        SexArg::Female => Sex::Female,
    };

    let analyzer = Analyzer::with_config(config);
    let result = analyzer.analyze(&gray)?;

    if let Some(anchor) = &result.anchor {
        tracing::info!(
            "Anchor {}: {} beats over {} samples",
            anchor.lead,
            anchor.beats.len(),
            anchor.trace_len,
        );
        if let Some(hr) = &anchor.heart_rate {
            tracing::info!("Heart rate: {:.0} bpm (median)", hr.bpm_median);
        }
    }
    if !result.degraded.is_empty() {
        tracing::warn!("Degraded stages: {:?}", result.degraded);
    }

    let json = serde_json::to_string_pretty(&result)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── grid ──────────────────────────────────────────────────────────────

fn run_grid(args: &CliGridArgs) -> CliResult<()> {
    let gray = load_gray(&args.image)?;
    let calibration = ecgrid::detect_grid(&gray, &ecgrid::GridDetectConfig::default());
    println!("{}", serde_json::to_string_pretty(&calibration)?);

    if args.skew {
        let estimate = ecgrid::estimate_skew(&gray, &ecgrid::DeskewConfig::default());
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    }
    Ok(())
}

// ── segment ───────────────────────────────────────────────────────────

fn run_segment(args: &CliSegmentArgs) -> CliResult<()> {
    let gray = load_gray(&args.image)?;
    let layout = args.layout.parse::<PaperLayout>()?;
    let bbox = ecgrid::find_content_bbox(&gray, 250);
    let regions = ecgrid::segment_layout(&bbox, layout, args.margin);
    tracing::info!("{} regions for layout {}", regions.len(), layout);
    println!("{}", serde_json::to_string_pretty(&regions)?);
    Ok(())
}

// ── axis ──────────────────────────────────────────────────────────────

fn run_axis(args: &CliCommonArgs) -> CliResult<()> {
    let gray = load_gray(&args.image)?;
    let config = build_config(args)?;
    let analyzer = Analyzer::with_config(config);
    let result = analyzer.analyze(&gray)?;

    match &result.axis {
        Some(axis) => {
            tracing::info!("Axis: {:.1} deg", axis.angle_deg);
            println!("{}", serde_json::to_string_pretty(axis)?);
        }
        None => {
            tracing::warn!("no usable frontal amplitudes; axis undetermined");
            println!("null");
        }
    }
    Ok(())
}
