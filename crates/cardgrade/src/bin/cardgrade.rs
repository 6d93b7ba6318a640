//! cardgrade CLI: grade card photos, inspect rectification and detector output.

use std::fs;
use std::path::{Path, PathBuf};

use cardgrade::vision::{prepare_side, rectify_or_letterbox, run_detectors, PrepareParams};
use cardgrade::{EngineKind, Game, GradeInput, GradeRecord, Grader, GraderConfig, IdentityHints};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "cardgrade")]
#[command(about = "Grade trading-card photos: rectify, check, score and reconcile")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one card from a front photo and an optional back photo.
    Grade(GradeArgs),

    /// Write the canonical card canvas for a photo.
    Rectify {
        #[arg(long)]
        input: PathBuf,
        /// Output image path (format from the extension).
        #[arg(long)]
        out: PathBuf,
        /// Grader config to take rectification parameters from.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the quality report and detector signals for a photo (JSON).
    Checks {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration (JSON).
    Config {
        /// Output path; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct GradeArgs {
    /// Front photo (JPEG, PNG or WebP).
    #[arg(long)]
    front: PathBuf,

    /// Back photo.
    #[arg(long)]
    back: Option<PathBuf>,

    /// Scoring engine: regressor (cv) or llm (ai). Overrides config and env.
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Game hint: pokemon, one_piece or mtg.
    #[arg(long, default_value = "pokemon")]
    game: Game,

    /// Declared set code, trusted over OCR when it validates.
    #[arg(long)]
    set_code: Option<String>,

    /// Declared collector number, e.g. 025/198.
    #[arg(long)]
    number: Option<String>,

    /// Regressor weights (ONNX). Overrides config and env.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Grader config (JSON); defaults plus environment when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip card identity resolution.
    #[arg(long)]
    no_identity: bool,

    /// Emit the persisted record shape instead of the full outcome.
    #[arg(long)]
    record: bool,

    /// Output JSON path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Grade(args) => run_grade(&args),
        Commands::Rectify { input, out, config } => run_rectify(&input, &out, config.as_deref()),
        Commands::Checks { input, config } => run_checks(&input, config.as_deref()),
        Commands::Config { out } => run_config(out.as_deref()),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8) -> CliResult<()> {
    cardgrade::init_tracing(false);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8) -> CliResult<()> {
    cardgrade::core::init_with_level(cardgrade::core::level_from_verbosity(verbose))?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<GraderConfig> {
    let mut config = match path {
        Some(p) => GraderConfig::load_json(p)
            .map_err(|e| -> CliError { format!("failed to load config {}: {e}", p.display()).into() })?,
        None => GraderConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn read_bytes(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|e| -> CliError { format!("failed to read {}: {e}", path.display()).into() })
}

fn open_rgb(path: &Path) -> CliResult<image::RgbImage> {
    let img = image::open(path)
        .map_err(|e| -> CliError { format!("failed to open image {}: {e}", path.display()).into() })?;
    Ok(img.to_rgb8())
}

fn emit(json: &str, out: Option<&Path>) -> CliResult<()> {
    match out {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── grade ──────────────────────────────────────────────────────────────

fn run_grade(args: &GradeArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(kind) = args.engine {
        config.engine.kind = kind;
    }
    if let Some(weights) = &args.weights {
        config.regressor.weights = Some(weights.clone());
    }
    if args.no_identity {
        config.identity.enabled = false;
    }
    let grader = Grader::from_config(config)?;

    let hints = IdentityHints {
        set_code: args.set_code.clone(),
        collector_number: args.number.clone(),
        game: args.game,
    };
    let mut input = GradeInput::new(read_bytes(&args.front)?).with_hints(hints);
    if let Some(back) = &args.back {
        input = input.with_back(read_bytes(back)?);
    }

    let outcome = grader.grade(&input);
    if outcome.needs_better_photos {
        log::warn!("not graded: {}", outcome.photo_feedback);
    } else {
        log::info!("{} ({:.1})", outcome.label, outcome.scores.overall);
    }

    let json = if args.record {
        serde_json::to_string_pretty(&GradeRecord::from_outcome(&outcome, None))?
    } else {
        serde_json::to_string_pretty(&outcome)?
    };
    emit(&json, args.out.as_deref())
}

// ── rectify ────────────────────────────────────────────────────────────

fn run_rectify(input: &Path, out: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let img = open_rgb(input)?;
    let canvas = rectify_or_letterbox(&img, &config.rectify);
    canvas.image.save(out)?;
    let (w, h) = canvas.image.dimensions();
    log::info!(
        "canvas {w}x{h} ({}) written to {}",
        if canvas.is_rectified() { "rectified" } else { "letterbox" },
        out.display()
    );
    Ok(())
}

// ── checks ─────────────────────────────────────────────────────────────

fn run_checks(input: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let params = PrepareParams {
        rectify: config.rectify.clone(),
        color: config.color.clone(),
        quality: config.quality_for(config.engine.kind).clone(),
    };
    let side = prepare_side(open_rgb(input)?, &params);
    let detectors = run_detectors(Some(&side.image), &config.detectors);
    let report = json!({
        "canvas": side.source,
        "quality": side.quality,
        "detectors": detectors,
    });
    emit(&serde_json::to_string_pretty(&report)?, None)
}

// ── config ─────────────────────────────────────────────────────────────

fn run_config(out: Option<&Path>) -> CliResult<()> {
    let config = GraderConfig::default();
    match out {
        Some(path) => {
            config.write_json(path)?;
            log::info!("default config written to {}", path.display());
            Ok(())
        }
        None => emit(&serde_json::to_string_pretty(&config)?, None),
    }
}
