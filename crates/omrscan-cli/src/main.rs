//! omrscan CLI: read and score bubble answer sheets from the command line.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use omrscan::{
    option_label, AmbiguityPolicy, AnswerKey, Engine, EngineConfig, LayoutConfig, RasterImage,
    MAX_COLUMNS, MAX_OPTIONS, MAX_QUESTIONS, MIN_OPTIONS,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "omrscan")]
#[command(about = "Detect marked bubbles on answer sheets and score them against a key")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a sheet and score it against an answer key.
    Evaluate(CliEvaluateArgs),

    /// Read a sheet without scoring it.
    Detect(CliDetectArgs),

    /// Print the resolved layout and the sheet limits.
    LayoutInfo(CliLayoutArgs),
}

#[derive(Debug, Clone, Args)]
struct CliLayoutArgs {
    /// Layout JSON file (`total_questions`, `options_per_question`, `columns`, ...).
    /// Without it, `--questions`, `--options` and `--columns` are all required.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Total number of questions (overrides the layout file).
    #[arg(long)]
    questions: Option<usize>,

    /// Option bubbles per question (overrides the layout file).
    #[arg(long)]
    options: Option<usize>,

    /// Side-by-side column blocks (overrides the layout file).
    #[arg(long)]
    columns: Option<usize>,

    /// Fill ratio at or above which a bubble counts as marked.
    #[arg(long)]
    fill_threshold: Option<f32>,

    /// Fixed row grouping distance in pixels.
    #[arg(long)]
    row_distance: Option<f32>,
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image (PNG, JPEG, ...).
    #[arg(long)]
    image: PathBuf,

    /// Path to write results (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Engine tuning JSON file; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Include per-bubble detail in the output.
    #[arg(long)]
    debug: bool,

    /// Skip rotation correction.
    #[arg(long)]
    no_deskew: bool,

    #[command(flatten)]
    layout: CliLayoutArgs,
}

#[derive(Debug, Clone, Args)]
struct CliEvaluateArgs {
    /// Answer key JSON file, e.g. `{"1": "A", "2": "C"}`.
    #[arg(long)]
    key: PathBuf,

    /// Scoring of questions with more than one marked bubble.
    #[arg(long, value_enum)]
    ambiguity: Option<CliAmbiguityPolicy>,

    #[command(flatten)]
    detect: CliDetectArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAmbiguityPolicy {
    Separate,
    Wrong,
    Unmarked,
    AcceptBest,
}

impl CliAmbiguityPolicy {
    fn to_core(self) -> AmbiguityPolicy {
        match self {
            Self::Separate => AmbiguityPolicy::Separate,
            Self::Wrong => AmbiguityPolicy::Wrong,
            Self::Unmarked => AmbiguityPolicy::Unmarked,
            Self::AcceptBest => AmbiguityPolicy::AcceptBest,
        }
    }
}

impl CliLayoutArgs {
    fn to_layout(&self) -> CliResult<LayoutConfig> {
        let mut layout = match (&self.layout, self.questions, self.options, self.columns) {
            (Some(path), ..) => LayoutConfig::from_json_file(path)?,
            (None, Some(q), Some(o), Some(c)) => LayoutConfig::new(q, o, c),
            _ => {
                return Err("either --layout or all of --questions, --options and --columns \
                            is required"
                    .into())
            }
        };
        if let Some(v) = self.questions {
            layout.total_questions = v;
        }
        if let Some(v) = self.options {
            layout.options_per_question = v;
        }
        if let Some(v) = self.columns {
            layout.columns = v;
        }
        if let Some(v) = self.fill_threshold {
            layout.fill_threshold = v;
        }
        if let Some(v) = self.row_distance {
            layout = layout.with_row_grouping_distance(v);
        }
        layout.validate()?;
        Ok(layout)
    }
}

impl CliDetectArgs {
    fn to_engine(&self) -> CliResult<Engine> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        if self.no_deskew {
            config.deskew.enabled = false;
        }
        Ok(Engine::with_config(config))
    }

    fn load_image(&self) -> CliResult<RasterImage> {
        tracing::info!("Loading image: {}", self.image.display());
        let bytes = std::fs::read(&self.image).map_err(|e| -> CliError {
            format!("Failed to read image {}: {}", self.image.display(), e).into()
        })?;
        let image = RasterImage::from_bytes(&bytes)?;
        let (w, h) = image.dimensions();
        tracing::info!("Image size: {}x{}", w, h);
        Ok(image)
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
        Commands::Evaluate(args) => run_evaluate(&args),
        Commands::Detect(args) => run_detect(&args),
        Commands::LayoutInfo(args) => run_layout_info(&args),
    }
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── layout-info ───────────────────────────────────────────────────────

fn run_layout_info(args: &CliLayoutArgs) -> CliResult<()> {
    let layout = args.to_layout()?;
    let labels: String = (0..layout.options_per_question)
        .filter_map(option_label)
        .collect();

    println!("omrscan sheet layout");
    println!("  questions:          {}", layout.total_questions);
    println!("  options:            {} ({})", layout.options_per_question, labels);
    println!("  columns:            {}", layout.columns);
    println!("  rows per column:    {}", layout.rows_per_column());
    println!("  expected bubbles:   {}", layout.expected_bubbles());
    println!("  fill threshold:     {:.2}", layout.fill_threshold);
    match layout.row_grouping_distance {
        Some(d) => println!("  row distance:       {d:.1} px"),
        None => println!("  row distance:       derived from bubble radius"),
    }
    println!(
        "  limits:             questions 1..={}, options {}..={}, columns 1..={}",
        MAX_QUESTIONS, MIN_OPTIONS, MAX_OPTIONS, MAX_COLUMNS
    );

    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let layout = args.layout.to_layout()?;
    let engine = args.to_engine()?;
    let image = args.load_image()?;

    let result = engine.detect(&image, &layout, args.debug)?;

    for w in &result.warnings {
        tracing::warn!("{}", w);
    }
    let flagged = result.flagged_questions();
    tracing::info!(
        "Read {} questions, {} without a single clean mark",
        result.answers.len(),
        flagged.len()
    );
    if !flagged.is_empty() {
        tracing::info!("Flagged questions: {:?}", flagged);
    }

    write_json(&result, args.out.as_deref())
}

// ── evaluate ───────────────────────────────────────────────────────────

fn run_evaluate(args: &CliEvaluateArgs) -> CliResult<()> {
    let detect = &args.detect;
    let layout = detect.layout.to_layout()?;
    let key = AnswerKey::from_json_file(&args.key)?;
    key.validate_against(&layout)?;

    let mut engine = detect.to_engine()?;
    if let Some(policy) = args.ambiguity {
        engine.config_mut().ambiguity_policy = policy.to_core();
    }
    let image = detect.load_image()?;

    let result = engine.evaluate(&image, &layout, &key, detect.debug)?;

    for w in &result.warnings {
        tracing::warn!("{}", w);
    }
    tracing::info!(
        "Score {}/{} ({:.2}%): {} correct, {} wrong, {} unmarked, {} ambiguous",
        result.score,
        result.total,
        result.percentage,
        result.correct,
        result.wrong,
        result.unmarked,
        result.ambiguous
    );

    write_json(&result, detect.out.as_deref())
}
