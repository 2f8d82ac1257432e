//! CLI binary for ocr-batch.
//!
//! A thin shim over the library crate: `ocr` maps flags to `OcrConfig` and
//! runs each input file in turn, `extract` maps flags to `ExtractionConfig`
//! and fills a workbook in place.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ocr_batch::{
    process_files, process_workbook, BatchProgressCallback, ColumnPair, ExtractionConfig, OcrConfig,
    OcrMode, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar per batch plus a log line per finished item.
/// Items finish out of order, so lines are printed as they arrive.
struct CliProgressCallback {
    bar: ProgressBar,
    /// "items" for OCR, "cells" for extraction.
    unit: &'static str,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(unit: &'static str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {}  ⏱ {{elapsed_precise}}",
            self.unit
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Processing");
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, source: &str, total: usize) {
        self.errors.store(0, Ordering::SeqCst);
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{source}: {total} {}", self.unit))
        ));
    }

    fn on_item_complete(&self, label: &str, _total: usize) {
        self.bar.println(format!("  {} {}", green("✓"), label));
        self.bar.inc(1);
    }

    fn on_item_error(&self, label: &str, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut short: String = error.chars().take(79).collect();
            short.push('\u{2026}');
            short
        } else {
            error.to_string()
        };

        self.bar
            .println(format!("  {} {}  {}", red("✗"), label, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} {} processed successfully",
                green("✔"),
                bold(&success_count.to_string()),
                self.unit
            );
        } else {
            eprintln!(
                "{} {}/{} {} processed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                self.unit,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a PDF and an image with the default token-table mode
  ocr-batch ocr assets/invoice.pdf assets/car_numberpad.png

  # Plain text, 600 DPI, Korean + English
  ocr-batch ocr --mode image-to-string --dpi 600 --lang kor+eng scan.pdf

  # Draw token boxes, only list tokens above 60% confidence
  ocr-batch ocr --boxes --min-confidence 60 receipt.jpg

  # Fill C from B and E from D in a workbook
  ocr-batch extract result.xlsx

  # Custom columns and model
  ocr-batch extract --columns B:F,D:G --model gpt-5-mini result.xlsx

OUTPUT LAYOUT:
  <output-dir>/<YYMMDD_HHMMSS>_<stem>/
    page_001_data.txt   page_001_data.json   page_001_processed.png   ...

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY      API key for `extract` (also read from .env)
  OPENAI_BASE_URL     OpenAI-compatible endpoint (default https://api.openai.com/v1)
  PDFIUM_LIB_PATH     Path to libpdfium; otherwise ./ and the system library are tried
  RUST_LOG            Override the log filter
"#;

/// Batch OCR for PDFs and images, and JSON extraction for spreadsheets.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-batch",
    version,
    about = "Batch OCR for PDFs and images, and LLM JSON extraction for spreadsheets",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Disable progress bar.
    #[arg(long, global = true, env = "OCR_BATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCR_BATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCR_BATCH_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR PDF and image files with tesseract.
    Ocr(OcrArgs),
    /// Extract JSON from workbook cells with a chat-completion model.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// PDF or image files (.pdf .png .jpg .jpeg .bmp .tiff .tif).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// What to write per page: a token table or plain text.
    #[arg(long, env = "OCR_BATCH_MODE", value_enum, default_value = "image-to-data")]
    mode: ModeArg,

    /// Rasterisation DPI for PDF pages (72–1200).
    #[arg(long, env = "OCR_BATCH_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=1200))]
    dpi: u32,

    /// Concurrent OCR workers. Default: number of CPU cores.
    #[arg(short, long, env = "OCR_BATCH_WORKERS")]
    workers: Option<usize>,

    /// Parent directory for result folders.
    #[arg(short, long, env = "OCR_BATCH_OUTPUT_DIR", default_value = "test_result")]
    output_dir: PathBuf,

    /// Tesseract language(s), e.g. eng or kor+eng.
    #[arg(short, long, env = "OCR_BATCH_LANG", default_value = "eng")]
    lang: String,

    /// List tokens whose confidence is strictly above this value.
    #[arg(long, env = "OCR_BATCH_MIN_CONFIDENCE", default_value_t = 0.0)]
    min_confidence: f32,

    /// Also save <prefix>_boxes.png with token bounding boxes.
    #[arg(long, env = "OCR_BATCH_BOXES")]
    boxes: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCR_BATCH_PASSWORD")]
    password: Option<String>,

    /// Path to the tesseract binary.
    #[arg(long, env = "OCR_BATCH_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Print the batch reports as JSON on stdout.
    #[arg(long, env = "OCR_BATCH_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Workbook to read and update in place (.xlsx).
    workbook: PathBuf,

    /// Chat-completion model ID.
    #[arg(long, env = "OCR_BATCH_MODEL", default_value = "gpt-5")]
    model: String,

    /// Source:target column pairs, e.g. B:C,D:E.
    #[arg(long, env = "OCR_BATCH_COLUMNS", default_value = "B:C,D:E")]
    columns: String,

    /// Instruction placed before each cell's text.
    #[arg(long, env = "OCR_BATCH_INSTRUCTION")]
    instruction: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "OCR_BATCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Concurrent requests. Default: max(4, CPU cores).
    #[arg(short, long, env = "OCR_BATCH_WORKERS")]
    workers: Option<usize>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "OCR_BATCH_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Max output tokens per request.
    #[arg(long, env = "OCR_BATCH_MAX_TOKENS", default_value_t = 2024)]
    max_tokens: u32,

    /// Reasoning effort hint; `none` omits it from the request.
    #[arg(long, env = "OCR_BATCH_REASONING_EFFORT", default_value = "minimal")]
    reasoning_effort: String,

    /// OpenAI-compatible base URL.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds. Default: none.
    #[arg(long, env = "OCR_BATCH_API_TIMEOUT")]
    api_timeout: Option<u64>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    ImageToString,
    ImageToData,
}

impl From<ModeArg> for OcrMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::ImageToString => OcrMode::ImageToString,
            ModeArg::ImageToData => OcrMode::ImageToData,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers user feedback, so library INFO logs are
    // suppressed while it is active.
    let json_out = matches!(cli.command, Command::Ocr(ref a) if a.json);
    let show_progress = !cli.quiet && !cli.no_progress && !json_out;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Ocr(ref args) => run_ocr(args, show_progress, cli.quiet).await,
        Command::Extract(ref args) => run_extract(args, show_progress, cli.quiet).await,
    }
}

async fn run_ocr(args: &OcrArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new("items") as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_ocr_config(args, progress)?;

    let results = process_files(&args.files, &config).await;

    let mut failed_files = 0usize;
    let mut reports = Vec::new();
    for (path, result) in results {
        match result.and_then(|r| r.into_result()) {
            Ok(report) => {
                if !quiet && !args.json {
                    eprintln!(
                        "{}  {}/{} items  {}ms  →  {}",
                        if report.failed == 0 { green("✔") } else { cyan("⚠") },
                        report.succeeded,
                        report.outcomes.len(),
                        report.duration_ms,
                        bold(&report.output_dir.display().to_string()),
                    );
                }
                reports.push(report);
            }
            Err(e) => {
                failed_files += 1;
                eprintln!("{} {}: {}", red("✘"), bold(&path.display().to_string()), e);
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise reports")?;
        println!("{json}");
    }

    if failed_files > 0 {
        bail!("{failed_files} of {} files failed", args.files.len());
    }
    Ok(())
}

async fn run_extract(args: &ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new("cells") as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_extraction_config(args, progress).await?;

    let report = process_workbook(&args.workbook, &config)
        .await
        .context("Extraction failed")?;

    if !quiet {
        eprintln!(
            "{}  {} cells  {} filled  {} empty  {} errors  →  {}",
            if report.errors == 0 { green("✔") } else { cyan("⚠") },
            report.tasks,
            report.filled,
            dim(&report.empty.to_string()),
            if report.errors == 0 {
                report.errors.to_string()
            } else {
                red(&report.errors.to_string())
            },
            bold(&args.workbook.display().to_string()),
        );
    }
    Ok(())
}

/// Map `ocr` args to `OcrConfig`.
fn build_ocr_config(args: &OcrArgs, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .mode(args.mode.into())
        .dpi(args.dpi)
        .output_base(&args.output_dir)
        .language(&args.lang)
        .min_confidence(args.min_confidence)
        .annotate_boxes(args.boxes);

    if let Some(n) = args.workers {
        builder = builder.workers(n);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    if let Some(ref path) = args.tesseract {
        builder = builder.tesseract_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map `extract` args to `ExtractionConfig`.
async fn build_extraction_config(
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let reasoning_effort = match args.reasoning_effort.trim() {
        "" | "none" => None,
        effort => Some(effort.to_string()),
    };

    let mut builder = ExtractionConfig::builder()
        .model(&args.model)
        .columns(parse_columns(&args.columns)?)
        .temperature(args.temperature)
        .max_completion_tokens(args.max_tokens)
        .reasoning_effort(reasoning_effort);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref instruction) = args.instruction {
        builder = builder.instruction(instruction);
    }
    if let Some(n) = args.workers {
        builder = builder.workers(n);
    }
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--columns` (`B:C,D:E`) into column pairs.
fn parse_columns(s: &str) -> Result<Vec<ColumnPair>> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (source, target) = part
                .split_once(':')
                .with_context(|| format!("Invalid column pair '{}': expected SOURCE:TARGET", part.trim()))?;
            Ok(ColumnPair::new(column_index(source)?, column_index(target)?))
        })
        .collect()
}

/// `A` → 1, `Z` → 26, `AA` → 27.
fn column_index(letters: &str) -> Result<u32> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        bail!("Invalid column '{}': expected letters such as B or AA", letters);
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        acc.checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .with_context(|| format!("Column '{}' is out of range", letters))
    })
}
