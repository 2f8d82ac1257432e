//! Configuration types for OCR batches and spreadsheet extraction.
//!
//! Every tunable that used to be a module-level constant (mode, DPI, worker
//! count, output folder) lives in [`OcrConfig`] or [`ExtractionConfig`] and
//! is passed in at call time. Both are built through a builder that clamps
//! and validates its inputs.

use crate::error::{ExtractError, OcrError};
use crate::extract::client::CompletionClient;
use crate::pipeline::engine::OcrEngine;
use crate::progress::ProgressCallback;
use crate::prompts::{DEFAULT_INSTRUCTION, DEFAULT_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ── OCR mode ─────────────────────────────────────────────────────────────

/// Which tesseract output to produce for each work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    /// Plain text, written to `<prefix>_string.txt`.
    ImageToString,
    /// Token table with positions and confidences, written to
    /// `<prefix>_data.json` plus a readable `<prefix>_data.txt`. (default)
    #[default]
    ImageToData,
}

impl OcrMode {
    /// The wire name of the mode (`image_to_string` / `image_to_data`).
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrMode::ImageToString => "image_to_string",
            OcrMode::ImageToData => "image_to_data",
        }
    }
}

impl fmt::Display for OcrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrMode {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "image_to_string" => Ok(OcrMode::ImageToString),
            "image_to_data" => Ok(OcrMode::ImageToData),
            other => Err(OcrError::UnsupportedMode {
                mode: other.to_string(),
            }),
        }
    }
}

// ── OCR batch configuration ──────────────────────────────────────────────

/// Configuration for OCR batch processing.
///
/// # Example
/// ```rust
/// use ocr_batch::{OcrConfig, OcrMode};
///
/// let config = OcrConfig::builder()
///     .mode(OcrMode::ImageToString)
///     .dpi(300)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// OCR output mode. Default: [`OcrMode::ImageToData`].
    pub mode: OcrMode,

    /// Rasterisation DPI for PDF pages. Range: 72–1200. Default: 300.
    pub dpi: u32,

    /// Cap on either rendered page dimension in pixels. Default: 10 000.
    ///
    /// A 1200-DPI render of an A4 page is already ~10 000 × 14 000 px; this
    /// keeps a poster-sized page from exhausting memory.
    pub max_rendered_pixels: u32,

    /// Worker pool size. Default: host parallelism, at least 1.
    pub workers: usize,

    /// Parent of the per-run output directories. Default: `test_result`.
    pub output_base: PathBuf,

    /// Tesseract language string, e.g. `eng` or `kor+eng`. Default: `eng`.
    pub language: String,

    /// Tokens with `conf > min_confidence` and non-blank text are listed in
    /// the readable data-mode summary. Default: 0.0.
    pub min_confidence: f32,

    /// Also write `<prefix>_boxes.png` with token bounding boxes (data mode only).
    pub annotate_boxes: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit tesseract binary; skips the candidate search when set.
    pub tesseract_path: Option<PathBuf>,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract_path`.
    pub engine: Option<Arc<dyn OcrEngine>>,

    /// Per-item progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels queued and in-flight items when triggered. Never triggered by
    /// the library itself.
    pub cancellation: CancellationToken,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            mode: OcrMode::default(),
            dpi: 300,
            max_rendered_pixels: 10_000,
            workers: num_cpus::get().max(1),
            output_base: PathBuf::from("test_result"),
            language: "eng".to_string(),
            min_confidence: 0.0,
            annotate_boxes: false,
            password: None,
            tesseract_path: None,
            engine: None,
            progress_callback: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("mode", &self.mode)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("workers", &self.workers)
            .field("output_base", &self.output_base)
            .field("language", &self.language)
            .field("min_confidence", &self.min_confidence)
            .field("annotate_boxes", &self.annotate_boxes)
            .field("tesseract_path", &self.tesseract_path)
            .field("engine", &self.engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn mode(mut self, mode: OcrMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 1200);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn output_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_base = dir.into();
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn min_confidence(mut self, threshold: f32) -> Self {
        self.config.min_confidence = threshold;
        self
    }

    pub fn annotate_boxes(mut self, v: bool) -> Self {
        self.config.annotate_boxes = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = token;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 1200 {
            return Err(OcrError::InvalidConfig(format!(
                "DPI must be 72–1200, got {}",
                c.dpi
            )));
        }
        if c.workers == 0 {
            return Err(OcrError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.language.trim().is_empty() {
            return Err(OcrError::InvalidConfig("Language must not be empty".into()));
        }
        if !(-1.0..=100.0).contains(&c.min_confidence) {
            return Err(OcrError::InvalidConfig(format!(
                "Minimum confidence must be -1–100, got {}",
                c.min_confidence
            )));
        }
        Ok(self.config)
    }
}

// ── Extraction configuration ─────────────────────────────────────────────

/// A source column and the column its extraction result is written to.
///
/// Columns are 1-indexed (`A` = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub source: u32,
    pub target: u32,
}

impl ColumnPair {
    pub const fn new(source: u32, target: u32) -> Self {
        Self { source, target }
    }
}

/// Default column layout: B → C and D → E.
pub const DEFAULT_COLUMNS: [ColumnPair; 2] = [ColumnPair::new(2, 3), ColumnPair::new(4, 5)];

/// Configuration for spreadsheet extraction via a chat-completion API.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier. Default: `gpt-5`.
    pub model: String,

    /// System message sent with every request.
    pub system_prompt: String,

    /// Instruction placed before each cell's text in the user message.
    pub instruction: String,

    /// Sampling temperature. Default: 1.0.
    pub temperature: f32,

    /// Output-token ceiling per request. Default: 2024.
    pub max_completion_tokens: u32,

    /// Reasoning-effort hint. Default: `minimal`.
    pub reasoning_effort: Option<String>,

    /// Worker pool size. Default: max(4, host cores).
    pub workers: usize,

    /// Source/target column pairs. Default: B → C, D → E.
    pub columns: Vec<ColumnPair>,

    /// Environment variable holding the API key. Default: `OPENAI_API_KEY`.
    pub api_key_env: String,

    /// API base URL. Falls back to `OPENAI_BASE_URL`, then the OpenAI endpoint.
    pub base_url: Option<String>,

    /// Per-request timeout. Default: none.
    pub request_timeout_secs: Option<u64>,

    /// Pre-constructed completion client. Takes precedence over the API key.
    pub client: Option<Arc<dyn CompletionClient>>,

    /// Per-cell progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels queued and in-flight requests when triggered.
    pub cancellation: CancellationToken,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            temperature: 1.0,
            max_completion_tokens: 2024,
            reasoning_effort: Some("minimal".to_string()),
            workers: num_cpus::get().max(4),
            columns: DEFAULT_COLUMNS.to_vec(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            request_timeout_secs: None,
            client: None,
            progress_callback: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("workers", &self.workers)
            .field("columns", &self.columns)
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("client", &self.client.as_ref().map(|_| "<dyn CompletionClient>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = instruction.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_completion_tokens(mut self, n: u32) -> Self {
        self.config.max_completion_tokens = n;
        self
    }

    pub fn reasoning_effort(mut self, effort: Option<String>) -> Self {
        self.config.reasoning_effort = effort;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnPair>) -> Self {
        self.config.columns = columns;
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = token;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_completion_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_completion_tokens must be ≥ 1".into(),
            ));
        }
        if c.columns.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "At least one column pair is required".into(),
            ));
        }
        for pair in &c.columns {
            if pair.source == 0 || pair.target == 0 {
                return Err(ExtractError::InvalidConfig(format!(
                    "Columns are 1-indexed, got {} → {}",
                    pair.source, pair.target
                )));
            }
            if pair.source == pair.target {
                return Err(ExtractError::InvalidConfig(format!(
                    "Column {} cannot be both source and target",
                    pair.source
                )));
            }
        }
        let mut targets: Vec<u32> = c.columns.iter().map(|p| p.target).collect();
        targets.sort_unstable();
        targets.dedup();
        if targets.len() != c.columns.len() {
            return Err(ExtractError::InvalidConfig(
                "Each source column needs its own target column".into(),
            ));
        }
        Ok(self.config)
    }
}
