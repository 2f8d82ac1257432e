//! OCR engine interface and the tesseract CLI implementation.
//!
//! Engines are synchronous: the dispatcher already runs every work item on
//! tokio's blocking pool, so an engine may block for as long as recognition
//! takes.

use crate::error::OcrError;
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, instrument};

/// Recognises text in an enhanced grayscale bitmap.
pub trait OcrEngine: Send + Sync {
    /// Plain text, lines separated by `\n`.
    fn image_to_string(&self, image: &GrayImage) -> Result<String, EngineError>;

    /// Per-token table with positions and confidences.
    fn image_to_data(&self, image: &GrayImage) -> Result<TokenTable, EngineError>;
}

/// Why an engine call failed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot run '{binary}': {detail}")]
    Spawn { binary: String, detail: String },

    #[error("tesseract exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("cannot encode image for the engine: {0}")]
    Encode(String),
}

/// One row of tesseract's TSV output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub level: i32,
    pub page_num: i32,
    pub block_num: i32,
    pub par_num: i32,
    pub line_num: i32,
    pub word_num: i32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// 0–100, or −1 for structural rows that hold no text.
    pub conf: f32,
    pub text: String,
}

impl Token {
    /// True when the token clears `min_confidence` (strictly) and has text.
    pub fn is_extracted(&self, min_confidence: f32) -> bool {
        self.conf > min_confidence && !self.text.trim().is_empty()
    }
}

/// The full token table of one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenTable {
    pub tokens: Vec<Token>,
}

impl TokenTable {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens with `conf > min_confidence` and non-blank text, in table order.
    pub fn extracted(&self, min_confidence: f32) -> impl Iterator<Item = &Token> {
        self.tokens
            .iter()
            .filter(move |t| t.is_extracted(min_confidence))
    }

    /// Mean confidence over every row, `-1` sentinels included. 0 when empty.
    pub fn mean_confidence(&self) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.tokens.iter().map(|t| t.conf).sum();
        sum / self.tokens.len() as f32
    }
}

/// What an engine produced for one item.
#[derive(Debug, Clone)]
pub enum OcrPayload {
    Text(String),
    Data(TokenTable),
}

/// Parse tesseract TSV output. The header row and malformed rows are skipped.
pub fn parse_tsv(tsv: &str) -> TokenTable {
    let tokens = tsv
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("level\t"))
        .filter_map(parse_row)
        .collect();
    TokenTable::new(tokens)
}

fn parse_row(line: &str) -> Option<Token> {
    let mut cols = line.splitn(12, '\t');
    let mut int = || cols.next()?.trim().parse::<i32>().ok();
    let level = int()?;
    let page_num = int()?;
    let block_num = int()?;
    let par_num = int()?;
    let line_num = int()?;
    let word_num = int()?;
    let left = int()?;
    let top = int()?;
    let width = int()?;
    let height = int()?;
    let conf = cols.next()?.trim().parse::<f32>().ok()?;
    let text = cols.next().unwrap_or("").trim_end_matches(['\r', '\n']).to_string();
    Some(Token {
        level,
        page_num,
        block_num,
        par_num,
        line_num,
        word_num,
        left,
        top,
        width,
        height,
        conf,
        text,
    })
}

// ── Tesseract CLI engine ─────────────────────────────────────────────────

/// Tesseract invoked as a subprocess per call.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
}

impl TesseractEngine {
    /// Use a known binary without checking it.
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    /// Locate the tesseract binary.
    ///
    /// An explicit path must exist. Otherwise the platform's install
    /// locations are tried, then `PATH`.
    pub fn resolve(explicit: Option<&Path>, language: &str) -> Result<Self, OcrError> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(Self::new(path, language));
            }
            return Err(OcrError::EngineNotFound {
                tried: path.display().to_string(),
            });
        }

        let path_var = std::env::var_os("PATH");
        Self::resolve_in(&candidate_paths(), path_var.as_deref(), language)
    }

    /// Search `candidates` in order, then the directories of `path_var`.
    fn resolve_in(
        candidates: &[PathBuf],
        path_var: Option<&OsStr>,
        language: &str,
    ) -> Result<Self, OcrError> {
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            debug!("Using tesseract at {}", found.display());
            return Ok(Self::new(found, language));
        }
        let cwd = std::env::current_dir().unwrap_or_default();
        if let Ok(found) = which::which_in(BINARY_NAME, path_var, cwd) {
            debug!("Using tesseract from PATH: {}", found.display());
            return Ok(Self::new(found, language));
        }

        let mut tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        tried.push(format!("{} on PATH", BINARY_NAME));
        Err(OcrError::EngineNotFound {
            tried: tried.join(", "),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Write `image` to a temporary PNG and run tesseract on it, returning stdout.
    fn run(&self, image: &GrayImage, tsv: bool) -> Result<String, EngineError> {
        let input = tempfile::Builder::new()
            .prefix("ocr-batch")
            .suffix(".png")
            .tempfile()
            .map_err(|e| EngineError::Io(e.to_string()))?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(input.path()).arg("stdout").arg("-l").arg(&self.language);
        if tsv {
            cmd.arg("tsv");
        }
        let output = cmd.output().map_err(|e| EngineError::Spawn {
            binary: self.binary.display().to_string(),
            detail: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractEngine {
    #[instrument(level = "debug", skip_all, fields(lang = %self.language))]
    fn image_to_string(&self, image: &GrayImage) -> Result<String, EngineError> {
        self.run(image, false)
    }

    #[instrument(level = "debug", skip_all, fields(lang = %self.language))]
    fn image_to_data(&self, image: &GrayImage) -> Result<TokenTable, EngineError> {
        let tsv = self.run(image, true)?;
        Ok(parse_tsv(&tsv))
    }
}

/// Looked up on `PATH`; `which` appends `PATHEXT` suffixes on Windows.
const BINARY_NAME: &str = "tesseract";

/// Fixed install locations for the current platform.
pub fn candidate_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/tesseract"),
            PathBuf::from("/usr/local/bin/tesseract"),
            PathBuf::from("/opt/homebrew/bin/tesseract"),
        ]
    }
}
