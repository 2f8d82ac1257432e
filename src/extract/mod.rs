//! Spreadsheet JSON extraction.
//!
//! For every data row (row 1 is the header) and every configured column
//! pair, a non-blank source cell becomes one chat-completion request. The
//! first JSON object in the reply is written to the target cell of the same
//! row. A failed request writes `ERROR: <message>` instead. The workbook is
//! saved once, after every request has finished.

pub mod client;
pub mod json;
pub mod sheet;

pub use json::extract_first_json;

use crate::config::{ColumnPair, ExtractionConfig};
use crate::error::ExtractError;
use crate::output::ExtractionReport;
use crate::pool::WorkerPool;
use crate::prompts::cell_prompt;
use client::{CompletionClient, CompletionRequest, OpenAiClient};
use sheet::{CellGrid, Workbook};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One cell to fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTask {
    pub row: u32,
    pub target_col: u32,
    pub prompt: String,
}

impl CellTask {
    /// Spreadsheet-style name of the target cell, e.g. `C7`.
    pub fn cell_name(&self) -> String {
        format!("{}{}", column_letters(self.target_col), self.row)
    }
}

/// Build one task per non-blank source cell, row by row. The cell text is
/// trimmed before it goes into the prompt.
pub fn collect_tasks<G>(grid: &G, columns: &[ColumnPair], instruction: &str) -> Vec<CellTask>
where
    G: CellGrid + ?Sized,
{
    let mut tasks = Vec::new();
    for row in 2..=grid.max_row() {
        for pair in columns {
            let value = grid.value(row, pair.source);
            let text = value.trim();
            if text.is_empty() {
                continue;
            }
            tasks.push(CellTask {
                row,
                target_col: pair.target,
                prompt: cell_prompt(instruction, text),
            });
        }
    }
    tasks
}

/// Run extraction over any grid, writing results into it as they arrive.
pub async fn fill_cells<G>(
    grid: &mut G,
    client: Arc<dyn CompletionClient>,
    config: &ExtractionConfig,
) -> ExtractionReport
where
    G: CellGrid + ?Sized,
{
    fill_named(grid, client, config, "worksheet").await
}

/// Extract JSON for every source cell of an xlsx workbook and save it in place.
///
/// # Errors
/// Fails before any request is sent when no client can be built (e.g. the
/// API key is missing) or the workbook cannot be read, and after all
/// requests when the workbook cannot be saved. Per-cell failures are
/// written into the cells, never returned.
pub async fn process_workbook(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, ExtractError> {
    let start = Instant::now();
    let path = path.as_ref();
    info!("Extracting from {}", path.display());

    let client = resolve_client(config)?;
    let mut workbook = Workbook::open(path)?;

    let source = path.display().to_string();
    let report = fill_named(workbook.active_sheet_mut(), client, config, &source).await;

    workbook.save()?;
    info!(
        "Saved {}: {} filled, {} empty, {} errors in {}ms",
        path.display(),
        report.filled,
        report.empty,
        report.errors,
        start.elapsed().as_millis()
    );
    Ok(report)
}

/// Pick the completion client: an injected one first, then the environment.
fn resolve_client(config: &ExtractionConfig) -> Result<Arc<dyn CompletionClient>, ExtractError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }
    Ok(Arc::new(OpenAiClient::from_env(config)?))
}

async fn fill_named<G>(
    grid: &mut G,
    client: Arc<dyn CompletionClient>,
    config: &ExtractionConfig,
    source: &str,
) -> ExtractionReport
where
    G: CellGrid + ?Sized,
{
    let tasks = collect_tasks(grid, &config.columns, &config.instruction);
    let total = tasks.len();
    let mut report = ExtractionReport {
        tasks: total,
        ..ExtractionReport::default()
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(source, total);
    }

    let pool = WorkerPool::with_cancellation(config.workers, config.cancellation.clone());
    debug!("Submitting {} cells on {} workers", total, pool.workers());
    let mut batch = pool.batch();
    for task in tasks {
        let key = (task.row, task.target_col);
        let request = CompletionRequest::for_prompt(config, task.prompt);
        let client = Arc::clone(&client);
        batch.spawn(key, async move { client.complete(&request).await });
    }

    while let Some(((row, col), result)) = batch.next_completed().await {
        let cell = format!("{}{}", column_letters(col), row);
        let failure = match result {
            Ok(Ok(text)) => {
                let json = extract_first_json(&text);
                if json.is_empty() {
                    report.empty += 1;
                    debug!("{}: no JSON in response", cell);
                } else {
                    report.filled += 1;
                }
                grid.set_value(row, col, &json);
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_complete(&cell, total);
                }
            }
            Some(message) => {
                warn!("{} failed: {}", cell, message);
                report.errors += 1;
                grid.set_value(row, col, &format!("ERROR: {message}"));
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_error(&cell, total, &message);
                }
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, total - report.errors);
    }
    report
}

/// 1 → `A`, 26 → `Z`, 27 → `AA`.
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_COLUMNS;
    use sheet::MemoryGrid;

    #[test]
    fn test_collect_tasks_skips_header_and_blanks() {
        let grid = MemoryGrid::from_rows(&[
            vec!["id", "text", "json", "memo", "memo_json"],
            vec!["1", "name: Kim", "", "  ", ""],
            vec!["2", "", "", "age: 30", ""],
        ]);
        let tasks = collect_tasks(&grid, &DEFAULT_COLUMNS, "Extract");
        assert_eq!(tasks.len(), 2);
        assert_eq!((tasks[0].row, tasks[0].target_col), (2, 3));
        assert_eq!(tasks[0].prompt, "Extract\n\n원문:\nname: Kim");
        assert_eq!((tasks[1].row, tasks[1].target_col), (3, 5));
    }

    #[test]
    fn test_collect_tasks_trims_source_text() {
        let grid = MemoryGrid::from_rows(&[
            vec!["id", "text"],
            vec!["1", "  name: Kim \n"],
        ]);
        let tasks = collect_tasks(&grid, &DEFAULT_COLUMNS, "Extract");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].prompt, "Extract\n\n원문:\nname: Kim");
    }

    #[test]
    fn test_collect_tasks_header_only() {
        let grid = MemoryGrid::from_rows(&[vec!["id", "text"]]);
        assert!(collect_tasks(&grid, &DEFAULT_COLUMNS, "x").is_empty());
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(3), "C");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_cell_name() {
        let task = CellTask {
            row: 7,
            target_col: 5,
            prompt: String::new(),
        };
        assert_eq!(task.cell_name(), "E7");
    }
}
