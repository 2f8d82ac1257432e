//! Cell access for extraction: a small grid trait, an in-memory grid, and
//! the xlsx worksheet adapter.
//!
//! Rows and columns are 1-indexed throughout, as in spreadsheet software.

use crate::error::ExtractError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// Read/write access to one sheet's cells.
pub trait CellGrid {
    /// Highest row that holds data; 0 for an empty sheet.
    fn max_row(&self) -> u32;

    /// Cell text, `""` when empty.
    fn value(&self, row: u32, col: u32) -> String;

    fn set_value(&mut self, row: u32, col: u32, value: &str);
}

impl CellGrid for Worksheet {
    fn max_row(&self) -> u32 {
        self.get_highest_row()
    }

    fn value(&self, row: u32, col: u32) -> String {
        self.get_value((col, row))
    }

    fn set_value(&mut self, row: u32, col: u32, value: &str) {
        self.get_cell_mut((col, row)).set_value(value);
    }
}

/// A sparse in-memory grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryGrid {
    cells: BTreeMap<(u32, u32), String>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid from row-major data; `rows[0][0]` lands in A1.
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        let mut grid = Self::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let value = value.as_ref();
                if !value.is_empty() {
                    grid.set_value(r as u32 + 1, c as u32 + 1, value);
                }
            }
        }
        grid
    }
}

impl CellGrid for MemoryGrid {
    fn max_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    fn value(&self, row: u32, col: u32) -> String {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    fn set_value(&mut self, row: u32, col: u32, value: &str) {
        self.cells.insert((row, col), value.to_string());
    }
}

/// An xlsx workbook opened for in-place editing of its active sheet.
pub struct Workbook {
    path: PathBuf,
    book: Spreadsheet,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| ExtractError::WorkbookRead {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            book,
        })
    }

    pub fn active_sheet_mut(&mut self) -> &mut Worksheet {
        self.book.get_active_sheet_mut()
    }

    /// Write the workbook back to the path it was opened from.
    pub fn save(&self) -> Result<(), ExtractError> {
        umya_spreadsheet::writer::xlsx::write(&self.book, &self.path).map_err(|e| {
            ExtractError::WorkbookWrite {
                path: self.path.clone(),
                detail: e.to_string(),
            }
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
