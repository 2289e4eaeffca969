// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ledger document layer.
//!
//! The ledger lives in a remote spreadsheet. [`LedgerStore`] exposes the few
//! primitives the synchronizer needs; [`SheetsDb`] talks to Google Sheets and
//! [`MemoryLedger`] keeps an in-process grid for tests and local runs.

pub mod memory;
pub mod sheets;

pub use memory::MemoryLedger;
pub use sheets::SheetsDb;

use crate::error::Result;
use async_trait::async_trait;

/// A rectangular block of cells.
///
/// Rows are 1-based like the spreadsheet UI; columns are 0-based (`0` = `A`).
/// `last_row: None` means "to the end of the sheet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_row: usize,
    pub last_row: Option<usize>,
    pub first_col: usize,
    pub last_col: usize,
}

impl CellRange {
    /// Rows `first_row..=last_row`, columns `first_col..=last_col`.
    pub fn rows(first_row: usize, last_row: usize, first_col: usize, last_col: usize) -> Self {
        Self {
            first_row,
            last_row: Some(last_row),
            first_col,
            last_col,
        }
    }

    /// A single row.
    pub fn row(row: usize, first_col: usize, last_col: usize) -> Self {
        Self::rows(row, row, first_col, last_col)
    }

    /// From `first_row` to the end of the sheet.
    pub fn open_ended(first_row: usize, first_col: usize, last_col: usize) -> Self {
        Self {
            first_row,
            last_row: None,
            first_col,
            last_col,
        }
    }

    /// Number of columns spanned.
    pub fn width(&self) -> usize {
        self.last_col + 1 - self.first_col
    }

    /// Render as A1 notation, e.g. `Sheet1!A10:I`.
    pub fn to_a1(&self, sheet: &str) -> String {
        let start = format!("{}{}", column_letter(self.first_col), self.first_row);
        let end = match self.last_row {
            Some(last) => format!("{}{}", column_letter(self.last_col), last),
            None => column_letter(self.last_col),
        };
        format!("{}!{}:{}", quote_sheet_name(sheet), start, end)
    }
}

/// Convert a 0-based column index into letters (`0` → `A`, `26` → `AA`).
pub fn column_letter(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn quote_sheet_name(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

/// Minimal remote-document contract used by the ledger synchronizer.
///
/// Reads follow spreadsheet semantics: trailing empty rows and trailing empty
/// cells within a row are omitted, so callers must tolerate ragged results.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read the displayed values of a block of cells.
    async fn read_range(&self, range: &CellRange) -> Result<Vec<Vec<String>>>;

    /// Overwrite a block of cells (values are parsed as if typed by a user).
    async fn write_range(&self, range: &CellRange, rows: Vec<Vec<String>>) -> Result<()>;

    /// Insert one blank row so that it becomes row `row` (1-based), shifting
    /// everything at or below it down by one.
    async fn insert_row_at(&self, row: usize) -> Result<()>;

    /// Apply formatting requests. Purely cosmetic.
    async fn batch_format(&self, requests: Vec<serde_json::Value>) -> Result<()>;
}
