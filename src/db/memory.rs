// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process ledger document.
//!
//! Mimics the parts of spreadsheet behaviour the synchronizer relies on
//! (ragged reads, row insertion shifting later rows) and can inject latency
//! and failures so concurrency and error paths can be exercised offline.

use super::{CellRange, LedgerStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory spreadsheet grid.
#[derive(Default)]
pub struct MemoryLedger {
    grid: Mutex<Vec<Vec<String>>>,
    latency: Option<Duration>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_writes_before_row: AtomicUsize,
    insert_calls: AtomicUsize,
    format_calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation, widening the window between read and write.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Snapshot of the whole grid.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.grid.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Replace the whole grid.
    pub fn set_rows(&self, rows: Vec<Vec<String>>) {
        if let Ok(mut grid) = self.grid.lock() {
            *grid = rows;
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail writes that start above `row` (0 disables). Lets a test break
    /// the header region while data writes keep working.
    pub fn set_fail_writes_before_row(&self, row: usize) {
        self.fail_writes_before_row.store(row, Ordering::SeqCst);
    }

    /// Number of row insertions performed.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of formatting batches applied.
    pub fn format_calls(&self) -> usize {
        self.format_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<String>>>> {
        self.grid
            .lock()
            .map_err(|_| AppError::Store("memory ledger lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn read_range(&self, range: &CellRange) -> Result<Vec<Vec<String>>> {
        self.simulate_latency().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected read failure".to_string()));
        }

        let grid = self.lock()?;
        let first = range.first_row.saturating_sub(1);
        let last = range.last_row.unwrap_or(grid.len()).min(grid.len());

        let mut out: Vec<Vec<String>> = (first..last)
            .map(|r| {
                let row = &grid[r];
                let mut cells: Vec<String> = (range.first_col..=range.last_col)
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();

        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn write_range(&self, range: &CellRange, rows: Vec<Vec<String>>) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst)
            || range.first_row < self.fail_writes_before_row.load(Ordering::SeqCst)
        {
            return Err(AppError::Store("injected write failure".to_string()));
        }
        if let Some(last) = range.last_row {
            if rows.len() > last + 1 - range.first_row {
                return Err(AppError::Store(format!(
                    "{} rows do not fit in rows {}..={}",
                    rows.len(),
                    range.first_row,
                    last
                )));
            }
        }

        let mut grid = self.lock()?;
        for (offset, values) in rows.into_iter().enumerate() {
            if values.len() > range.width() {
                return Err(AppError::Store(format!(
                    "{} values do not fit in {} columns",
                    values.len(),
                    range.width()
                )));
            }
            let r = range.first_row - 1 + offset;
            if grid.len() <= r {
                grid.resize_with(r + 1, Vec::new);
            }
            let row = &mut grid[r];
            for (i, value) in values.into_iter().enumerate() {
                let c = range.first_col + i;
                if row.len() <= c {
                    row.resize(c + 1, String::new());
                }
                row[c] = value;
            }
        }
        Ok(())
    }

    async fn insert_row_at(&self, row: usize) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected write failure".to_string()));
        }

        let mut grid = self.lock()?;
        let index = row.saturating_sub(1);
        if grid.len() < index {
            grid.resize_with(index, Vec::new);
        }
        grid.insert(index, Vec::new());
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn batch_format(&self, _requests: Vec<serde_json::Value>) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected write failure".to_string()));
        }
        self.format_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_read_trims_trailing_blanks() {
        let ledger = MemoryLedger::new();
        ledger.set_rows(vec![cells(&["a", "", ""]), cells(&["", "", ""]), vec![]]);

        let read = ledger
            .read_range(&CellRange::open_ended(1, 0, 2))
            .await
            .unwrap();

        assert_eq!(read, vec![cells(&["a"])]);
    }

    #[tokio::test]
    async fn test_write_extends_grid() {
        let ledger = MemoryLedger::new();
        ledger
            .write_range(&CellRange::row(3, 1, 2), vec![cells(&["x", "y"])])
            .await
            .unwrap();

        let rows = ledger.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], cells(&["", "x", "y"]));
    }

    #[tokio::test]
    async fn test_write_rejects_overflow() {
        let ledger = MemoryLedger::new();
        let result = ledger
            .write_range(&CellRange::row(1, 0, 0), vec![cells(&["x", "y"])])
            .await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_insert_shifts_rows_down() {
        let ledger = MemoryLedger::new();
        ledger.set_rows(vec![cells(&["h"]), cells(&["old"])]);

        ledger.insert_row_at(2).await.unwrap();

        assert_eq!(ledger.rows(), vec![cells(&["h"]), vec![], cells(&["old"])]);
        assert_eq!(ledger.insert_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let ledger = MemoryLedger::new();
        ledger.set_fail_writes_before_row(10);

        let header = CellRange::row(1, 0, 0);
        let data = CellRange::row(10, 0, 0);
        assert!(ledger.write_range(&header, vec![vec!["x".to_string()]]).await.is_err());
        assert!(ledger.write_range(&data, vec![vec!["x".to_string()]]).await.is_ok());
        assert!(ledger.read_range(&data).await.is_ok());

        ledger.set_fail_reads(true);
        assert!(ledger.read_range(&data).await.is_err());

        ledger.set_fail_writes(true);
        assert!(ledger.insert_row_at(1).await.is_err());
        assert_eq!(ledger.insert_calls(), 0);
    }
}
