// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ledger synchronizer: idempotent upserts of activity rows.
//!
//! Sheet layout:
//! - Rows 1-8: title and summary formulas
//! - Row 9: column labels
//! - Row 10+: one row per activity, newest first
//!
//! The scan for an existing row and the insert/overwrite that follows form a
//! read-decide-write sequence against a remote document. Every upsert runs it
//! under one per-document mutex: two concurrent upserts of the same new
//! activity would otherwise both miss the row and both insert, and any insert
//! shifts the positions every other upsert is working with.

use crate::db::{CellRange, LedgerStore};
use crate::error::{AppError, Result};
use crate::models::activity::{COLUMN_LABELS, KEY_COLUMN};
use crate::models::ActivityRecord;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Rows 1-8 hold the summary, row 9 the labels.
pub const SUMMARY_ROWS: usize = 8;
pub const LABEL_ROW: usize = SUMMARY_ROWS + 1;
pub const FIRST_DATA_ROW: usize = LABEL_ROW + 1;

const LAST_COLUMN: usize = COLUMN_LABELS.len() - 1;

/// Spreadsheet locale set on bootstrap. Dates are written `dd/mm/yyyy` and
/// only parse as the intended day under a day-first locale.
pub const LEDGER_LOCALE: &str = "en_GB";

/// Summary block written on bootstrap and re-written after every upsert.
///
/// Inserting rows at the top of the data region makes the spreadsheet shift
/// `B10:B`-style references down, so re-writing the canonical formulas both
/// forces recomputation and restores their anchoring.
const SUMMARY_TEMPLATE: [&[&str]; SUMMARY_ROWS] = [
    &["STRAVA DASHBOARD"],
    &[
        "Last Activity:",
        r#"=IF(COUNTA(B10:B)>0,IF(TODAY()-B10=0,"Today",IF(TODAY()-B10=1,"Yesterday",TEXT(TODAY()-B10,"0")&" days ago")),"No activities yet")"#,
    ],
    &["Week", "", "", "Year"],
    &[
        "Activities:",
        r#"=COUNTIFS(B10:B,">="&TODAY()-WEEKDAY(TODAY(),2)+1)"#,
        "",
        "Activities:",
        r#"=COUNTIFS(B10:B,">="&DATE(YEAR(TODAY()),1,1))"#,
    ],
    &[
        "Distance:",
        r#"=SUMIF(B10:B,">="&TODAY()-WEEKDAY(TODAY(),2)+1,G10:G)"#,
        "",
        "Distance:",
        r#"=SUMIF(B10:B,">="&DATE(YEAR(TODAY()),1,1),G10:G)"#,
    ],
    &[
        "Time:",
        r#"=TEXT(SUMIF(B10:B,">="&TODAY()-WEEKDAY(TODAY(),2)+1,H10:H),"[h]:mm")"#,
        "",
        "Time:",
        r#"=TEXT(SUMIF(B10:B,">="&DATE(YEAR(TODAY()),1,1),H10:H),"[h]:mm")"#,
        "Races:",
        r#"=SUMPRODUCT((B10:B>=DATE(YEAR(TODAY()),1,1))*(ISNUMBER(SEARCH("race",LOWER(D10:D))))*1)"#,
    ],
    &[],
    &[],
];

/// Whether an upsert created or overwrote the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Updated,
}

impl UpsertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertKind::Inserted => "inserted",
            UpsertKind::Updated => "updated",
        }
    }
}

/// Result of an upsert: what happened and where the row now lives (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub kind: UpsertKind,
    pub row: usize,
}

/// Reconciles activity records into the ledger document.
pub struct LedgerSync {
    store: Arc<dyn LedgerStore>,
    /// Guards the scan-decide-mutate sequence.
    write_lock: Mutex<()>,
    /// Set once the header region is known to exist.
    header_ready: OnceCell<()>,
}

impl LedgerSync {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            header_ready: OnceCell::new(),
        }
    }

    /// Insert the record if its activity ID is absent, otherwise overwrite
    /// its row in place.
    pub async fn upsert(&self, record: &ActivityRecord) -> Result<UpsertOutcome> {
        self.ensure_header().await?;

        let outcome = {
            let _guard = self.write_lock.lock().await;
            self.upsert_locked(record).await?
        };

        tracing::info!(
            activity_id = %record.activity_id,
            outcome = outcome.kind.as_str(),
            row = outcome.row,
            "Ledger row written"
        );

        self.touch_summary().await;
        Ok(outcome)
    }

    async fn upsert_locked(&self, record: &ActivityRecord) -> Result<UpsertOutcome> {
        let values = vec![record.to_row()];

        if let Some(row) = self.find_row(&record.activity_id).await? {
            self.store
                .write_range(&CellRange::row(row, 0, LAST_COLUMN), values)
                .await?;
            return Ok(UpsertOutcome {
                kind: UpsertKind::Updated,
                row,
            });
        }

        self.store.insert_row_at(FIRST_DATA_ROW).await?;
        if let Err(e) = self
            .store
            .write_range(&CellRange::row(FIRST_DATA_ROW, 0, LAST_COLUMN), values)
            .await
        {
            tracing::error!(
                activity_id = %record.activity_id,
                row = FIRST_DATA_ROW,
                error = %e,
                "Inserted row left blank after failed write"
            );
            return Err(e);
        }

        Ok(UpsertOutcome {
            kind: UpsertKind::Inserted,
            row: FIRST_DATA_ROW,
        })
    }

    /// Locate the data row holding `activity_id`, if any.
    async fn find_row(&self, activity_id: &str) -> Result<Option<usize>> {
        let keys = self
            .store
            .read_range(&CellRange::open_ended(FIRST_DATA_ROW, KEY_COLUMN, KEY_COLUMN))
            .await?;

        let mut matches = keys
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.first().is_some_and(|key| key.trim() == activity_id))
            .map(|(offset, _)| FIRST_DATA_ROW + offset);

        let found = matches.next();
        let extra = matches.count();
        if extra > 0 {
            tracing::warn!(
                activity_id,
                duplicates = extra,
                "Ledger already holds duplicate rows; updating the topmost"
            );
        }
        Ok(found)
    }

    /// Bootstrap the header region if the label row is blank.
    ///
    /// Runs at most once successfully per process; a failed check is retried
    /// by the next upsert.
    async fn ensure_header(&self) -> Result<()> {
        self.header_ready
            .get_or_try_init(|| async {
                let labels = self
                    .store
                    .read_range(&CellRange::row(LABEL_ROW, 0, LAST_COLUMN))
                    .await?;
                let existing = labels.into_iter().next().unwrap_or_default();

                if existing.iter().all(|cell| cell.trim().is_empty()) {
                    self.write_header().await?;
                } else if existing != COLUMN_LABELS {
                    tracing::warn!(
                        found = ?existing,
                        "Ledger label row differs from expected columns"
                    );
                }
                Ok::<(), AppError>(())
            })
            .await
            .map(|_| ())
    }

    async fn write_header(&self) -> Result<()> {
        let mut rows = summary_rows();
        rows.push(COLUMN_LABELS.iter().map(|l| l.to_string()).collect());

        self.store
            .write_range(&CellRange::rows(1, LABEL_ROW, 0, LAST_COLUMN), rows)
            .await?;
        tracing::info!("Ledger header created");

        if let Err(e) = self.store.batch_format(header_format_requests()).await {
            tracing::warn!(error = %e, "Failed to format ledger header");
        }
        Ok(())
    }

    /// Re-write the summary formulas so derived aggregates recompute.
    /// Failures are logged and otherwise ignored.
    async fn touch_summary(&self) {
        if let Err(e) = self
            .store
            .write_range(&CellRange::rows(1, SUMMARY_ROWS, 0, LAST_COLUMN), summary_rows())
            .await
        {
            tracing::warn!(error = %e, "Failed to refresh ledger summary");
        }
    }
}

/// Summary template padded to the full ledger width.
fn summary_rows() -> Vec<Vec<String>> {
    SUMMARY_TEMPLATE
        .iter()
        .map(|row| {
            (0..COLUMN_LABELS.len())
                .map(|c| row.get(c).copied().unwrap_or_default().to_string())
                .collect()
        })
        .collect()
}

/// Pin a day-first locale, freeze the header region and bold the label row.
fn header_format_requests() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "updateSpreadsheetProperties": {
                "properties": { "locale": LEDGER_LOCALE },
                "fields": "locale"
            }
        }),
        serde_json::json!({
            "updateSheetProperties": {
                "properties": { "gridProperties": { "frozenRowCount": LABEL_ROW } },
                "fields": "gridProperties.frozenRowCount"
            }
        }),
        serde_json::json!({
            "repeatCell": {
                "range": {
                    "startRowIndex": LABEL_ROW - 1,
                    "endRowIndex": LABEL_ROW,
                    "startColumnIndex": 0,
                    "endColumnIndex": COLUMN_LABELS.len()
                },
                "cell": { "userEnteredFormat": { "textFormat": { "bold": true } } },
                "fields": "userEnteredFormat.textFormat.bold"
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_rows_full_width() {
        let rows = summary_rows();
        assert_eq!(rows.len(), SUMMARY_ROWS);
        assert!(rows.iter().all(|r| r.len() == COLUMN_LABELS.len()));
        assert_eq!(rows[0][0], "STRAVA DASHBOARD");
        assert!(rows[5][6].starts_with("=SUMPRODUCT"));
        assert!(rows[7].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_summary_formulas_reference_data_region() {
        let first_data = format!("B{}:B", FIRST_DATA_ROW);
        for row in summary_rows().iter().skip(1).take(5) {
            for cell in row.iter().filter(|c| c.starts_with('=')) {
                assert!(cell.contains(&first_data), "{cell}");
            }
        }
    }

    #[test]
    fn test_bootstrap_pins_day_first_locale() {
        let requests = header_format_requests();
        assert_eq!(
            requests[0]["updateSpreadsheetProperties"]["properties"]["locale"],
            "en_GB"
        );
        assert_eq!(
            requests[1]["updateSheetProperties"]["properties"]["gridProperties"]["frozenRowCount"],
            9
        );
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(LABEL_ROW, 9);
        assert_eq!(FIRST_DATA_ROW, 10);
        assert_eq!(LAST_COLUMN, KEY_COLUMN);
    }
}
