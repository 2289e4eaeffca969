// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sheets v4 REST client implementing [`LedgerStore`].

use super::{CellRange, LedgerStore};
use crate::error::{AppError, Result};
use crate::services::GoogleTokenSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Google Sheets client bound to one sheet of one spreadsheet.
#[derive(Clone)]
pub struct SheetsDb {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    sheet_gid: i64,
    auth: Arc<GoogleTokenSource>,
}

#[derive(Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetResponse {
    properties: SpreadsheetProperties,
}

#[derive(Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

impl SheetsDb {
    /// Create a client for the given spreadsheet and sheet.
    pub fn new(
        spreadsheet_id: &str,
        sheet_name: &str,
        sheet_gid: i64,
        auth: Arc<GoogleTokenSource>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Store(format!("Failed to build Sheets HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            sheet_gid,
            auth,
        })
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the spreadsheet title; used as a startup connectivity check.
    pub async fn check_connection(&self) -> Result<String> {
        let url = format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id);
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", "properties.title")])
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        let body: SpreadsheetResponse = check_response_json(response).await?;
        Ok(body.properties.title)
    }

    fn values_url(&self, range: &CellRange) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(&range.to_a1(&self.sheet_name))
        )
    }

    async fn batch_update(&self, requests: Vec<serde_json::Value>) -> Result<()> {
        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        check_response(response).await
    }
}

#[async_trait]
impl LedgerStore for SheetsDb {
    async fn read_range(&self, range: &CellRange) -> Result<Vec<Vec<String>>> {
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .get(self.values_url(range))
            .bearer_auth(token)
            .query(&[("valueRenderOption", "FORMATTED_VALUE")])
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        let body: ValueRangeResponse = check_response_json(response).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn write_range(&self, range: &CellRange, rows: Vec<Vec<String>>) -> Result<()> {
        let a1 = range.to_a1(&self.sheet_name);
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .put(self.values_url(range))
            .bearer_auth(token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({
                "range": a1,
                "majorDimension": "ROWS",
                "values": rows,
            }))
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        check_response(response).await
    }

    async fn insert_row_at(&self, row: usize) -> Result<()> {
        let start = row.saturating_sub(1);
        self.batch_update(vec![serde_json::json!({
            "insertDimension": {
                "range": {
                    "sheetId": self.sheet_gid,
                    "dimension": "ROWS",
                    "startIndex": start,
                    "endIndex": start + 1,
                },
                // Take styling from the data row below, not the label row above.
                "inheritFromBefore": false,
            }
        })])
        .await
    }

    async fn batch_format(&self, requests: Vec<serde_json::Value>) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        self.batch_update(requests).await
    }
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::from_upstream_status(status, &body, AppError::Store))
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::from_upstream_status(status, &body, AppError::Store));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Store(format!("JSON parse error: {}", e)))
}
