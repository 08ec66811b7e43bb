//! Implements the `Sheet` trait against a Google spreadsheet.
//!
//! Cell values are read and written with the `sheets::Client`. Operations that change the shape of
//! the spreadsheet (adding a tab, deleting a row, sizing columns) and appends go straight to the
//! Sheets REST API, authenticated with the same access token.

use crate::api::{Sheet, SharedTokenProvider};
use crate::error::Res;
use crate::Config;
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::json;
use sheets::types::{
    BatchUpdateValuesRequest, DateTimeRenderOption, Dimension, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Cells are stored exactly as sent. Parsed input would turn `2026-01-21` into a date value that
/// reads back in the sheet's locale, and `007` into the number 7.
const VALUE_INPUT_OPTION: ValueInputOption = ValueInputOption::Raw;

/// Implements the `Sheet` trait using the `sheets:Client` to interact with a Google sheet. Access
/// tokens come from a `SharedTokenProvider`, which refreshes them as needed.
pub(super) struct GoogleSheet {
    config: Config,
    tokens: SharedTokenProvider,
    client: sheets::Client,
    http: reqwest::Client,
}

impl GoogleSheet {
    pub(super) async fn new(config: Config, tokens: SharedTokenProvider) -> Res<Self> {
        let client = create_sheets_client(&tokens).await?;
        Ok(Self {
            config,
            tokens,
            client,
            http: reqwest::Client::new(),
        })
    }

    /// Refreshes the sheets client with a new access token if needed
    async fn refresh_client(&mut self) -> Res<()> {
        self.client = create_sheets_client(&self.tokens).await?;
        Ok(())
    }

    /// POSTs `body` to `{SHEETS_API}/{spreadsheet_id}{suffix}` and returns the response JSON.
    async fn post(&mut self, suffix: &str, body: serde_json::Value) -> Res<serde_json::Value> {
        let url = format!("{SHEETS_API}/{}{suffix}", self.config.spreadsheet_id());
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to the Google Sheets API")?;
        read_json(response, "Google Sheets API").await
    }

    /// Sends a `spreadsheets.batchUpdate` with the given requests.
    async fn batch_update(&mut self, requests: serde_json::Value) -> Res<()> {
        let _ = self
            .post(":batchUpdate", json!({ "requests": requests }))
            .await?;
        Ok(())
    }

    /// Looks up the numeric id of the tab named `sheet_name`, which structural requests need.
    async fn sheet_id(&mut self, sheet_name: &str) -> Res<i64> {
        let properties = self.sheet_properties().await?;
        properties
            .into_iter()
            .find(|p| p.title == sheet_name)
            .map(|p| p.sheet_id)
            .with_context(|| format!("Sheet '{sheet_name}' not found"))
    }

    async fn sheet_properties(&mut self) -> Res<Vec<SheetProperties>> {
        let url = format!(
            "{SHEETS_API}/{}?fields=sheets.properties(sheetId,title)",
            self.config.spreadsheet_id()
        );
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to fetch spreadsheet metadata")?;
        let value = read_json(response, "Google Sheets API").await?;
        let metadata: SpreadsheetMetadata =
            serde_json::from_value(value).context("Unexpected spreadsheet metadata format")?;
        Ok(metadata.sheets.into_iter().map(|s| s.properties).collect())
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn sheet_names(&mut self) -> Res<Vec<String>> {
        trace!("sheet_names");
        Ok(self
            .sheet_properties()
            .await?
            .into_iter()
            .map(|p| p.title)
            .collect())
    }

    async fn add_sheet(&mut self, sheet_name: &str, column_widths: &[u32]) -> Res<()> {
        trace!("add_sheet {sheet_name}");
        let response = self
            .post(
                ":batchUpdate",
                json!({
                    "requests": [{ "addSheet": { "properties": { "title": sheet_name } } }]
                }),
            )
            .await
            .with_context(|| format!("Failed to add sheet '{sheet_name}'"))?;
        let sheet_id = response
            .pointer("/replies/0/addSheet/properties/sheetId")
            .and_then(|v| v.as_i64())
            .context("Google Sheets API response missing the new sheetId")?;

        let requests: Vec<serde_json::Value> = column_widths
            .iter()
            .enumerate()
            .map(|(ix, width)| {
                json!({
                    "updateDimensionProperties": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "COLUMNS",
                            "startIndex": ix,
                            "endIndex": ix + 1
                        },
                        "properties": { "pixelSize": width },
                        "fields": "pixelSize"
                    }
                })
            })
            .collect();
        if !requests.is_empty() {
            self.batch_update(serde_json::Value::Array(requests))
                .await
                .context("Failed to set column widths")?;
        }
        Ok(())
    }

    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>> {
        trace!("get for {sheet_name}");
        self.refresh_client().await?;
        let range = format!("{sheet_name}!A:ZZ"); // Get all columns
        let response = self
            .client
            .spreadsheets()
            .values_get(
                self.config.spreadsheet_id(),
                &range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch {sheet_name} sheet data"))?;
        Ok(response.body.values)
    }

    async fn append_row(&mut self, sheet_name: &str, row: &[String]) -> Res<()> {
        trace!("append_row to {sheet_name}");
        let suffix = append_suffix(sheet_name);
        let _ = self
            .post(&suffix, json!({ "majorDimension": "ROWS", "values": [row] }))
            .await
            .with_context(|| format!("Failed to append a row to {sheet_name}"))?;
        Ok(())
    }

    async fn delete_row(&mut self, sheet_name: &str, row_ix: usize) -> Res<()> {
        trace!("delete_row {row_ix} from {sheet_name}");
        let sheet_id = self.sheet_id(sheet_name).await?;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": row_ix,
                    "endIndex": row_ix + 1
                }
            }
        }]))
        .await
        .with_context(|| format!("Failed to delete row {row_ix} from {sheet_name}"))
    }

    async fn write_cell(
        &mut self,
        sheet_name: &str,
        row_ix: usize,
        col_ix: usize,
        value: &str,
    ) -> Res<()> {
        trace!("write_cell ({row_ix}, {col_ix}) in {sheet_name}");
        self.refresh_client().await?;
        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: a1_cell(sheet_name, row_ix, col_ix),
                values: vec![vec![value.to_string()]],
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(VALUE_INPUT_OPTION),
        };

        self.client
            .spreadsheets()
            .values_batch_update(self.config.spreadsheet_id(), &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write cell ({row_ix}, {col_ix}) in {sheet_name}"))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetMetadata>,
}

#[derive(Debug, Deserialize)]
struct SheetMetadata {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Returns the body of a successful response as JSON, or an error carrying the status and body.
async fn read_json(response: reqwest::Response, api: &str) -> Res<serde_json::Value> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("{api} request failed with status {status}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {api} response"))
}

/// The path and query, relative to the spreadsheet, that appends rows to `sheet_name`.
fn append_suffix(sheet_name: &str) -> String {
    format!(
        "/values/{sheet_name}!A1:append?valueInputOption={VALUE_INPUT_OPTION}&insertDataOption=INSERT_ROWS"
    )
}

/// Zero-based column index to its A1 letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(col_ix: usize) -> String {
    let mut n = col_ix + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// The A1 notation of a single cell, e.g. `Entries!J5` for row index 4, column index 9.
fn a1_cell(sheet_name: &str, row_ix: usize, col_ix: usize) -> String {
    format!("{sheet_name}!{}{}", column_letters(col_ix), row_ix + 1)
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(tokens: &SharedTokenProvider) -> Res<sheets::Client> {
    let access_token = tokens.access_token().await?;

    // The sheets crate wants client credentials and a refresh token as well, but they are only
    // used for its own refresh logic, which we do not use.
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token,
        String::new(),
    ))
}

fn map_client_error(e: sheets::ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
