//! Google Sheets record sink (Sheets REST API v4).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::RecordSink;
use super::auth::TokenSource;
use crate::error::SinkError;
use crate::survey::model::{COLUMN_HEADERS, Record};

pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com/v4";

/// Title of the sheet created when the document has none.
const DEFAULT_SHEET_TITLE: &str = "Renovation Projects";

/// Last column letter of the record layout (nine columns, A..I).
const LAST_COLUMN: char = 'I';

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Appends records as rows to a Google spreadsheet.
pub struct GoogleSheetsSink {
    spreadsheet_id: String,
    sheet_title: Option<String>,
    api_url: String,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
    /// Resolved sheet title, set once the header row is known to be in place.
    ready: OnceCell<String>,
}

impl GoogleSheetsSink {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_title: Option<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_title,
            api_url: DEFAULT_API_URL.to_string(),
            tokens,
            client: reqwest::Client::new(),
            ready: OnceCell::new(),
        }
    }

    /// Point the sink at a different API root (emulator or test double).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// `spreadsheets/{id}/<segments…>` under the API root.
    fn url(&self, segments: &[&str]) -> Result<Url, SinkError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| SinkError::Http(format!("invalid API URL {}: {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| SinkError::Http(format!("API URL {} cannot be a base", self.api_url)))?
            .pop_if_empty()
            .push("spreadsheets")
            .extend(segments);
        Ok(url)
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<T, SinkError> {
        let token = self.tokens.token().await?;
        let mut req = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    SinkError::AuthFailed(format!("{status}: {body}"))
                }
                _ => SinkError::Api {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        resp.json()
            .await
            .map_err(|e| SinkError::Http(format!("invalid Sheets response: {e}")))
    }

    /// Configured title, else the first sheet, else a freshly added sheet.
    async fn resolve_title(&self) -> Result<String, SinkError> {
        if let Some(ref title) = self.sheet_title {
            return Ok(title.clone());
        }

        let url = self.url(&[self.spreadsheet_id.as_str()])?;
        let meta: SpreadsheetMeta = self
            .request(
                Method::GET,
                url,
                &[("fields", "sheets.properties.title")],
                None,
            )
            .await?;
        if let Some(first) = meta.sheets.into_iter().next() {
            return Ok(first.properties.title);
        }

        tracing::info!(
            spreadsheet_id = %self.spreadsheet_id,
            title = DEFAULT_SHEET_TITLE,
            "Spreadsheet has no sheets, adding one"
        );
        let batch_update = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[batch_update.as_str()])?;
        let _: serde_json::Value = self
            .request(
                Method::POST,
                url,
                &[],
                Some(serde_json::json!({
                    "requests": [{"addSheet": {"properties": {"title": DEFAULT_SHEET_TITLE}}}]
                })),
            )
            .await?;
        Ok(DEFAULT_SHEET_TITLE.to_string())
    }

    /// Write the header row if the sheet's first row is empty.
    async fn ensure_header(&self, title: &str) -> Result<(), SinkError> {
        let range = a1_range(title, "1:1");
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()])?;
        let first_row: ValueRange = self
            .request(
                Method::GET,
                url,
                &[],
                None,
            )
            .await?;

        match first_row.values.into_iter().next() {
            Some(found) if found.iter().any(|cell| !cell.trim().is_empty()) => {
                if header_matches(&found) {
                    Ok(())
                } else {
                    Err(SinkError::HeaderMismatch { found })
                }
            }
            _ => {
                let range = a1_range(title, &format!("A1:{LAST_COLUMN}1"));
                let url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()])?;
                let _: serde_json::Value = self
                    .request(
                        Method::PUT,
                        url,
                        &[("valueInputOption", "RAW")],
                        Some(serde_json::json!({
                            "range": range,
                            "majorDimension": "ROWS",
                            "values": [COLUMN_HEADERS],
                        })),
                    )
                    .await?;
                tracing::info!(sheet = title, "Wrote header row");
                Ok(())
            }
        }
    }

    async fn ready_sheet(&self) -> Result<&str, SinkError> {
        let title = self
            .ready
            .get_or_try_init(|| async {
                let title = self.resolve_title().await?;
                self.ensure_header(&title).await?;
                Ok::<_, SinkError>(title)
            })
            .await?;
        Ok(title.as_str())
    }
}

#[async_trait]
impl RecordSink for GoogleSheetsSink {
    async fn append(&self, record: &Record) -> Result<(), SinkError> {
        let title = self.ready_sheet().await?;
        let range = format!("{}:append", a1_range(title, &format!("A1:{LAST_COLUMN}1")));
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()])?;

        let _: serde_json::Value = self
            .request(
                Method::POST,
                url,
                &[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ],
                Some(serde_json::json!({ "values": [record.to_row()] })),
            )
            .await?;

        tracing::info!(
            sheet = title,
            client = %record.client_name,
            "Appended project row"
        );
        Ok(())
    }
}

/// A1 notation for a range on a named sheet, quoting the name.
fn a1_range(title: &str, cells: &str) -> String {
    format!("'{}'!{cells}", title.replace('\'', "''"))
}

/// Whether a first row matches the expected headers (trailing blanks ignored).
fn header_matches(row: &[String]) -> bool {
    let trimmed: Vec<&str> = row.iter().map(|c| c.trim()).collect();
    let end = trimmed
        .iter()
        .rposition(|c| !c.is_empty())
        .map_or(0, |i| i + 1);
    trimmed[..end] == COLUMN_HEADERS[..]
}
