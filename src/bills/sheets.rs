use serde::Deserialize;

use crate::errors::{AuditError, Result};

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// One rectangular read from the spreadsheet: the resolved range plus a 2-D
/// array of string cells.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

/// External spreadsheet access, narrowed to what the bills tracker needs.
pub trait SheetClient: Send + Sync {
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<SheetRange>;
    fn update_cell(&self, spreadsheet_id: &str, range: &str, value: &str) -> Result<()>;
}

/// Spreadsheet client over the values REST API. Writes use the
/// user-entered input mode so dates land as dates, not strings.
pub struct HttpSheetClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

impl HttpSheetClient {
    pub fn new(http: reqwest::blocking::Client, token: impl Into<String>) -> Self {
        Self::with_api_base(http, token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        http: reqwest::blocking::Client,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            token: token.into(),
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base, spreadsheet_id, range
        )
    }
}

impl SheetClient for HttpSheetClient {
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<SheetRange> {
        let response = self
            .http
            .get(self.values_url(spreadsheet_id, range))
            .bearer_auth(&self.token)
            .send()
            .map_err(|err| AuditError::LedgerQuery(err.to_string()))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(AuditError::LedgerQuery(format!(
                "sheet read returned {}",
                response.status()
            )));
        }
        response
            .json::<SheetRange>()
            .map_err(|err| AuditError::LedgerQuery(err.to_string()))
    }

    fn update_cell(&self, spreadsheet_id: &str, range: &str, value: &str) -> Result<()> {
        let body = serde_json::json!({ "values": [[value]] });
        let response = self
            .http
            .put(self.values_url(spreadsheet_id, range))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|err| AuditError::AnnotatorWrite(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AuditError::AnnotatorWrite(format!(
                "sheet write returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
