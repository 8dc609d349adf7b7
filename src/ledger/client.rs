use std::time::Duration;

use chrono::NaiveDateTime;

use super::transaction::{ApiEnvelope, LedgerTransaction};
use crate::errors::{AuditError, Result};

const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Exactly one amount-shaped filter is sent per query, never a mix.
#[derive(Debug, Clone, PartialEq)]
pub enum AmountFilter {
    /// Flags amounts outside the open band `(gt, lt)`; the band itself is the
    /// tolerated region and is excluded from results.
    Band { gt: f64, lt: f64 },
    NotEqual(f64),
    Exact(f64),
}

/// Filter predicate for a ledger query.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    pub description_like: Option<String>,
    /// Lower time bound, rendered without an offset. Callers derive this
    /// from UTC instants (see the `Clock` contract), so the ledger is
    /// expected to compare it against UTC `created` values.
    pub created_gt: NaiveDateTime,
    pub account: Option<String>,
    pub amount: AmountFilter,
}

impl TransactionQuery {
    /// Renders the query as wire parameters. Amounts always carry two
    /// decimals; keys are emitted in alphabetical order.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(account) = &self.account {
            params.push(("account".to_string(), account.clone()));
        }
        match &self.amount {
            AmountFilter::Band { gt, lt } => {
                params.push(("amount__gt".to_string(), format!("{gt:.2}")));
                params.push(("amount__lt".to_string(), format!("{lt:.2}")));
            }
            AmountFilter::NotEqual(value) => {
                params.push(("amount__ne".to_string(), format!("{value:.2}")));
            }
            AmountFilter::Exact(value) => {
                params.push(("amount".to_string(), format!("{value:.2}")));
            }
        }
        params.push((
            "created__gt".to_string(),
            self.created_gt.format(CREATED_FORMAT).to_string(),
        ));
        if let Some(pattern) = &self.description_like {
            params.push(("description__like".to_string(), pattern.clone()));
        }
        params
    }
}

/// Read-only view of the external transaction ledger.
pub trait LedgerClient: Send + Sync {
    fn find(&self, query: &TransactionQuery) -> Result<Vec<LedgerTransaction>>;
}

/// Builds the blocking HTTP client shared by all outbound calls. Constructed
/// once at process start and injected.
pub fn default_http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| AuditError::Config(format!("unable to build http client: {err}")))
}

/// Ledger client over the transaction API described by the backend URL.
pub struct HttpLedgerClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpLedgerClient {
    pub fn new(http: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl LedgerClient for HttpLedgerClient {
    fn find(&self, query: &TransactionQuery) -> Result<Vec<LedgerTransaction>> {
        let params = query.params();
        tracing::trace!(?params, "query ledger");
        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .map_err(|err| AuditError::LedgerQuery(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| AuditError::LedgerQuery(err.to_string()))?;
        if status != reqwest::StatusCode::OK {
            tracing::error!(status = %status, "ledger query returned non 200");
            return Err(AuditError::LedgerQuery(body.to_lowercase()));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body)
            .map_err(|_| AuditError::LedgerQuery("failed to parse result".into()))?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at_midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn band_query_renders_two_decimal_bounds() {
        let query = TransactionQuery {
            description_like: Some("Threshold".into()),
            created_gt: at_midnight(2000, 1, 1),
            account: None,
            amount: AmountFilter::Band { gt: 90.0, lt: 110.0 },
        };
        assert_eq!(
            query.params(),
            vec![
                ("amount__gt".to_string(), "90.00".to_string()),
                ("amount__lt".to_string(), "110.00".to_string()),
                ("created__gt".to_string(), "2000-01-01T00:00:00".to_string()),
                ("description__like".to_string(), "Threshold".to_string()),
            ]
        );
    }

    #[test]
    fn exact_repayment_query_carries_account() {
        let query = TransactionQuery {
            description_like: None,
            created_gt: at_midnight(2000, 1, 1),
            account: Some("000000".into()),
            amount: AmountFilter::Exact(-100.0),
        };
        assert_eq!(
            query.params(),
            vec![
                ("account".to_string(), "000000".to_string()),
                ("amount".to_string(), "-100.00".to_string()),
                ("created__gt".to_string(), "2000-01-01T00:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn not_equal_query_for_exact_match_checks() {
        let query = TransactionQuery {
            description_like: Some("Basic".into()),
            created_gt: at_midnight(2000, 1, 1),
            account: None,
            amount: AmountFilter::NotEqual(0.0),
        };
        let params = query.params();
        assert!(params.contains(&("amount__ne".to_string(), "0.00".to_string())));
    }
}
