pub mod recurrence;

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::{
    errors::Result,
    ledger::{AmountFilter, LedgerClient, LedgerTransaction, TransactionQuery},
};

const MESSAGE_DATE_FORMAT: &str = "%a %-d %b";

/// Allowed deviation from an obligation's expected amount.
///
/// `Exact` flags any deviation at all; the other two carve out a tolerated
/// band around the expected amount. Percentages apply to the absolute value
/// of the expected amount, so sign conventions never widen or flip the band.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Tolerance {
    #[default]
    Exact,
    Absolute(f64),
    Percent(f64),
}

impl Tolerance {
    /// Derives the ledger amount filter: the query asks for deviations, not
    /// matches, so tolerated amounts are excluded.
    pub fn filter(&self, expected: f64) -> AmountFilter {
        let delta = match self {
            Tolerance::Exact => return AmountFilter::NotEqual(expected),
            Tolerance::Percent(pct) => (expected * pct / 100.0).abs(),
            Tolerance::Absolute(value) => value.abs(),
        };
        AmountFilter::Band {
            gt: expected - delta,
            lt: expected + delta,
        }
    }
}

impl FromStr for Tolerance {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Tolerance::Exact);
        }
        if let Some(percent) = trimmed.strip_suffix('%') {
            return percent
                .trim()
                .parse::<f64>()
                .map(Tolerance::Percent)
                .map_err(|_| format!("invalid threshold `{raw}`"));
        }
        trimmed
            .trim_start_matches('$')
            .parse::<f64>()
            .map(Tolerance::Absolute)
            .map_err(|_| format!("invalid threshold `{raw}`"))
    }
}

impl<'de> Deserialize<'de> for Tolerance {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A configured expectation of a recurring or threshold-bound transaction.
/// Loaded fresh from configuration on every run and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct Obligation {
    pub name: String,
    /// Substring used to filter ledger transactions by description.
    #[serde(rename = "match")]
    pub match_pattern: String,
    /// Signed expected amount; negative means outgoing.
    #[serde(default, rename = "expected")]
    pub expected_amount: f64,
    #[serde(default, rename = "threshold")]
    pub tolerance: Tolerance,
    /// Days to search the ledger before the evaluation instant, or before
    /// the projected due date when a recurrence rule is present.
    #[serde(default, rename = "days")]
    pub lookback_days: i64,
    #[serde(default)]
    pub rrule: Option<String>,
}

impl Obligation {
    /// Evaluates the obligation against the ledger at `now`.
    ///
    /// Returns a human-readable alert when amounts deviated or an expected
    /// recurring payment never arrived; `Ok(None)` means all quiet. Ledger
    /// and rule failures propagate so a failed evaluation is never mistaken
    /// for "no anomaly".
    pub fn evaluate(&self, ledger: &dyn LedgerClient, now: DateTime<Utc>) -> Result<Option<String>> {
        let mut window_start = now - Duration::days(self.lookback_days);
        let mut due = None;

        if let Some(rule) = &self.rrule {
            let occurrence = match recurrence::latest_occurrence_on_or_before(rule, now)? {
                Some(occurrence) => occurrence,
                None => {
                    tracing::info!(name = %self.name, "rule has no past occurrence yet");
                    return Ok(None);
                }
            };
            if now - occurrence > Duration::days(self.lookback_days * 2) {
                tracing::info!(name = %self.name, "skipping, occurrence outside evaluation window");
                return Ok(None);
            }
            window_start = occurrence - Duration::days(self.lookback_days);
            due = Some(occurrence);
        }

        let query = TransactionQuery {
            description_like: Some(self.match_pattern.clone()),
            created_gt: window_start.naive_utc(),
            account: None,
            amount: self.tolerance.filter(self.expected_amount),
        };
        let matches = ledger.find(&query)?;

        if !matches.is_empty() {
            return Ok(Some(self.unexpected_amounts_message(&matches)));
        }

        if let Some(occurrence) = due {
            if now > occurrence {
                let days_overdue = (now - occurrence).num_hours() / 24;
                return Ok(Some(format!(
                    "Payment for {} (${:.2}) overdue {} days",
                    self.name,
                    self.expected_amount.abs(),
                    days_overdue
                )));
            }
        }

        Ok(None)
    }

    fn unexpected_amounts_message(&self, matches: &[LedgerTransaction]) -> String {
        let mut message = String::from("Unexpected amounts:");
        for txn in matches {
            message.push_str(&format!(
                "\n{} {} for ${:.2} expecting ${:.2}",
                txn.created.format(MESSAGE_DATE_FORMAT),
                txn.description,
                txn.amount.abs(),
                self.expected_amount.abs()
            ));
        }
        message
    }
}
