use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// Read-only projection of one ledger entry. The ledger owns these; the
/// auditor never persists copies beyond the current evaluation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub description: String,
    pub amount: f64,
    pub account: i64,
    pub created: DateTime<FixedOffset>,
}

/// Envelope returned by the ledger API. The `data` field may be `null` when
/// nothing matched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub data: Vec<LedgerTransaction>,
}

fn nullable_vec<'de, D>(deserializer: D) -> Result<Vec<LedgerTransaction>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let maybe: Option<Vec<LedgerTransaction>> = Option::deserialize(deserializer)?;
    Ok(maybe.unwrap_or_default())
}
