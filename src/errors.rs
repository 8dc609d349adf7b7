use thiserror::Error;

/// Error type that captures the failure modes of an audit run.
///
/// Gateway failures are split into three variants because the dispatcher
/// reacts differently to each: an auth failure means credentials are broken
/// for every remaining recipient, a bad request carries the gateway's own
/// message, and anything else is opaque.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("{0}")]
    Config(String),
    #[error("rrule invalid")]
    RuleParse(String),
    #[error("ledger query failed: {0}")]
    LedgerQuery(String),
    #[error("authentication failure")]
    GatewayAuth,
    #[error("{0}")]
    GatewayBadRequest(String),
    #[error("gateway responded with failure")]
    Gateway,
    #[error("sheet write failed: {0}")]
    AnnotatorWrite(String),
    #[error("dedup store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
