pub mod client;
pub mod transaction;

pub use client::{default_http_client, AmountFilter, HttpLedgerClient, LedgerClient, TransactionQuery};
pub use transaction::LedgerTransaction;
