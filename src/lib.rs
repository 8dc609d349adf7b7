#![doc(test(attr(deny(warnings))))]

//! Audit Core provides the recurring-obligation reconciliation and
//! idempotent notification primitives behind the `auditor` and `bigbills`
//! monitoring binaries.

pub mod bills;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod notify;
pub mod obligation;
pub mod runner;
pub mod time;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes the global tracing subscriber with sensible defaults.
pub fn init() {
    init_with_level("info");
}

/// Initializes the global tracing subscriber at the given default verbosity
/// for this crate. `RUST_LOG` still takes precedence; an unrecognized level
/// falls back to `info`.
pub fn init_with_level(level: &str) {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let directive = format!("audit_core={level}")
            .parse()
            .unwrap_or_else(|_| "audit_core=info".parse().expect("static directive"));
        let filter = EnvFilter::from_default_env().add_directive(directive);

        fmt().with_env_filter(filter).init();
    });
}
