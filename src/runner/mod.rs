//! Sequential evaluation driver.
//!
//! Obligations are evaluated one at a time; a failing obligation is logged
//! and the run moves on so one broken check never hides the others. Only
//! configuration load and dedup store setup are fatal, and those happen
//! before this module is reached.

use crate::{
    config::CheckDef,
    ledger::LedgerClient,
    notify::Notifier,
    time::Clock,
};

/// Outcome of one full run, for the closing log line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub evaluated: usize,
    pub failed: usize,
    pub alerts: usize,
    pub delivered: usize,
}

/// Evaluates every configured check against the ledger and dispatches any
/// resulting alerts.
pub fn run_checks(
    checks: &[CheckDef],
    ledger: &dyn LedgerClient,
    notifier: &Notifier<'_>,
    clock: &dyn Clock,
) -> RunReport {
    let now = clock.now();
    let mut report = RunReport::default();

    for check in checks {
        let CheckDef::Amount(obligation) = check;
        report.evaluated += 1;
        tracing::debug!(check = %obligation.name, "evaluating");

        let message = match obligation.evaluate(ledger, now) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => {
                tracing::error!(check = %obligation.name, error = %err, "evaluation failed");
                report.failed += 1;
                continue;
            }
        };

        report.alerts += 1;
        match notifier.send(&message) {
            Ok(count) => report.delivered += count,
            Err(err) => {
                tracing::error!(check = %obligation.name, error = %err, "notification failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        evaluated = report.evaluated,
        alerts = report.alerts,
        delivered = report.delivered,
        failed = report.failed,
        "run complete"
    );
    report
}
