pub mod cells;
pub mod sheets;

use chrono::{NaiveDate, TimeZone, Utc};

use crate::{
    config::BigBillsSettings,
    errors::Result,
    ledger::{AmountFilter, LedgerClient, TransactionQuery},
    time::Clock,
};

use sheets::SheetClient;

const SHEET_DATE_FORMAT: &str = "%Y-%m-%d";
const PAID_DATE_FORMAT: &str = "%d/%m/%Y";

/// One concrete occurrence of a sheet-backed bill.
///
/// `paid_at` is set exactly when the instance has been confirmed paid,
/// either because the sheet already recorded it or because this run found a
/// matching repayment. `position_index` is the 0-based offset into the
/// source range that produced this instance.
#[derive(Debug, Clone, PartialEq)]
pub struct BillInstance {
    pub due_date: NaiveDate,
    pub expected_amount: f64,
    pub paid_at: Option<NaiveDate>,
    pub position_index: usize,
}

/// Bill instances hydrated from one sheet read, in sheet order.
#[derive(Debug, Clone, Default)]
pub struct BillSchedule {
    pub instances: Vec<BillInstance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LateBill {
    pub due_date: NaiveDate,
    pub amount: f64,
    pub days: i64,
}

/// Reloads the schedule from the spreadsheet. Rows with unparsable dates are
/// logged with their cell address and skipped; an unparsable paid date
/// leaves the instance unpaid so it is re-checked rather than silently
/// trusted.
pub fn hydrate(sheet: &dyn SheetClient, settings: &BigBillsSettings) -> Result<BillSchedule> {
    let loaded = sheet.read_range(&settings.spreadsheet_id, &settings.spreadsheet_range)?;
    let mut schedule = BillSchedule::default();

    if loaded.values.is_empty() {
        tracing::debug!("no data loaded from spreadsheet");
        return Ok(schedule);
    }

    for (index, row) in loaded.values.iter().enumerate() {
        let row_range = || {
            cells::project_row(&loaded.range, index, true).unwrap_or_else(|_| loaded.range.clone())
        };
        let raw_date = row.first().map(String::as_str).unwrap_or_default();
        let due_date = match NaiveDate::parse_from_str(raw_date.trim(), SHEET_DATE_FORMAT) {
            Ok(date) => date,
            Err(err) => {
                tracing::error!(range = %row_range(), error = %err, "unable to parse date");
                continue;
            }
        };
        let expected_amount = row
            .get(1)
            .map(|value| value.trim().trim_start_matches('$').parse().unwrap_or(0.0))
            .unwrap_or(0.0);
        let paid_at = row.get(3).and_then(|value| {
            NaiveDate::parse_from_str(value.trim(), SHEET_DATE_FORMAT)
                .map_err(|err| {
                    tracing::error!(range = %row_range(), error = %err, "unable to parse paid date");
                    err
                })
                .ok()
        });
        schedule.instances.push(BillInstance {
            due_date,
            expected_amount,
            paid_at,
            position_index: index,
        });
    }
    tracing::debug!(rows = loaded.values.len(), "rows loaded from spreadsheet");
    Ok(schedule)
}

/// Walks the schedule for bills that are due, unpaid on the sheet, and have
/// no repayment in the ledger. A found repayment is written back to the
/// sheet once so the instance stops counting as unpaid on subsequent runs.
///
/// Per-bill failures are logged and skipped; one broken row must not hide
/// the others. Returns the alert message when anything is late.
pub fn check_late(
    schedule: &mut BillSchedule,
    ledger: &dyn LedgerClient,
    sheet: &dyn SheetClient,
    settings: &BigBillsSettings,
    clock: &dyn Clock,
) -> Result<Option<String>> {
    let today = clock.today();
    let mut late = Vec::new();

    for bill in schedule.instances.iter_mut() {
        if bill.due_date > today {
            // Rows are in due-date order; everything from here is future.
            break;
        }
        if bill.paid_at.is_some() {
            continue;
        }
        let repaid = match find_repayment(ledger, settings, bill) {
            Ok(found) => found,
            Err(err) => {
                tracing::error!(due = %bill.due_date, error = %err, "unable to determine if bill was paid");
                continue;
            }
        };
        match repaid {
            Some(paid_at) => {
                bill.paid_at = Some(paid_at);
                if let Err(err) = mark_paid(sheet, settings, bill, paid_at) {
                    // The instance stays paid in memory; the sheet needs
                    // manual reconciliation.
                    tracing::error!(due = %bill.due_date, error = %err, "failed to record paid date on sheet");
                }
            }
            None => {
                let days = days_late(bill.due_date, clock);
                late.push(LateBill {
                    due_date: bill.due_date,
                    amount: bill.expected_amount,
                    days,
                });
            }
        }
    }

    if late.is_empty() {
        tracing::debug!("no overdue bills detected");
        return Ok(None);
    }

    tracing::debug!(count = late.len(), "overdue bills detected");
    let mut message = String::from("Need to move BigBills:");
    for bill in &late {
        message.push_str(&format!("\n${:.2} from {} days ago", bill.amount, bill.days));
    }
    Ok(Some(message))
}

/// Looks for the single ledger transaction repaying this bill: same account,
/// exactly the negated amount, created after the due date.
fn find_repayment(
    ledger: &dyn LedgerClient,
    settings: &BigBillsSettings,
    bill: &BillInstance,
) -> Result<Option<NaiveDate>> {
    let query = TransactionQuery {
        description_like: None,
        created_gt: bill.due_date.and_hms_opt(0, 0, 0).unwrap_or_default(),
        account: Some(settings.account_id.clone()),
        amount: AmountFilter::Exact(-bill.expected_amount),
    };
    let matches = ledger.find(&query)?;
    if matches.len() == 1 {
        Ok(Some(matches[0].created.with_timezone(&Utc).date_naive()))
    } else {
        Ok(None)
    }
}

/// Records the paid date against the bill's sheet row.
///
/// Re-writing the same date is harmless, but each call costs an external API
/// request; callers check `paid_at` before invoking so this runs at most
/// once per instance per run.
pub fn mark_paid(
    sheet: &dyn SheetClient,
    settings: &BigBillsSettings,
    instance: &BillInstance,
    paid_at: NaiveDate,
) -> Result<()> {
    let target = cells::project_row(&settings.spreadsheet_range, instance.position_index, false)?;
    let value = paid_at.format(PAID_DATE_FORMAT).to_string();
    tracing::debug!(range = %target, value = %value, "recording paid date");
    sheet.update_cell(&settings.spreadsheet_id, &target, &value)
}

fn days_late(due_date: NaiveDate, clock: &dyn Clock) -> i64 {
    let due = Utc
        .from_utc_datetime(&due_date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let hours = (clock.now() - due).num_hours();
    (hours as f64 / 24.0).round() as i64
}
