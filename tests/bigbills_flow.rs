use std::sync::Mutex;

use audit_core::bills::sheets::{SheetClient, SheetRange};
use audit_core::bills::{self};
use audit_core::config::{BigBillsSettings, NotifySettings, Secret};
use audit_core::errors::Result;
use audit_core::ledger::{AmountFilter, LedgerClient, LedgerTransaction, TransactionQuery};
use audit_core::notify::{FileStore, GatewayClient, Notifier};
use audit_core::time::FixedClock;
use chrono::{DateTime, FixedOffset, Utc};

struct MockSheet {
    range: SheetRange,
    updates: Mutex<Vec<(String, String)>>,
}

impl SheetClient for MockSheet {
    fn read_range(&self, _spreadsheet_id: &str, _range: &str) -> Result<SheetRange> {
        Ok(self.range.clone())
    }

    fn update_cell(&self, _spreadsheet_id: &str, range: &str, value: &str) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((range.to_string(), value.to_string()));
        Ok(())
    }
}

struct RepaymentLedger {
    repayments: Vec<LedgerTransaction>,
}

impl LedgerClient for RepaymentLedger {
    fn find(&self, query: &TransactionQuery) -> Result<Vec<LedgerTransaction>> {
        let AmountFilter::Exact(wanted) = query.amount else {
            return Ok(Vec::new());
        };
        Ok(self
            .repayments
            .iter()
            .filter(|txn| txn.amount == wanted)
            .cloned()
            .collect())
    }
}

struct RecordingGateway {
    bodies: Mutex<Vec<String>>,
}

impl GatewayClient for RecordingGateway {
    fn deliver(&self, form_body: &str) -> Result<()> {
        self.bodies.lock().unwrap().push(form_body.to_string());
        Ok(())
    }
}

fn settings() -> BigBillsSettings {
    BigBillsSettings {
        spreadsheet_id: "sheet-id".into(),
        spreadsheet_range: "Big Bills!A2:D".into(),
        credentials: Secret::new("token"),
        account_id: "000000".into(),
        transactions: "http://ledger.local/api/transactions".into(),
    }
}

fn notify_settings() -> NotifySettings {
    NotifySettings {
        sid: Secret::new("sid"),
        token: Secret::new("token"),
        mobiles: vec!["+61400000000".into()],
        from: "Budget".into(),
    }
}

fn sheet_with(values: Vec<Vec<&str>>) -> MockSheet {
    MockSheet {
        range: SheetRange {
            range: "Big Bills!A2:D5".into(),
            values: values
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
        },
        updates: Mutex::new(Vec::new()),
    }
}

fn repayment(amount: f64, created: &str) -> LedgerTransaction {
    LedgerTransaction {
        id: 9,
        description: "TRANSFER".into(),
        amount,
        account: 1,
        created: created.parse::<DateTime<FixedOffset>>().unwrap(),
    }
}

#[test]
fn late_bill_is_texted_and_repaid_bill_is_annotated() {
    // Three rows: repaid (gets written back), genuinely late, not yet due.
    let sheet = sheet_with(vec![
        vec!["2000-01-01", "$250.00", "-250.00"],
        vec!["2000-01-02", "$100.00", "-100.00"],
        vec!["2000-02-01", "$999.00", "-999.00"],
    ]);
    let ledger = RepaymentLedger {
        repayments: vec![repayment(-250.0, "2000-01-02T09:00:00+11:00")],
    };
    let gateway = RecordingGateway {
        bodies: Mutex::new(Vec::new()),
    };
    let store_dir = tempfile::TempDir::new().expect("temp dir");
    let store_path = store_dir.path().join("notifications");
    let clock = FixedClock("2000-01-04T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    let settings = settings();
    let notify = notify_settings();

    let mut schedule = bills::hydrate(&sheet, &settings).expect("hydrate");
    assert_eq!(schedule.instances.len(), 3);

    let message = bills::check_late(&mut schedule, &ledger, &sheet, &settings, &clock)
        .expect("check late")
        .expect("late bills present");
    assert_eq!(message, "Need to move BigBills:\n$100.00 from 2 days ago");

    // The repaid row got its paid date written into the trailing column.
    assert_eq!(
        sheet.updates.lock().unwrap().clone(),
        vec![("Big Bills!D2".to_string(), "01/01/2000".to_string())]
    );

    let cache = FileStore::with_clock(&store_path, Box::new(clock)).expect("open store");
    let notifier = Notifier::new(&notify, &gateway, &cache, false);
    assert_eq!(notifier.send(&message).expect("send"), 1);

    // The same message on the next run is suppressed by the dedup store.
    assert_eq!(notifier.send(&message).expect("send again"), 0);
    assert_eq!(gateway.bodies.lock().unwrap().len(), 1);
}

#[test]
fn fully_paid_schedule_stays_silent() {
    let sheet = sheet_with(vec![
        vec!["2000-01-01", "$250.00", "-250.00", "2000-01-01"],
        vec!["2000-01-02", "$100.00", "-100.00", "2000-01-03"],
    ]);
    let ledger = RepaymentLedger {
        repayments: Vec::new(),
    };
    let clock = FixedClock("2000-01-04T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    let settings = settings();

    let mut schedule = bills::hydrate(&sheet, &settings).expect("hydrate");
    let message =
        bills::check_late(&mut schedule, &ledger, &sheet, &settings, &clock).expect("check late");
    assert!(message.is_none());
    assert!(sheet.updates.lock().unwrap().is_empty());
}
