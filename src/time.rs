use chrono::{DateTime, NaiveDate, Utc};

/// Clock abstracts access to the current timestamp so evaluations remain
/// deterministic in tests.
///
/// Everything downstream of this seam works in UTC: evaluation instants,
/// recurrence projections, dedup expiries, and the no-offset `created__gt`
/// bound sent to the ledger are all rendered from UTC instants. A ledger
/// that stores `created` in some local zone needs its own conversion; this
/// crate never consults the host timezone.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current UTC date. Defaults to `now().date_naive()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
