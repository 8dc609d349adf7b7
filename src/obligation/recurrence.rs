use chrono::{DateTime, Utc};
use rrule::{RRuleSet, Tz};

use crate::errors::{AuditError, Result};

const MAX_OCCURRENCES: u16 = u16::MAX;

/// Returns the latest occurrence of `rule` that is not after `now`, or
/// `None` when the rule has not started yet.
///
/// Accepts either a full iCalendar block or the inline
/// `FREQ=...;DTSTART=...` form used in configuration files.
pub fn latest_occurrence_on_or_before(rule: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let normalized = normalize(rule)?;
    let set: RRuleSet = normalized.parse().map_err(|err: rrule::RRuleError| {
        tracing::error!(rule, error = %err, "unable to parse rrule");
        AuditError::RuleParse(err.to_string())
    })?;
    let occurrences = set.before(now.with_timezone(&Tz::UTC)).all(MAX_OCCURRENCES);
    if occurrences.limited {
        // The enumeration was cut off, so the last date is not the true
        // latest occurrence.
        tracing::error!(rule, "rule has too many occurrences to project");
        return Err(AuditError::RuleParse(format!(
            "rule `{rule}` has too many occurrences to project"
        )));
    }
    Ok(occurrences
        .dates
        .last()
        .map(|date| date.with_timezone(&Utc)))
}

/// Rewrites an inline `DTSTART=` parameter into the iCalendar block the
/// parser expects. Rules already spanning multiple lines pass through.
fn normalize(rule: &str) -> Result<String> {
    if rule.contains('\n') {
        return Ok(rule.to_string());
    }
    let mut dtstart = None;
    let mut parts = Vec::new();
    for part in rule.split(';') {
        if let Some(value) = part.strip_prefix("DTSTART=") {
            dtstart = Some(value);
        } else if !part.is_empty() {
            parts.push(part);
        }
    }
    match dtstart {
        Some(value) => Ok(format!("DTSTART:{}\nRRULE:{}", value, parts.join(";"))),
        None => Err(AuditError::RuleParse(format!("missing DTSTART in `{rule}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn inline_dtstart_is_normalized() {
        let normalized = normalize("FREQ=WEEKLY;DTSTART=19991228T000000Z").unwrap();
        assert_eq!(normalized, "DTSTART:19991228T000000Z\nRRULE:FREQ=WEEKLY");
    }

    #[test]
    fn weekly_rule_projects_most_recent_past_occurrence() {
        let occurrence =
            latest_occurrence_on_or_before("FREQ=WEEKLY;DTSTART=19991228T000000Z", now())
                .expect("valid rule")
                .expect("has occurrence");
        assert_eq!(occurrence, Utc.with_ymd_and_hms(1999, 12, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn rule_starting_in_the_future_yields_none() {
        let occurrence =
            latest_occurrence_on_or_before("FREQ=WEEKLY;DTSTART=20260101T000000Z", now())
                .expect("valid rule");
        assert!(occurrence.is_none());
    }

    #[test]
    fn malformed_rule_is_a_parse_error() {
        let result = latest_occurrence_on_or_before("xs#$", now());
        assert!(matches!(result, Err(AuditError::RuleParse(_))));
    }

    #[test]
    fn overly_dense_rule_is_rejected_not_misprojected() {
        // A minutely rule a year deep has ~526k occurrences, far past the
        // enumeration cap; trusting the capped result would report a due
        // instant months in the past.
        let result =
            latest_occurrence_on_or_before("FREQ=MINUTELY;DTSTART=19990101T000000Z", now());
        assert!(matches!(result, Err(AuditError::RuleParse(_))));
    }

    #[test]
    fn garbage_after_dtstart_is_a_parse_error() {
        let result = latest_occurrence_on_or_before("FREQ=NOPE;DTSTART=19991228T000000Z", now());
        assert!(matches!(result, Err(AuditError::RuleParse(_))));
    }
}
