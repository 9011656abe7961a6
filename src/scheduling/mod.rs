//! Temporal business rules: recurrence-window validation and expansion of
//! weekday rules into concrete occurrence dates.

pub mod duration;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

pub use duration::{end_of, parse_iso8601};

/// One "every <weekday> at <time> for <duration>" rule.
///
/// Insertion order across rules is presentation order and is preserved all
/// the way into the expanded occurrence list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOfWeekRule {
    pub weekday: Weekday,
    /// The weekday as the user said it, kept for confirmation speech.
    pub spoken_day: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DayOfWeekRule {
    pub fn new(weekday: Weekday, spoken_day: impl Into<String>, start: NaiveTime, duration: Duration) -> Self {
        Self {
            weekday,
            spoken_day: spoken_day.into(),
            start,
            end: end_of(start, duration),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceWindow {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

/// One concrete scheduled instance of a recurring request. Derived and
/// ephemeral: recomputed whenever submission needs the flattened day list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledOccurrence {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Why a recurrence window was rejected. Ordered: the first failing rule
/// wins and later rules are not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum WindowViolation {
    StartNotInFuture,
    EndNotAfterStart,
    WindowTooLong,
}

impl WindowViolation {
    /// Message key in the locale table.
    pub fn message_key(self) -> &'static str {
        match self {
            Self::StartNotInFuture => "window-start-in-past",
            Self::EndNotAfterStart => "window-end-before-start",
            Self::WindowTooLong => "window-too-long",
        }
    }
}

/// Validate a recurrence window against `today`, fail-fast.
///
/// `today` itself never qualifies as a start date; the window may span at
/// most `max_days` days beyond `since`.
pub fn validate_window(
    window: RecurrenceWindow,
    today: NaiveDate,
    max_days: i64,
) -> std::result::Result<(), WindowViolation> {
    if window.since <= today {
        return Err(WindowViolation::StartNotInFuture);
    }
    if window.until <= window.since {
        return Err(WindowViolation::EndNotAfterStart);
    }
    if window.until > window.since + Duration::days(max_days) {
        return Err(WindowViolation::WindowTooLong);
    }
    Ok(())
}

/// Expand a window against the ordered weekday rules.
///
/// Walks every calendar day from `since` to `until` inclusive and emits one
/// occurrence per rule whose weekday matches that day, in rule insertion
/// order. A weekday may carry several rules (two Monday slots, say); all of
/// them are emitted. The result is deterministic and date-ascending.
pub fn expand(window: RecurrenceWindow, rules: &[DayOfWeekRule]) -> Vec<ScheduledOccurrence> {
    let mut occurrences = Vec::new();
    let mut day = window.since;
    while day <= window.until {
        let weekday = day.weekday();
        for rule in rules.iter().filter(|rule| rule.weekday == weekday) {
            occurrences.push(ScheduledOccurrence {
                date: day,
                weekday,
                start: rule.start,
                end: rule.end,
            });
        }
        day += Duration::days(1);
    }
    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(weekday: Weekday, spoken: &str, start: NaiveTime, hours: i64) -> DayOfWeekRule {
        DayOfWeekRule::new(weekday, spoken, start, Duration::hours(hours))
    }

    // 2026-09-07 is a Monday.
    const TODAY: (i32, u32, u32) = (2026, 9, 1);

    fn window(since: NaiveDate, until: NaiveDate) -> RecurrenceWindow {
        RecurrenceWindow { since, until }
    }

    #[test]
    fn start_today_is_rejected_and_tomorrow_accepted() {
        let today = d(TODAY.0, TODAY.1, TODAY.2);
        let until = d(2026, 9, 20);
        assert_eq!(
            validate_window(window(today, until), today, 90),
            Err(WindowViolation::StartNotInFuture)
        );
        assert!(validate_window(window(today + Duration::days(1), until), today, 90).is_ok());
    }

    #[test]
    fn end_must_be_strictly_after_start() {
        let today = d(TODAY.0, TODAY.1, TODAY.2);
        let since = d(2026, 9, 10);
        assert_eq!(
            validate_window(window(since, since), today, 90),
            Err(WindowViolation::EndNotAfterStart)
        );
        assert_eq!(
            validate_window(window(since, since - Duration::days(1)), today, 90),
            Err(WindowViolation::EndNotAfterStart)
        );
    }

    #[test]
    fn ninety_day_boundary_is_inclusive() {
        let today = d(TODAY.0, TODAY.1, TODAY.2);
        let since = d(2026, 9, 10);
        assert!(validate_window(window(since, since + Duration::days(90)), today, 90).is_ok());
        assert_eq!(
            validate_window(window(since, since + Duration::days(91)), today, 90),
            Err(WindowViolation::WindowTooLong)
        );
    }

    #[test]
    fn fail_fast_reports_the_first_violated_rule() {
        let today = d(TODAY.0, TODAY.1, TODAY.2);
        // Start in the past AND end before start: rule 1 must win.
        let bad = window(d(2026, 8, 1), d(2026, 7, 1));
        assert_eq!(
            validate_window(bad, today, 90),
            Err(WindowViolation::StartNotInFuture)
        );
    }

    #[test]
    fn expansion_is_deterministic() {
        let w = window(d(2026, 9, 7), d(2026, 9, 21));
        let rules = vec![
            rule(Weekday::Mon, "lunes", t(9, 0), 3),
            rule(Weekday::Wed, "miércoles", t(9, 0), 2),
        ];
        assert_eq!(expand(w, &rules), expand(w, &rules));
    }

    #[test]
    fn expansion_respects_window_and_weekday_invariants() {
        let w = window(d(2026, 9, 8), d(2026, 10, 2));
        let rules = vec![
            rule(Weekday::Tue, "martes", t(17, 0), 1),
            rule(Weekday::Fri, "viernes", t(10, 30), 2),
        ];
        let occurrences = expand(w, &rules);
        assert!(!occurrences.is_empty());
        for occ in &occurrences {
            assert!(occ.date >= w.since && occ.date <= w.until);
            assert_eq!(occ.date.weekday(), occ.weekday);
        }
        // Date-ascending.
        assert!(occurrences.windows(2).all(|p| p[0].date <= p[1].date));
    }

    #[test]
    fn single_day_window_with_matching_weekday_yields_one_per_rule() {
        let monday = d(2026, 9, 7);
        let w = window(monday, monday);
        let rules = vec![
            rule(Weekday::Mon, "lunes", t(9, 0), 1),
            rule(Weekday::Mon, "lunes", t(16, 0), 2),
        ];
        let occurrences = expand(w, &rules);
        assert_eq!(occurrences.len(), 2);
        // Rule insertion order within the same date.
        assert_eq!(occurrences[0].start, t(9, 0));
        assert_eq!(occurrences[1].start, t(16, 0));
    }

    #[test]
    fn single_day_window_without_matching_weekday_yields_nothing() {
        let monday = d(2026, 9, 7);
        let w = window(monday, monday);
        let rules = vec![rule(Weekday::Fri, "viernes", t(9, 0), 1)];
        assert!(expand(w, &rules).is_empty());
    }

    #[test]
    fn two_week_window_yields_calendar_dictated_occurrences() {
        // Next Monday through Monday+14: three Mondays, two Wednesdays.
        let since = d(2026, 9, 7);
        let w = window(since, since + Duration::days(14));
        let rules = vec![
            rule(Weekday::Mon, "lunes", t(9, 0), 3),
            rule(Weekday::Wed, "miércoles", t(9, 0), 2),
        ];
        let occurrences = expand(w, &rules);
        let mondays = occurrences.iter().filter(|o| o.weekday == Weekday::Mon).count();
        let wednesdays = occurrences.iter().filter(|o| o.weekday == Weekday::Wed).count();
        assert_eq!(mondays, 3);
        assert_eq!(wednesdays, 2);
        assert_eq!(occurrences.len(), 5);
        // End times follow the rule durations.
        assert!(occurrences
            .iter()
            .filter(|o| o.weekday == Weekday::Mon)
            .all(|o| o.end == t(12, 0)));
    }
}
