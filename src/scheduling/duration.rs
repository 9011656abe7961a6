use crate::error::{Result, ScheduleError};
use chrono::{Duration, NaiveTime};

/// Parse the ISO-8601 duration literals the speech model produces
/// (`PT2H`, `PT30M`, `PT1H30M`, `P1D`, ...). Weeks/months/years are not
/// meaningful for a single service slot and are rejected.
pub fn parse_iso8601(raw: &str) -> Result<Duration> {
    let bad = || ScheduleError::BadDuration(raw.to_string());

    let rest = raw.strip_prefix('P').ok_or_else(bad)?;
    if rest.is_empty() {
        return Err(bad().into());
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = Duration::zero();
    let mut any = false;

    for (part, units) in [(date_part, "D"), (time_part, "HMS")] {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() {
                number.push(c);
            } else if units.contains(c) {
                let value: i64 = number.parse().map_err(|_| bad())?;
                number.clear();
                any = true;
                total += match c {
                    'D' => Duration::days(value),
                    'H' => Duration::hours(value),
                    'M' => Duration::minutes(value),
                    'S' => Duration::seconds(value),
                    _ => unreachable!(),
                };
            } else {
                return Err(bad().into());
            }
        }
        if !number.is_empty() {
            return Err(bad().into());
        }
    }

    if !any {
        return Err(bad().into());
    }
    Ok(total)
}

/// Calendar-free end-time computation: wall-clock addition that wraps at
/// midnight. Durations beyond 24h are implementation-defined and simply
/// keep wrapping.
pub fn end_of(start: NaiveTime, duration: Duration) -> NaiveTime {
    start.overflowing_add_signed(duration).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_hour_and_minute_literals() {
        assert_eq!(parse_iso8601("PT2H").unwrap(), Duration::hours(2));
        assert_eq!(parse_iso8601("PT30M").unwrap(), Duration::minutes(30));
        assert_eq!(parse_iso8601("PT1H30M").unwrap(), Duration::minutes(90));
        assert_eq!(parse_iso8601("P1D").unwrap(), Duration::days(1));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso8601("").is_err());
        assert!(parse_iso8601("P").is_err());
        assert!(parse_iso8601("2H").is_err());
        assert!(parse_iso8601("PT2X").is_err());
        assert!(parse_iso8601("PT2").is_err());
    }

    #[test]
    fn end_time_adds_within_a_day() {
        assert_eq!(end_of(t(9, 0), Duration::hours(3)), t(12, 0));
        assert_eq!(end_of(t(9, 15), Duration::minutes(90)), t(10, 45));
    }

    #[test]
    fn end_time_wraps_at_midnight() {
        assert_eq!(end_of(t(23, 0), Duration::hours(2)), t(1, 0));
    }
}
