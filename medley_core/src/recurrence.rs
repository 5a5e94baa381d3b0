//! Due-time computation for medication doses.
//!
//! The next single dose is always "today at the time of day, or tomorrow if
//! that has already passed", for every frequency. Longer cadences are
//! carried by the reminder's repeat unit, not by the due time.

use crate::{Frequency, TimeOfDay};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};

/// Longest daylight-saving gap we walk across when a wall-clock time is skipped
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Compute the next due instant for a dose, strictly after `now`
///
/// The candidate is `now`'s calendar date combined with `time_of_day` in
/// `now`'s time zone; if it is not after `now`, it moves to the next day.
pub fn compute_next_dose<Tz: TimeZone>(
    frequency: Frequency,
    time_of_day: TimeOfDay,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let at = time_of_day.as_naive();

    let candidate = resolve_local(&tz, today.and_time(at));
    if candidate > *now {
        tracing::trace!("{} dose due today at {}", frequency.as_str(), time_of_day);
        return candidate;
    }

    let next = match today.succ_opt() {
        Some(tomorrow) => resolve_local(&tz, tomorrow.and_time(at)),
        None => candidate + Duration::days(1),
    };
    tracing::trace!("{} dose at {} already passed, due tomorrow", frequency.as_str(), time_of_day);
    next
}

/// Map a local wall-clock time to an instant in `tz`
///
/// Ambiguous times (clocks going back) take the earlier instant; skipped
/// times (clocks going forward) take the first valid minute after the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }

    (1..=MAX_GAP_MINUTES)
        .find_map(|m| {
            tz.from_local_datetime(&(naive + Duration::minutes(m)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn test_time_already_passed_moves_to_tomorrow() {
        let now = at("2024-01-01T10:00:00Z");
        let next = compute_next_dose(Frequency::Daily, tod("09:00"), &now);
        assert_eq!(next, at("2024-01-02T09:00:00Z"));
    }

    #[test]
    fn test_time_later_today_stays_today() {
        let now = at("2024-01-01T08:30:00Z");
        let next = compute_next_dose(Frequency::Daily, tod("09:00"), &now);
        assert_eq!(next, at("2024-01-01T09:00:00Z"));
    }

    #[test]
    fn test_exact_match_is_not_in_future() {
        let now = at("2024-01-01T09:00:00Z");
        let next = compute_next_dose(Frequency::Daily, tod("09:00"), &now);
        assert_eq!(next, at("2024-01-02T09:00:00Z"));
    }

    #[test]
    fn test_seconds_past_the_minute_count_as_passed() {
        let now = at("2024-01-01T09:00:30Z");
        let next = compute_next_dose(Frequency::Daily, tod("09:00"), &now);
        assert_eq!(next, at("2024-01-02T09:00:00Z"));
    }

    #[test]
    fn test_month_and_year_rollover() {
        let now = at("2024-12-31T23:30:00Z");
        let next = compute_next_dose(Frequency::Daily, tod("08:00"), &now);
        assert_eq!(next, at("2025-01-01T08:00:00Z"));

        let now = at("2024-02-28T12:00:00Z");
        let next = compute_next_dose(Frequency::Daily, tod("06:00"), &now);
        assert_eq!(next, at("2024-02-29T06:00:00Z"));
    }

    #[test]
    fn test_all_frequencies_share_next_single_dose_rule() {
        let now = at("2024-01-01T10:00:00Z");
        for freq in Frequency::ALL {
            let next = compute_next_dose(freq, tod("09:00"), &now);
            assert_eq!(next, at("2024-01-02T09:00:00Z"), "frequency {:?}", freq);
        }
    }

    #[test]
    fn test_strictly_future_and_within_a_day() {
        let base = at("2024-03-10T00:00:00Z");
        for step in 0..(48 * 4) {
            let now = base + Duration::minutes(step * 15 + 7);
            for freq in Frequency::ALL {
                for (h, m) in [(0, 0), (6, 30), (9, 0), (12, 15), (23, 59)] {
                    let t = TimeOfDay::new(h, m).unwrap();
                    let next = compute_next_dose(freq, t, &now);
                    assert!(next > now, "{} not after {}", next, now);
                    assert!(next - now <= Duration::hours(24));
                }
            }
        }
    }

    #[test]
    fn test_wall_clock_is_evaluated_in_now_timezone() {
        let tz = FixedOffset::east_opt(10 * 3600).unwrap();
        // 23:00 UTC on Jan 1 is 09:00 on Jan 2 in UTC+10
        let now = tz.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let next = compute_next_dose(Frequency::Daily, tod("09:00"), &now);
        assert_eq!(next.with_timezone(&Utc), at("2024-01-01T23:00:00Z"));
    }
}
