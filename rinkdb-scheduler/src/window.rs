use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

/// Fetch windows are a domain rule expressed in the league's home time zone,
/// not in whatever zone the host happens to run in. Stored timestamps stay
/// UTC; only the gate evaluates civil time.
pub const SCHEDULER_TZ: Tz = chrono_tz::America::New_York;

/// True when `now` falls inside the configured window: its New York weekday
/// (0=Mon..6=Sun) is one of `active_days` and its New York hour satisfies
/// `start_hour <= hour < end_hour`.
///
/// DST is handled by the zone database. A tick landing in a skipped or
/// repeated civil hour is tested like any other moment.
pub fn window_admits(
    active_days: &[i32],
    start_hour: i32,
    end_hour: i32,
    now: DateTime<Utc>,
) -> bool {
    let local = now.with_timezone(&SCHEDULER_TZ);
    let weekday = local.weekday().num_days_from_monday() as i32;
    if !active_days.contains(&weekday) {
        return false;
    }
    let hour = local.hour() as i32;
    hour >= start_hour && hour < end_hour
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ALL_DAYS: [i32; 7] = [0, 1, 2, 3, 4, 5, 6];

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn evaluates_in_new_york_not_utc() {
        // 2025-07-09 18:30 UTC is 14:30 EDT on a Wednesday.
        let now = utc(2025, 7, 9, 18, 30);
        assert!(window_admits(&[2], 14, 15, now));
        assert!(!window_admits(&[2], 18, 19, now));
    }

    #[test]
    fn weekday_rolls_over_at_the_civil_boundary() {
        // 2025-01-08 03:00 UTC is still Tuesday 22:00 EST.
        let now = utc(2025, 1, 8, 3, 0);
        assert!(window_admits(&[1], 22, 23, now));
        assert!(!window_admits(&[2], 22, 23, now));
    }

    #[test]
    fn hour_bounds_are_inclusive_exclusive() {
        // 2025-07-09 13:00 UTC is 09:00 EDT Wednesday.
        let at_start = utc(2025, 7, 9, 13, 0);
        assert!(window_admits(&ALL_DAYS, 9, 17, at_start));

        // 21:00 UTC is 17:00 EDT, one past the window.
        let at_end = utc(2025, 7, 9, 21, 0);
        assert!(!window_admits(&ALL_DAYS, 9, 17, at_end));
    }

    #[test]
    fn equal_start_and_end_is_an_empty_window() {
        let now = utc(2025, 7, 9, 16, 0);
        assert!(!window_admits(&ALL_DAYS, 12, 12, now));
    }

    #[test]
    fn full_week_full_day_always_admits() {
        for hour in 0..24 {
            assert!(window_admits(&ALL_DAYS, 0, 24, utc(2025, 7, 9, hour, 30)));
        }
    }

    #[test]
    fn repeated_dst_hour_is_tested_like_any_other() {
        // The EDT->EST fall-back on 2025-11-02 repeats 01:00-02:00 local.
        // Both UTC instants map to local hour 1 on a Sunday.
        let first_pass = utc(2025, 11, 2, 5, 30);
        let second_pass = utc(2025, 11, 2, 6, 30);
        assert!(window_admits(&[6], 1, 2, first_pass));
        assert!(window_admits(&[6], 1, 2, second_pass));
        assert!(!window_admits(&[6], 2, 3, first_pass));
    }
}
