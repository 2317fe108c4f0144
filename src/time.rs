//! Calendar helpers for converting broken-down UTC dates into seconds since
//! the Unix epoch without pulling in a date library.

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

const DAYS_IN_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DAYS_IN_MONTH_LEAP_YEAR: [i64; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Gregorian leap-year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of seconds contained in the first `months` months after
/// 1 January 1970.
///
/// `months_to_seconds_utc(0)` is zero, `months_to_seconds_utc(1)` is the
/// length of January 1970 and so on. Negative input yields zero.
pub fn months_to_seconds_utc(months: i32) -> i64 {
    let mut seconds = 0;
    for month in 0..months.max(0) {
        let year = 1970 + month / 12;
        let days = if is_leap_year(year) {
            DAYS_IN_MONTH_LEAP_YEAR[(month % 12) as usize]
        } else {
            DAYS_IN_MONTH[(month % 12) as usize]
        };
        seconds += days * SECONDS_PER_DAY;
    }
    seconds
}

/// Seconds since the Unix epoch for a broken-down UTC date and time.
///
/// `month` and `day` are one-based. Returns `None` for dates before 1970 or
/// fields that are out of range.
pub fn utc_seconds(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<i64> {
    if year < 1970 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    let months = (year - 1970) * 12 + (month as i32 - 1);
    Some(
        months_to_seconds_utc(months)
            + (day as i64 - 1) * SECONDS_PER_DAY
            + hour as i64 * 3600
            + minute as i64 * 60
            + second as i64,
    )
}
