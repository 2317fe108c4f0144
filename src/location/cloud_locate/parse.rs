//! Decoding of the Cloud Locate answer.
//!
//! The service answers with a flat key/value text such as
//!
//! ```text
//! {"Lat":52.0187499,"Lon":0.2471071,"Alt":120.216,"Acc":29.877,"MeasTime":"2021-11-09T18:24:11"}
//! ```
//!
//! Numbers are converted straight from their decimal text into scaled
//! integers so no precision is lost on the way to the fixed-point
//! [`Location`] fields.

use crate::location::error::Error;
use crate::location::{Location, LocationType, LOCATION_UNKNOWN};
use crate::time;

/// Largest supported `power_of_ten_wanted`.
pub const MAX_POWER_OF_TEN: u32 = 9;

const KEY_LATITUDE: &str = "\"Lat\":";
const KEY_LONGITUDE: &str = "\"Lon\":";
const KEY_ALTITUDE: &str = "\"Alt\":";
const KEY_ACCURACY: &str = "\"Acc\":";
const KEY_MEASUREMENT_TIME: &str = "\"MeasTime\":";

/// Convert decimal text into an integer scaled by `10^power_of_ten_wanted`.
///
/// At most `max_fractional_digits` digits after the decimal point are
/// taken into account; further digits are ignored. The kept fraction is
/// then truncated or zero-extended to `power_of_ten_wanted` digits. An
/// optional leading sign is honoured.
///
/// Returns `None` for empty or malformed text, for an integer part larger
/// than `i32::MAX` and for `power_of_ten_wanted > MAX_POWER_OF_TEN`.
///
/// ```rust
/// use ulocate::location::cloud_locate::parse::string_to_fixed;
///
/// assert_eq!(string_to_fixed("52.0187499", 7, 7), Some(520_187_499));
/// assert_eq!(string_to_fixed("-758.7387289", 7, 7), Some(-7_587_387_289));
/// assert_eq!(string_to_fixed("120.216", 3, 3), Some(120_216));
/// ```
pub fn string_to_fixed(text: &str, power_of_ten_wanted: u32, max_fractional_digits: u32) -> Option<i64> {
    if power_of_ten_wanted > MAX_POWER_OF_TEN {
        return None;
    }
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (integer_text, fraction_text) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (digits, ""),
    };
    if integer_text.is_empty() && fraction_text.is_empty() {
        return None;
    }

    let mut integer: i64 = 0;
    for byte in integer_text.bytes() {
        if !byte.is_ascii_digit() {
            return None;
        }
        integer = integer * 10 + i64::from(byte - b'0');
        if integer > i64::from(i32::MAX) {
            return None;
        }
    }

    // digits past the wanted power are truncated, so never keep more
    let kept_digits = max_fractional_digits.min(power_of_ten_wanted);
    let mut fraction: i64 = 0;
    let mut fraction_digits = 0;
    for byte in fraction_text.bytes() {
        if !byte.is_ascii_digit() {
            return None;
        }
        if fraction_digits < kept_digits {
            fraction = fraction * 10 + i64::from(byte - b'0');
            fraction_digits += 1;
        }
    }
    fraction *= 10_i64.pow(power_of_ten_wanted - fraction_digits);

    let value = integer * 10_i64.pow(power_of_ten_wanted) + fraction;
    Some(if negative { -value } else { value })
}

/// Convert a `YYYY-MM-DDTHH:MM:SS` timestamp into seconds since the Unix
/// epoch. Fractional seconds are ignored.
///
/// ```rust
/// use ulocate::location::cloud_locate::parse::parse_timestamp;
///
/// assert_eq!(parse_timestamp("2021-11-09T18:24:11"), Some(1_636_482_251));
/// assert_eq!(parse_timestamp("2021-11-09 18:24:11"), None);
/// ```
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let mut date = text.trim().splitn(3, '-');
    let year = date_part(date.next()?)?;
    let month = date_part(date.next()?)?;
    let (day, clock) = date.next()?.split_once('T')?;
    let day = date_part(day)?;
    let mut clock = clock.splitn(3, ':');
    let hour = date_part(clock.next()?)?;
    let minute = date_part(clock.next()?)?;
    let second = date_part(clock.next()?)?;
    time::utc_seconds(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
    )
}

fn date_part(text: &str) -> Option<i64> {
    if text.starts_with(['-', '+']) {
        return None;
    }
    string_to_fixed(text, 0, 0)
}

/// The raw text of the value following `key`, up to the next `,` or `}`.
fn value_of<'a>(payload: &'a str, key: &str) -> Option<&'a str> {
    let start = payload.find(key)? + key.len();
    let rest = &payload[start..];
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() { None } else { Some(value) }
}

fn number_of(payload: &str, key: &str, power_of_ten: u32) -> Result<i32, Error> {
    let value = value_of(payload, key).ok_or(Error::Unknown)?;
    let scaled = string_to_fixed(value, power_of_ten, power_of_ten).ok_or(Error::Unknown)?;
    i32::try_from(scaled).map_err(|_| Error::Unknown)
}

/// Decode a Cloud Locate answer into a [`Location`].
///
/// The record is produced whole or not at all: any missing or malformed
/// field fails the parse with [`Error::Unknown`]. Speed and satellite count
/// are not part of the answer and stay unknown.
pub fn parse_location(payload: &str) -> Result<Location, Error> {
    let latitude_x1e7 = number_of(payload, KEY_LATITUDE, 7)?;
    let longitude_x1e7 = number_of(payload, KEY_LONGITUDE, 7)?;
    let altitude_millimetres = number_of(payload, KEY_ALTITUDE, 3)?;
    let radius_millimetres = number_of(payload, KEY_ACCURACY, 3)?;
    let time_text = value_of(payload, KEY_MEASUREMENT_TIME).ok_or(Error::Unknown)?;
    let time_utc = parse_timestamp(time_text.trim_matches('"')).ok_or(Error::Unknown)?;

    Ok(Location {
        location_type: LocationType::CloudCloudLocate,
        latitude_x1e7,
        longitude_x1e7,
        altitude_millimetres,
        radius_millimetres,
        speed_millimetres_per_second: LOCATION_UNKNOWN,
        satellites: -1,
        time_utc,
    })
}
