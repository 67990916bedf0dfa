//! Typed AIS messages and their ITU-R M.1371 payload layouts.
//!
//! Every supported message is a variant of [`AisMessage`]; encoding is one
//! dispatch producing the unpadded bit vector, decoding reads the message id
//! off the front and rebuilds the record. Field values are range-checked
//! before packing — an out-of-range field is an [`EncodeError`] the caller
//! reports and skips, never a corrupted payload.
//!
//! Scaling on the wire: SOG in 1/10 knot (1023 = unavailable, 1022 = 102.2 kn
//! or more), COG in 1/10 degree (3600 = unavailable), latitude/longitude in
//! 1/10000 minute (I4), heading 511 = unavailable, draught in 1/10 m.

use serde::{Deserialize, Serialize};

use crate::bits::{BitBuffer, BitReader};
use crate::error::{EncodeError, SentenceError};

/// Ship/station dimensions relative to the reported position reference point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub to_bow: u16,
    pub to_stern: u16,
    pub to_port: u8,
    pub to_starboard: u8,
}

impl Dimensions {
    fn encode(&self, b: &mut BitBuffer) -> Result<(), EncodeError> {
        if self.to_bow > 511 || self.to_stern > 511 {
            return Err(EncodeError::bad_field(
                "dimensions",
                format!("bow/stern {}/{} exceed 511 m", self.to_bow, self.to_stern),
            ));
        }
        if self.to_port > 63 || self.to_starboard > 63 {
            return Err(EncodeError::bad_field(
                "dimensions",
                format!(
                    "port/starboard {}/{} exceed 63 m",
                    self.to_port, self.to_starboard
                ),
            ));
        }
        b.append_uint(self.to_bow as u64, 9)?;
        b.append_uint(self.to_stern as u64, 9)?;
        b.append_uint(self.to_port as u64, 6)?;
        b.append_uint(self.to_starboard as u64, 6)?;
        Ok(())
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, SentenceError> {
        Ok(Dimensions {
            to_bow: r.take_uint(9)? as u16,
            to_stern: r.take_uint(9)? as u16,
            to_port: r.take_uint(6)? as u8,
            to_starboard: r.take_uint(6)? as u8,
        })
    }
}

// ── Field-level scaling helpers ───────────────────────────────────────────────

fn check_mmsi(mmsi: u32) -> Result<u64, EncodeError> {
    if mmsi > 999_999_999 {
        return Err(EncodeError::bad_field(
            "mmsi",
            format!("{mmsi} has more than 9 digits"),
        ));
    }
    Ok(mmsi as u64)
}

/// Auxiliary craft carry a 98MIDxxxx identity and report their mothership's
/// MMSI in place of dimensions in a type 24 part B.
fn is_auxiliary_craft(mmsi: u32) -> bool {
    (980_000_000..990_000_000).contains(&mmsi)
}

fn encode_sog(sog_knots: Option<f64>) -> Result<u64, EncodeError> {
    match sog_knots {
        None => Ok(1023),
        Some(v) if v < 0.0 => Err(EncodeError::bad_field("sog", format!("{v} kn is negative"))),
        // 1022 encodes "102.2 knots or more".
        Some(v) => Ok(((v * 10.0).round() as u64).min(1022)),
    }
}

fn decode_sog(raw: u64) -> Option<f64> {
    (raw != 1023).then(|| raw as f64 / 10.0)
}

fn encode_cog(cog_degrees: Option<f64>) -> Result<u64, EncodeError> {
    match cog_degrees {
        None => Ok(3600),
        Some(v) if !(0.0..360.0).contains(&v) => Err(EncodeError::bad_field(
            "cog",
            format!("{v}° outside [0, 360)"),
        )),
        Some(v) => Ok(((v * 10.0).round() as u64).min(3599)),
    }
}

fn decode_cog(raw: u64) -> Option<f64> {
    (raw != 3600).then(|| raw as f64 / 10.0)
}

fn encode_heading(heading: Option<u16>) -> Result<u64, EncodeError> {
    match heading {
        None => Ok(511),
        Some(v) if v > 359 => Err(EncodeError::bad_field(
            "heading",
            format!("{v}° outside 0..=359"),
        )),
        Some(v) => Ok(v as u64),
    }
}

fn decode_heading(raw: u64) -> Option<u16> {
    (raw != 511).then_some(raw as u16)
}

/// Degrees to I4 (1/10000 minute) with a latitude/longitude range check.
fn encode_coord(value: f64, limit: f64, field: &'static str) -> Result<i64, EncodeError> {
    if !(-limit..=limit).contains(&value) {
        return Err(EncodeError::bad_field(
            field,
            format!("{value}° outside ±{limit}°"),
        ));
    }
    Ok((value * 600_000.0).round() as i64)
}

fn decode_coord(raw: i64) -> f64 {
    raw as f64 / 600_000.0
}

fn encode_rot(rot: Option<i8>) -> i64 {
    match rot {
        // -128 encodes "turn information not available".
        None => -128,
        Some(v) => v as i64,
    }
}

fn decode_rot(raw: i64) -> Option<i8> {
    (raw != -128).then_some(raw as i8)
}

fn check_timestamp(ts: u8) -> Result<u64, EncodeError> {
    if ts > 63 {
        return Err(EncodeError::bad_field(
            "timestamp",
            format!("{ts} outside 0..=63"),
        ));
    }
    Ok(ts as u64)
}

fn header(b: &mut BitBuffer, message_type: u8, repeat: u8, mmsi: u32) -> Result<(), EncodeError> {
    b.append_uint(message_type as u64, 6)?;
    b.append_uint(repeat as u64, 2)?;
    b.append_uint(check_mmsi(mmsi)?, 30)?;
    Ok(())
}

// ── Message records ───────────────────────────────────────────────────────────

/// Types 1/2/3 — Class A position report. 168 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// 1, 2 or 3; all three share the layout.
    pub message_type: u8,
    pub repeat: u8,
    pub mmsi: u32,
    pub nav_status: u8,
    pub rate_of_turn: Option<i8>,
    pub sog_knots: Option<f64>,
    pub position_accuracy: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub cog_degrees: Option<f64>,
    pub true_heading: Option<u16>,
    /// UTC second of the fix, 0–59, or 60–63 sentinels.
    pub timestamp: u8,
    pub maneuver: u8,
    pub raim: bool,
    pub radio_status: u32,
}

impl PositionReport {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        if !(1..=3).contains(&self.message_type) {
            return Err(EncodeError::bad_field(
                "message_type",
                format!("{} is not a position report id", self.message_type),
            ));
        }
        if self.nav_status > 15 {
            return Err(EncodeError::bad_field(
                "nav_status",
                format!("{} outside 0..=15", self.nav_status),
            ));
        }
        let mut b = BitBuffer::new();
        header(&mut b, self.message_type, self.repeat, self.mmsi)?;
        b.append_uint(self.nav_status as u64, 4)?;
        b.append_int(encode_rot(self.rate_of_turn), 8)?;
        b.append_uint(encode_sog(self.sog_knots)?, 10)?;
        b.append_bool(self.position_accuracy);
        b.append_int(encode_coord(self.longitude, 180.0, "longitude")?, 28)?;
        b.append_int(encode_coord(self.latitude, 90.0, "latitude")?, 27)?;
        b.append_uint(encode_cog(self.cog_degrees)?, 12)?;
        b.append_uint(encode_heading(self.true_heading)?, 9)?;
        b.append_uint(check_timestamp(self.timestamp)?, 6)?;
        b.append_uint(self.maneuver as u64, 2)?;
        b.append_uint(0, 3)?; // spare
        b.append_bool(self.raim);
        b.append_uint(self.radio_status as u64, 19)?;
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>, message_type: u8) -> Result<Self, SentenceError> {
        let repeat = r.take_uint(2)? as u8;
        let mmsi = r.take_uint(30)? as u32;
        let nav_status = r.take_uint(4)? as u8;
        let rate_of_turn = decode_rot(r.take_int(8)?);
        let sog_knots = decode_sog(r.take_uint(10)?);
        let position_accuracy = r.take_bool()?;
        let longitude = decode_coord(r.take_int(28)?);
        let latitude = decode_coord(r.take_int(27)?);
        let cog_degrees = decode_cog(r.take_uint(12)?);
        let true_heading = decode_heading(r.take_uint(9)?);
        let timestamp = r.take_uint(6)? as u8;
        let maneuver = r.take_uint(2)? as u8;
        r.take_uint(3)?; // spare
        let raim = r.take_bool()?;
        let radio_status = r.take_uint(19)? as u32;
        Ok(PositionReport {
            message_type,
            repeat,
            mmsi,
            nav_status,
            rate_of_turn,
            sog_knots,
            position_accuracy,
            longitude,
            latitude,
            cog_degrees,
            true_heading,
            timestamp,
            maneuver,
            raim,
            radio_status,
        })
    }
}

/// Type 4 — base station report. 168 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseStationReport {
    pub repeat: u8,
    pub mmsi: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub position_accuracy: bool,
    pub longitude: f64,
    pub latitude: f64,
    /// Electronic position fixing device type, 0–15.
    pub epfd: u8,
    pub raim: bool,
    pub radio_status: u32,
}

impl BaseStationReport {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        if self.year > 9999 {
            return Err(EncodeError::bad_field(
                "year",
                format!("{} outside 0..=9999", self.year),
            ));
        }
        if self.month > 12 || self.day > 31 || self.hour > 24 || self.minute > 60 || self.second > 60
        {
            return Err(EncodeError::bad_field(
                "utc",
                format!(
                    "{:02}-{:02} {:02}:{:02}:{:02} outside calendar ranges",
                    self.month, self.day, self.hour, self.minute, self.second
                ),
            ));
        }
        if self.epfd > 15 {
            return Err(EncodeError::bad_field(
                "epfd",
                format!("{} outside 0..=15", self.epfd),
            ));
        }
        let mut b = BitBuffer::new();
        header(&mut b, 4, self.repeat, self.mmsi)?;
        b.append_uint(self.year as u64, 14)?;
        b.append_uint(self.month as u64, 4)?;
        b.append_uint(self.day as u64, 5)?;
        b.append_uint(self.hour as u64, 5)?;
        b.append_uint(self.minute as u64, 6)?;
        b.append_uint(self.second as u64, 6)?;
        b.append_bool(self.position_accuracy);
        b.append_int(encode_coord(self.longitude, 180.0, "longitude")?, 28)?;
        b.append_int(encode_coord(self.latitude, 90.0, "latitude")?, 27)?;
        b.append_uint(self.epfd as u64, 4)?;
        b.append_uint(0, 10)?; // spare
        b.append_bool(self.raim);
        b.append_uint(self.radio_status as u64, 19)?;
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, SentenceError> {
        let repeat = r.take_uint(2)? as u8;
        let mmsi = r.take_uint(30)? as u32;
        let year = r.take_uint(14)? as u16;
        let month = r.take_uint(4)? as u8;
        let day = r.take_uint(5)? as u8;
        let hour = r.take_uint(5)? as u8;
        let minute = r.take_uint(6)? as u8;
        let second = r.take_uint(6)? as u8;
        let position_accuracy = r.take_bool()?;
        let longitude = decode_coord(r.take_int(28)?);
        let latitude = decode_coord(r.take_int(27)?);
        let epfd = r.take_uint(4)? as u8;
        r.take_uint(10)?; // spare
        let raim = r.take_bool()?;
        let radio_status = r.take_uint(19)? as u32;
        Ok(BaseStationReport {
            repeat,
            mmsi,
            year,
            month,
            day,
            hour,
            minute,
            second,
            position_accuracy,
            longitude,
            latitude,
            epfd,
            raim,
            radio_status,
        })
    }
}

/// Type 5 — Class A static and voyage-related data. 424 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAndVoyage {
    pub repeat: u8,
    pub mmsi: u32,
    pub ais_version: u8,
    pub imo: u32,
    pub callsign: String,
    pub name: String,
    pub ship_type: u8,
    pub dimensions: Dimensions,
    pub epfd: u8,
    /// ETA defaults per the standard: month 0, day 0, hour 24, minute 60
    /// all mean "not available".
    pub eta_month: u8,
    pub eta_day: u8,
    pub eta_hour: u8,
    pub eta_minute: u8,
    pub draught_m: f64,
    pub destination: String,
    pub dte: bool,
}

impl StaticAndVoyage {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        if self.ship_type > 99 {
            return Err(EncodeError::bad_field(
                "ship_type",
                format!("{} outside 0..=99", self.ship_type),
            ));
        }
        if !(0.0..=25.5).contains(&self.draught_m) {
            return Err(EncodeError::bad_field(
                "draught",
                format!("{} m outside 0..=25.5", self.draught_m),
            ));
        }
        if self.destination.len() > 20 {
            return Err(EncodeError::bad_field(
                "destination",
                format!("{:?} exceeds 20 characters", self.destination),
            ));
        }
        if self.eta_month > 12 || self.eta_day > 31 || self.eta_hour > 24 || self.eta_minute > 60 {
            return Err(EncodeError::bad_field(
                "eta",
                format!(
                    "{:02}-{:02} {:02}:{:02} outside calendar ranges",
                    self.eta_month, self.eta_day, self.eta_hour, self.eta_minute
                ),
            ));
        }
        let mut b = BitBuffer::new();
        header(&mut b, 5, self.repeat, self.mmsi)?;
        b.append_uint(self.ais_version as u64, 2)?;
        b.append_uint(self.imo as u64, 30)?;
        b.append_string(&self.callsign, 7);
        b.append_string(&self.name, 20);
        b.append_uint(self.ship_type as u64, 8)?;
        self.dimensions.encode(&mut b)?;
        b.append_uint(self.epfd as u64, 4)?;
        b.append_uint(self.eta_month as u64, 4)?;
        b.append_uint(self.eta_day as u64, 5)?;
        b.append_uint(self.eta_hour as u64, 5)?;
        b.append_uint(self.eta_minute as u64, 6)?;
        b.append_uint((self.draught_m * 10.0).round() as u64, 8)?;
        b.append_string(&self.destination, 20);
        b.append_bool(self.dte);
        b.append_bool(false); // spare
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, SentenceError> {
        let repeat = r.take_uint(2)? as u8;
        let mmsi = r.take_uint(30)? as u32;
        let ais_version = r.take_uint(2)? as u8;
        let imo = r.take_uint(30)? as u32;
        let callsign = r.take_string(7)?;
        let name = r.take_string(20)?;
        let ship_type = r.take_uint(8)? as u8;
        let dimensions = Dimensions::decode(r)?;
        let epfd = r.take_uint(4)? as u8;
        let eta_month = r.take_uint(4)? as u8;
        let eta_day = r.take_uint(5)? as u8;
        let eta_hour = r.take_uint(5)? as u8;
        let eta_minute = r.take_uint(6)? as u8;
        let draught_m = r.take_uint(8)? as f64 / 10.0;
        let destination = r.take_string(20)?;
        let dte = r.take_bool()?;
        r.take_bool()?; // spare
        Ok(StaticAndVoyage {
            repeat,
            mmsi,
            ais_version,
            imo,
            callsign,
            name,
            ship_type,
            dimensions,
            epfd,
            eta_month,
            eta_day,
            eta_hour,
            eta_minute,
            draught_m,
            destination,
            dte,
        })
    }
}

/// Type 18 — standard Class B position report. 168 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBReport {
    pub repeat: u8,
    pub mmsi: u32,
    pub sog_knots: Option<f64>,
    pub position_accuracy: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub cog_degrees: Option<f64>,
    pub true_heading: Option<u16>,
    pub timestamp: u8,
    /// Carrier-sense unit flag (true = CSTDMA).
    pub cs_unit: bool,
    pub display: bool,
    pub dsc: bool,
    pub band: bool,
    pub msg22: bool,
    pub assigned: bool,
    pub raim: bool,
    pub radio_status: u32,
}

impl ClassBReport {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        let mut b = BitBuffer::new();
        header(&mut b, 18, self.repeat, self.mmsi)?;
        b.append_uint(0, 8)?; // reserved
        b.append_uint(encode_sog(self.sog_knots)?, 10)?;
        b.append_bool(self.position_accuracy);
        b.append_int(encode_coord(self.longitude, 180.0, "longitude")?, 28)?;
        b.append_int(encode_coord(self.latitude, 90.0, "latitude")?, 27)?;
        b.append_uint(encode_cog(self.cog_degrees)?, 12)?;
        b.append_uint(encode_heading(self.true_heading)?, 9)?;
        b.append_uint(check_timestamp(self.timestamp)?, 6)?;
        b.append_uint(0, 2)?; // regional reserved
        b.append_bool(self.cs_unit);
        b.append_bool(self.display);
        b.append_bool(self.dsc);
        b.append_bool(self.band);
        b.append_bool(self.msg22);
        b.append_bool(self.assigned);
        b.append_bool(self.raim);
        b.append_uint(self.radio_status as u64, 20)?;
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, SentenceError> {
        let repeat = r.take_uint(2)? as u8;
        let mmsi = r.take_uint(30)? as u32;
        r.take_uint(8)?; // reserved
        let sog_knots = decode_sog(r.take_uint(10)?);
        let position_accuracy = r.take_bool()?;
        let longitude = decode_coord(r.take_int(28)?);
        let latitude = decode_coord(r.take_int(27)?);
        let cog_degrees = decode_cog(r.take_uint(12)?);
        let true_heading = decode_heading(r.take_uint(9)?);
        let timestamp = r.take_uint(6)? as u8;
        r.take_uint(2)?; // regional reserved
        let cs_unit = r.take_bool()?;
        let display = r.take_bool()?;
        let dsc = r.take_bool()?;
        let band = r.take_bool()?;
        let msg22 = r.take_bool()?;
        let assigned = r.take_bool()?;
        let raim = r.take_bool()?;
        let radio_status = r.take_uint(20)? as u32;
        Ok(ClassBReport {
            repeat,
            mmsi,
            sog_knots,
            position_accuracy,
            longitude,
            latitude,
            cog_degrees,
            true_heading,
            timestamp,
            cs_unit,
            display,
            dsc,
            band,
            msg22,
            assigned,
            raim,
            radio_status,
        })
    }
}

/// Type 19 — extended Class B position report. 312 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedClassBReport {
    pub repeat: u8,
    pub mmsi: u32,
    pub sog_knots: Option<f64>,
    pub position_accuracy: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub cog_degrees: Option<f64>,
    pub true_heading: Option<u16>,
    pub timestamp: u8,
    pub name: String,
    pub ship_type: u8,
    pub dimensions: Dimensions,
    pub epfd: u8,
    pub raim: bool,
    pub dte: bool,
    pub assigned: bool,
}

impl ExtendedClassBReport {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        if self.ship_type > 99 {
            return Err(EncodeError::bad_field(
                "ship_type",
                format!("{} outside 0..=99", self.ship_type),
            ));
        }
        let mut b = BitBuffer::new();
        header(&mut b, 19, self.repeat, self.mmsi)?;
        b.append_uint(0, 8)?; // reserved
        b.append_uint(encode_sog(self.sog_knots)?, 10)?;
        b.append_bool(self.position_accuracy);
        b.append_int(encode_coord(self.longitude, 180.0, "longitude")?, 28)?;
        b.append_int(encode_coord(self.latitude, 90.0, "latitude")?, 27)?;
        b.append_uint(encode_cog(self.cog_degrees)?, 12)?;
        b.append_uint(encode_heading(self.true_heading)?, 9)?;
        b.append_uint(check_timestamp(self.timestamp)?, 6)?;
        b.append_uint(0, 4)?; // regional reserved
        b.append_string(&self.name, 20);
        b.append_uint(self.ship_type as u64, 8)?;
        self.dimensions.encode(&mut b)?;
        b.append_uint(self.epfd as u64, 4)?;
        b.append_bool(self.raim);
        b.append_bool(self.dte);
        b.append_bool(self.assigned);
        b.append_uint(0, 4)?; // spare
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, SentenceError> {
        let repeat = r.take_uint(2)? as u8;
        let mmsi = r.take_uint(30)? as u32;
        r.take_uint(8)?; // reserved
        let sog_knots = decode_sog(r.take_uint(10)?);
        let position_accuracy = r.take_bool()?;
        let longitude = decode_coord(r.take_int(28)?);
        let latitude = decode_coord(r.take_int(27)?);
        let cog_degrees = decode_cog(r.take_uint(12)?);
        let true_heading = decode_heading(r.take_uint(9)?);
        let timestamp = r.take_uint(6)? as u8;
        r.take_uint(4)?; // regional reserved
        let name = r.take_string(20)?;
        let ship_type = r.take_uint(8)? as u8;
        let dimensions = Dimensions::decode(r)?;
        let epfd = r.take_uint(4)? as u8;
        let raim = r.take_bool()?;
        let dte = r.take_bool()?;
        let assigned = r.take_bool()?;
        r.take_uint(4)?; // spare
        Ok(ExtendedClassBReport {
            repeat,
            mmsi,
            sog_knots,
            position_accuracy,
            longitude,
            latitude,
            cog_degrees,
            true_heading,
            timestamp,
            name,
            ship_type,
            dimensions,
            epfd,
            raim,
            dte,
            assigned,
        })
    }
}

/// Type 21 — aid-to-navigation report. 272 bits plus a 6-bit-per-character
/// name extension for names beyond 20 characters.
#[derive(Debug, Clone, PartialEq)]
pub struct AidToNavigationReport {
    pub repeat: u8,
    pub mmsi: u32,
    /// Aid type per M.1371 table (0 = unspecified … 31).
    pub aid_type: u8,
    pub name: String,
    pub position_accuracy: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub dimensions: Dimensions,
    pub epfd: u8,
    pub timestamp: u8,
    pub off_position: bool,
    pub regional: u8,
    pub raim: bool,
    pub virtual_aid: bool,
    pub assigned: bool,
}

impl AidToNavigationReport {
    /// Characters 21.. go to the name-extension field, capped at 14.
    const MAX_NAME: usize = 34;

    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        if self.aid_type > 31 {
            return Err(EncodeError::bad_field(
                "aid_type",
                format!("{} outside 0..=31", self.aid_type),
            ));
        }
        if self.name.len() > Self::MAX_NAME {
            return Err(EncodeError::bad_field(
                "name",
                format!("{:?} exceeds {} characters", self.name, Self::MAX_NAME),
            ));
        }
        let mut b = BitBuffer::new();
        header(&mut b, 21, self.repeat, self.mmsi)?;
        b.append_uint(self.aid_type as u64, 5)?;
        b.append_string(&self.name, 20);
        b.append_bool(self.position_accuracy);
        b.append_int(encode_coord(self.longitude, 180.0, "longitude")?, 28)?;
        b.append_int(encode_coord(self.latitude, 90.0, "latitude")?, 27)?;
        self.dimensions.encode(&mut b)?;
        b.append_uint(self.epfd as u64, 4)?;
        b.append_uint(check_timestamp(self.timestamp)?, 6)?;
        b.append_bool(self.off_position);
        b.append_uint(self.regional as u64, 8)?;
        b.append_bool(self.raim);
        b.append_bool(self.virtual_aid);
        b.append_bool(self.assigned);
        b.append_bool(false); // spare
        if self.name.len() > 20 {
            let extension = &self.name[20..];
            b.append_string(extension, extension.len());
        }
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>) -> Result<Self, SentenceError> {
        let repeat = r.take_uint(2)? as u8;
        let mmsi = r.take_uint(30)? as u32;
        let aid_type = r.take_uint(5)? as u8;
        let mut name = r.take_string(20)?;
        let position_accuracy = r.take_bool()?;
        let longitude = decode_coord(r.take_int(28)?);
        let latitude = decode_coord(r.take_int(27)?);
        let dimensions = Dimensions::decode(r)?;
        let epfd = r.take_uint(4)? as u8;
        let timestamp = r.take_uint(6)? as u8;
        let off_position = r.take_bool()?;
        let regional = r.take_uint(8)? as u8;
        let raim = r.take_bool()?;
        let virtual_aid = r.take_bool()?;
        let assigned = r.take_bool()?;
        r.take_bool()?; // spare
        let extension_chars = r.remaining() / 6;
        if extension_chars > 0 {
            name.push_str(&r.take_string(extension_chars)?);
        }
        Ok(AidToNavigationReport {
            repeat,
            mmsi,
            aid_type,
            name,
            position_accuracy,
            longitude,
            latitude,
            dimensions,
            epfd,
            timestamp,
            off_position,
            regional,
            raim,
            virtual_aid,
            assigned,
        })
    }
}

/// Type 24 part A — Class B static data, name. 160 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDataReportA {
    pub repeat: u8,
    pub mmsi: u32,
    pub name: String,
}

impl StaticDataReportA {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        let mut b = BitBuffer::new();
        header(&mut b, 24, self.repeat, self.mmsi)?;
        b.append_uint(0, 2)?; // part number A
        b.append_string(&self.name, 20);
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>, repeat: u8, mmsi: u32) -> Result<Self, SentenceError> {
        let name = r.take_string(20)?;
        Ok(StaticDataReportA { repeat, mmsi, name })
    }
}

/// Type 24 part B — Class B static data, type/callsign/dimensions. 168 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDataReportB {
    pub repeat: u8,
    pub mmsi: u32,
    pub ship_type: u8,
    pub vendor_id: String,
    pub callsign: String,
    pub dimensions: Dimensions,
    /// For an auxiliary craft the dimensions field carries the mothership
    /// MMSI instead.
    pub mothership_mmsi: Option<u32>,
}

impl StaticDataReportB {
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        if self.ship_type > 99 {
            return Err(EncodeError::bad_field(
                "ship_type",
                format!("{} outside 0..=99", self.ship_type),
            ));
        }
        // The dimension bits are read back as a mothership MMSI exactly when
        // the reporting MMSI is in the auxiliary-craft range, so the record
        // must agree with its own MMSI before anything is packed.
        let auxiliary = is_auxiliary_craft(self.mmsi);
        if auxiliary != self.mothership_mmsi.is_some() {
            return Err(EncodeError::bad_field(
                "mothership_mmsi",
                if auxiliary {
                    format!("auxiliary craft MMSI {} requires a mothership MMSI", self.mmsi)
                } else {
                    format!("MMSI {} is not in the auxiliary-craft range", self.mmsi)
                },
            ));
        }
        let mut b = BitBuffer::new();
        header(&mut b, 24, self.repeat, self.mmsi)?;
        b.append_uint(1, 2)?; // part number B
        b.append_uint(self.ship_type as u64, 8)?;
        b.append_string(&self.vendor_id, 7);
        b.append_string(&self.callsign, 7);
        match self.mothership_mmsi {
            Some(mothership) => b.append_uint(check_mmsi(mothership)?, 30)?,
            None => self.dimensions.encode(&mut b)?,
        }
        b.append_uint(0, 6)?; // spare
        Ok(b)
    }

    fn decode(r: &mut BitReader<'_>, repeat: u8, mmsi: u32) -> Result<Self, SentenceError> {
        let ship_type = r.take_uint(8)? as u8;
        let vendor_id = r.take_string(7)?;
        let callsign = r.take_string(7)?;
        // Auxiliary craft MMSIs are 98MMIDxxxx; their dimension bits carry
        // the mothership MMSI.
        let auxiliary = is_auxiliary_craft(mmsi);
        let (dimensions, mothership_mmsi) = if auxiliary {
            (Dimensions::default(), Some(r.take_uint(30)? as u32))
        } else {
            (Dimensions::decode(r)?, None)
        };
        r.take_uint(6)?; // spare
        Ok(StaticDataReportB {
            repeat,
            mmsi,
            ship_type,
            vendor_id,
            callsign,
            dimensions,
            mothership_mmsi,
        })
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// One AIS radio message, tagged by type.
#[derive(Debug, Clone, PartialEq)]
pub enum AisMessage {
    PositionReport(PositionReport),
    BaseStationReport(BaseStationReport),
    StaticAndVoyage(StaticAndVoyage),
    ClassBReport(ClassBReport),
    ExtendedClassBReport(ExtendedClassBReport),
    AidToNavigationReport(AidToNavigationReport),
    StaticDataReportA(StaticDataReportA),
    StaticDataReportB(StaticDataReportB),
}

impl AisMessage {
    /// The message id carried in the first six payload bits.
    pub fn message_type(&self) -> u8 {
        match self {
            AisMessage::PositionReport(m) => m.message_type,
            AisMessage::BaseStationReport(_) => 4,
            AisMessage::StaticAndVoyage(_) => 5,
            AisMessage::ClassBReport(_) => 18,
            AisMessage::ExtendedClassBReport(_) => 19,
            AisMessage::AidToNavigationReport(_) => 21,
            AisMessage::StaticDataReportA(_) | AisMessage::StaticDataReportB(_) => 24,
        }
    }

    pub fn mmsi(&self) -> u32 {
        match self {
            AisMessage::PositionReport(m) => m.mmsi,
            AisMessage::BaseStationReport(m) => m.mmsi,
            AisMessage::StaticAndVoyage(m) => m.mmsi,
            AisMessage::ClassBReport(m) => m.mmsi,
            AisMessage::ExtendedClassBReport(m) => m.mmsi,
            AisMessage::AidToNavigationReport(m) => m.mmsi,
            AisMessage::StaticDataReportA(m) => m.mmsi,
            AisMessage::StaticDataReportB(m) => m.mmsi,
        }
    }

    /// Pack into an unpadded payload bit vector.
    pub fn encode(&self) -> Result<BitBuffer, EncodeError> {
        match self {
            AisMessage::PositionReport(m) => m.encode(),
            AisMessage::BaseStationReport(m) => m.encode(),
            AisMessage::StaticAndVoyage(m) => m.encode(),
            AisMessage::ClassBReport(m) => m.encode(),
            AisMessage::ExtendedClassBReport(m) => m.encode(),
            AisMessage::AidToNavigationReport(m) => m.encode(),
            AisMessage::StaticDataReportA(m) => m.encode(),
            AisMessage::StaticDataReportB(m) => m.encode(),
        }
    }

    /// Rebuild a typed record from payload bits.
    pub fn decode(bits: &BitBuffer) -> Result<Self, SentenceError> {
        let mut r = bits.reader();
        let message_type = r.take_uint(6)? as u8;
        match message_type {
            1..=3 => Ok(AisMessage::PositionReport(PositionReport::decode(
                &mut r,
                message_type,
            )?)),
            4 => Ok(AisMessage::BaseStationReport(BaseStationReport::decode(
                &mut r,
            )?)),
            5 => Ok(AisMessage::StaticAndVoyage(StaticAndVoyage::decode(&mut r)?)),
            18 => Ok(AisMessage::ClassBReport(ClassBReport::decode(&mut r)?)),
            19 => Ok(AisMessage::ExtendedClassBReport(
                ExtendedClassBReport::decode(&mut r)?,
            )),
            21 => Ok(AisMessage::AidToNavigationReport(
                AidToNavigationReport::decode(&mut r)?,
            )),
            24 => {
                let repeat = r.take_uint(2)? as u8;
                let mmsi = r.take_uint(30)? as u32;
                match r.take_uint(2)? {
                    0 => Ok(AisMessage::StaticDataReportA(StaticDataReportA::decode(
                        &mut r, repeat, mmsi,
                    )?)),
                    1 => Ok(AisMessage::StaticDataReportB(StaticDataReportB::decode(
                        &mut r, repeat, mmsi,
                    )?)),
                    part => Err(SentenceError::field(
                        0,
                        "part number",
                        format!("{part} is not a defined type 24 part"),
                    )),
                }
            }
            other => Err(SentenceError::UnsupportedAisType(other)),
        }
    }
}
