//! NMEA 0183 sentence framing: `$`/`!` leader, 5-letter header, comma fields,
//! `*` + two uppercase hex checksum digits, CRLF termination.
//!
//! The checksum is the XOR of every byte strictly between the leader and the
//! `*`. Built sentences are returned without the trailing CRLF — the output
//! sinks own line termination.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::SentenceError;
use crate::fields;

/// NMEA hard length limit: 82 characters including the leader and CRLF.
pub const MAX_SENTENCE_LEN: usize = 82;

/// XOR checksum over a sentence body (everything between `$`/`!` and `*`).
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Frame a body with its leader, checksum and no CRLF.
fn frame(leader: char, body: &str) -> String {
    let s = format!("{leader}{body}*{:02X}", checksum(body));
    debug_assert!(s.len() + 2 <= MAX_SENTENCE_LEN, "oversized sentence {s:?}");
    s
}

/// Validate framing, length and checksum; return the leader and body.
pub fn split_frame(raw: &str) -> Result<(char, &str), SentenceError> {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    if trimmed.len() + 2 > MAX_SENTENCE_LEN {
        return Err(SentenceError::TooLong);
    }
    let leader = trimmed.chars().next().ok_or(SentenceError::Framing)?;
    if leader != '$' && leader != '!' {
        return Err(SentenceError::Framing);
    }
    let (body, carried) = trimmed[1..]
        .rsplit_once('*')
        .ok_or(SentenceError::MissingChecksum)?;
    let computed = checksum(body);
    let valid = carried.len() == 2
        && u8::from_str_radix(carried, 16).map(|v| v == computed) == Ok(true);
    if !valid {
        return Err(SentenceError::Checksum {
            computed,
            carried: carried.to_string(),
        });
    }
    Ok((leader, body))
}

/// Validate a raw sentence without interpreting it.
pub fn validate(raw: &str) -> Result<(), SentenceError> {
    split_frame(raw).map(|_| ())
}

// ── Talker IDs ────────────────────────────────────────────────────────────────

/// Two-letter NMEA talker prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TalkerId {
    /// GPS
    #[default]
    GP,
    /// GLONASS
    GL,
    /// Galileo
    GA,
    /// Combined GNSS
    GN,
    /// BeiDou
    BD,
    /// QZSS
    QZ,
    /// Integrated instrumentation
    II,
    /// Integrated navigation
    IN,
    /// ECDIS
    EC,
    /// AIS mobile station
    AI,
}

impl TalkerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TalkerId::GP => "GP",
            TalkerId::GL => "GL",
            TalkerId::GA => "GA",
            TalkerId::GN => "GN",
            TalkerId::BD => "BD",
            TalkerId::QZ => "QZ",
            TalkerId::II => "II",
            TalkerId::IN => "IN",
            TalkerId::EC => "EC",
            TalkerId::AI => "AI",
        }
    }

    /// Parse a talker prefix; unknown talkers fall back to GP.
    pub fn parse(s: &str) -> TalkerId {
        match s {
            "GL" => TalkerId::GL,
            "GA" => TalkerId::GA,
            "GN" => TalkerId::GN,
            "BD" => TalkerId::BD,
            "QZ" => TalkerId::QZ,
            "II" => TalkerId::II,
            "IN" => TalkerId::IN,
            "EC" => TalkerId::EC,
            "AI" => TalkerId::AI,
            _ => TalkerId::GP,
        }
    }
}

/// AIS VHF channel carried in the AIVDM envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::A => "A",
            Channel::B => "B",
        }
    }

    pub fn other(&self) -> Channel {
        match self {
            Channel::A => Channel::B,
            Channel::B => Channel::A,
        }
    }
}

// ── Typed field helpers ───────────────────────────────────────────────────────

fn req_field<'a>(
    fields: &[&'a str],
    index: usize,
    name: &'static str,
) -> Result<&'a str, SentenceError> {
    let v = fields
        .get(index)
        .ok_or_else(|| SentenceError::field(index, name, "missing"))?;
    if v.is_empty() {
        return Err(SentenceError::field(index, name, "empty"));
    }
    Ok(v)
}

fn parse_num<T: std::str::FromStr>(
    fields: &[&str],
    index: usize,
    name: &'static str,
) -> Result<T, SentenceError> {
    req_field(fields, index, name)?
        .parse()
        .map_err(|_| SentenceError::field(index, name, "not a number"))
}

fn parse_position(
    fields: &[&str],
    lat_index: usize,
) -> Result<(f64, f64), SentenceError> {
    let lat = fields::parse_coordinate(
        req_field(fields, lat_index, "latitude")?,
        req_field(fields, lat_index + 1, "lat hemisphere")?,
    )
    .map_err(|e| SentenceError::field(lat_index, "latitude", e))?;
    let lon = fields::parse_coordinate(
        req_field(fields, lat_index + 2, "longitude")?,
        req_field(fields, lat_index + 3, "lon hemisphere")?,
    )
    .map_err(|e| SentenceError::field(lat_index + 2, "longitude", e))?;
    if lat.abs() > 90.0 {
        return Err(SentenceError::field(lat_index, "latitude", "outside ±90°"));
    }
    if lon.abs() > 180.0 {
        return Err(SentenceError::field(
            lat_index + 2,
            "longitude",
            "outside ±180°",
        ));
    }
    Ok((lat, lon))
}

// ── GGA ───────────────────────────────────────────────────────────────────────

/// GGA — GPS fix data.
#[derive(Debug, Clone, PartialEq)]
pub struct GgaSentence {
    pub talker: TalkerId,
    pub time: NaiveTime,
    pub latitude: f64,
    pub longitude: f64,
    /// 0 = invalid, 1 = GPS, 2 = DGPS, … 8 = simulation.
    pub fix_quality: u8,
    pub satellites: u8,
    pub hdop: f64,
    pub altitude_m: f64,
    pub geoid_separation_m: f64,
    pub dgps_age_secs: Option<f64>,
    pub dgps_station: Option<u16>,
}

impl GgaSentence {
    pub fn to_sentence(&self) -> String {
        let (lat, lat_h) = fields::format_latitude(self.latitude);
        let (lon, lon_h) = fields::format_longitude(self.longitude);
        let body = format!(
            "{}GGA,{},{},{},{},{},{},{:02},{:.1},{:.1},M,{:.1},M,{},{}",
            self.talker.as_str(),
            fields::format_time(self.time),
            lat,
            lat_h,
            lon,
            lon_h,
            self.fix_quality,
            self.satellites,
            self.hdop,
            self.altitude_m,
            self.geoid_separation_m,
            self.dgps_age_secs
                .map(|v| format!("{v:.1}"))
                .unwrap_or_default(),
            self.dgps_station
                .map(|v| format!("{v:04}"))
                .unwrap_or_default(),
        );
        frame('$', &body)
    }

    pub fn parse(raw: &str) -> Result<Self, SentenceError> {
        let (_, body) = split_frame(raw)?;
        let all: Vec<&str> = body.split(',').collect();
        let header = all[0];
        if header.len() != 5 || &header[2..] != "GGA" {
            return Err(SentenceError::UnsupportedType(header.to_string()));
        }
        let talker = TalkerId::parse(&header[..2]);
        let f = &all[1..];

        let time = fields::parse_time(req_field(f, 0, "time")?)
            .map_err(|e| SentenceError::field(0, "time", e))?;
        let (latitude, longitude) = parse_position(f, 1)?;
        let fix_quality: u8 = parse_num(f, 5, "fix quality")?;
        if fix_quality > 8 {
            return Err(SentenceError::field(5, "fix quality", "outside 0..=8"));
        }
        let satellites: u8 = parse_num(f, 6, "satellites")?;
        let hdop: f64 = parse_num(f, 7, "hdop")?;
        let altitude_m: f64 = parse_num(f, 8, "altitude")?;
        if f.get(9).copied() != Some("M") {
            return Err(SentenceError::field(9, "altitude unit", "expected M"));
        }
        let geoid_separation_m: f64 = parse_num(f, 10, "geoid separation")?;
        if f.get(11).copied() != Some("M") {
            return Err(SentenceError::field(11, "geoid unit", "expected M"));
        }
        let dgps_age_secs = match f.get(12) {
            Some(v) if !v.is_empty() => Some(
                v.parse()
                    .map_err(|_| SentenceError::field(12, "dgps age", "not a number"))?,
            ),
            _ => None,
        };
        let dgps_station = match f.get(13) {
            Some(v) if !v.is_empty() => Some(
                v.parse()
                    .map_err(|_| SentenceError::field(13, "dgps station", "not a number"))?,
            ),
            _ => None,
        };

        Ok(GgaSentence {
            talker,
            time,
            latitude,
            longitude,
            fix_quality,
            satellites,
            hdop,
            altitude_m,
            geoid_separation_m,
            dgps_age_secs,
            dgps_station,
        })
    }
}

// ── RMC ───────────────────────────────────────────────────────────────────────

/// FAA mode indicator (RMC field 12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaaMode {
    Autonomous,
    Differential,
    Estimated,
    Manual,
    Simulator,
    NotValid,
}

impl FaaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaaMode::Autonomous => "A",
            FaaMode::Differential => "D",
            FaaMode::Estimated => "E",
            FaaMode::Manual => "M",
            FaaMode::Simulator => "S",
            FaaMode::NotValid => "N",
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s {
            "A" => Ok(FaaMode::Autonomous),
            "D" => Ok(FaaMode::Differential),
            "E" => Ok(FaaMode::Estimated),
            "M" => Ok(FaaMode::Manual),
            "S" => Ok(FaaMode::Simulator),
            "N" => Ok(FaaMode::NotValid),
            other => Err(format!("unknown mode {other:?}")),
        }
    }
}

/// RMC — recommended minimum navigation information.
#[derive(Debug, Clone, PartialEq)]
pub struct RmcSentence {
    pub talker: TalkerId,
    pub time: NaiveTime,
    /// `A` when the fix is valid, `V` otherwise.
    pub status_active: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub sog_knots: f64,
    pub cog_degrees: f64,
    pub date: NaiveDate,
    /// Signed degrees, east positive. `None` leaves the fields empty.
    pub magnetic_variation: Option<f64>,
    pub mode: FaaMode,
}

impl RmcSentence {
    pub fn to_sentence(&self) -> String {
        let (lat, lat_h) = fields::format_latitude(self.latitude);
        let (lon, lon_h) = fields::format_longitude(self.longitude);
        let (var, var_h) = match self.magnetic_variation {
            Some(v) if v < 0.0 => (format!("{:.1}", -v), "W"),
            Some(v) => (format!("{v:.1}"), "E"),
            None => (String::new(), ""),
        };
        let body = format!(
            "{}RMC,{},{},{},{},{},{},{:.1},{:.1},{},{},{},{}",
            self.talker.as_str(),
            fields::format_time(self.time),
            if self.status_active { "A" } else { "V" },
            lat,
            lat_h,
            lon,
            lon_h,
            self.sog_knots,
            self.cog_degrees,
            fields::format_date(self.date),
            var,
            var_h,
            self.mode.as_str(),
        );
        frame('$', &body)
    }

    pub fn parse(raw: &str) -> Result<Self, SentenceError> {
        let (_, body) = split_frame(raw)?;
        let all: Vec<&str> = body.split(',').collect();
        let header = all[0];
        if header.len() != 5 || &header[2..] != "RMC" {
            return Err(SentenceError::UnsupportedType(header.to_string()));
        }
        let talker = TalkerId::parse(&header[..2]);
        let f = &all[1..];

        let time = fields::parse_time(req_field(f, 0, "time")?)
            .map_err(|e| SentenceError::field(0, "time", e))?;
        let status_active = match req_field(f, 1, "status")? {
            "A" => true,
            "V" => false,
            _ => return Err(SentenceError::field(1, "status", "expected A or V")),
        };
        let (latitude, longitude) = parse_position(f, 2)?;
        let sog_knots: f64 = parse_num(f, 6, "sog")?;
        if sog_knots < 0.0 {
            return Err(SentenceError::field(6, "sog", "negative"));
        }
        let cog_degrees: f64 = parse_num(f, 7, "cog")?;
        if !(0.0..=360.0).contains(&cog_degrees) {
            return Err(SentenceError::field(7, "cog", "outside 0..=360"));
        }
        let date = fields::parse_date(req_field(f, 8, "date")?)
            .map_err(|e| SentenceError::field(8, "date", e))?;
        let magnetic_variation = match (f.get(9), f.get(10)) {
            (Some(v), Some(h)) if !v.is_empty() => {
                let magnitude: f64 = v
                    .parse()
                    .map_err(|_| SentenceError::field(9, "variation", "not a number"))?;
                match *h {
                    "E" => Some(magnitude),
                    "W" => Some(-magnitude),
                    _ => {
                        return Err(SentenceError::field(
                            10,
                            "variation direction",
                            "expected E or W",
                        ))
                    }
                }
            }
            _ => None,
        };
        let mode = match f.get(11) {
            Some(v) if !v.is_empty() => {
                FaaMode::parse(v).map_err(|e| SentenceError::field(11, "mode", e))?
            }
            _ => FaaMode::NotValid,
        };

        Ok(RmcSentence {
            talker,
            time,
            status_active,
            latitude,
            longitude,
            sog_knots,
            cog_degrees,
            date,
            magnetic_variation,
            mode,
        })
    }
}

// ── AIVDM ─────────────────────────────────────────────────────────────────────

/// AIVDM — encapsulated AIS radio message (one fragment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AivdmSentence {
    pub fragment_count: u8,
    /// 1-based fragment number.
    pub fragment_index: u8,
    /// Group sequence id 0–9 shared by the fragments of one message; absent
    /// on single-fragment messages.
    pub group_id: Option<u8>,
    pub channel: Channel,
    pub payload: String,
    pub fill_bits: u8,
}

impl AivdmSentence {
    pub fn to_sentence(&self) -> String {
        let body = format!(
            "AIVDM,{},{},{},{},{},{}",
            self.fragment_count,
            self.fragment_index,
            self.group_id.map(|g| g.to_string()).unwrap_or_default(),
            self.channel.as_str(),
            self.payload,
            self.fill_bits,
        );
        frame('!', &body)
    }

    pub fn parse(raw: &str) -> Result<Self, SentenceError> {
        let (leader, body) = split_frame(raw)?;
        if leader != '!' {
            return Err(SentenceError::Framing);
        }
        let all: Vec<&str> = body.split(',').collect();
        if all[0] != "AIVDM" {
            return Err(SentenceError::UnsupportedType(all[0].to_string()));
        }
        let f = &all[1..];

        let fragment_count: u8 = parse_num(f, 0, "fragment count")?;
        let fragment_index: u8 = parse_num(f, 1, "fragment index")?;
        if fragment_count == 0 || fragment_index == 0 || fragment_index > fragment_count {
            return Err(SentenceError::field(
                1,
                "fragment index",
                "outside 1..=count",
            ));
        }
        let group_id = match f.get(2) {
            Some(v) if !v.is_empty() => {
                let g: u8 = v
                    .parse()
                    .map_err(|_| SentenceError::field(2, "group id", "not a number"))?;
                if g > 9 {
                    return Err(SentenceError::field(2, "group id", "outside 0..=9"));
                }
                Some(g)
            }
            _ => None,
        };
        let channel = match req_field(f, 3, "channel")? {
            "A" | "1" => Channel::A,
            "B" | "2" => Channel::B,
            _ => return Err(SentenceError::field(3, "channel", "expected A or B")),
        };
        let payload = req_field(f, 4, "payload")?.to_string();
        let fill_bits: u8 = parse_num(f, 5, "fill bits")?;
        if fill_bits > 5 {
            return Err(SentenceError::field(5, "fill bits", "outside 0..=5"));
        }

        Ok(AivdmSentence {
            fragment_count,
            fragment_index,
            group_id,
            channel,
            payload,
            fill_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_known_vectors() {
        assert_eq!(
            checksum("GPGGA,120044,6011.552,N,02501.941,E,1,08,2.0,28.0,M,19.6,M,,"),
            0x71
        );
        assert_eq!(
            checksum("GPRMC,120044,A,6011.552,N,02501.941,E,000.0,360.0,160705,006.1,E,A"),
            0x11
        );
    }

    #[test]
    fn validate_accepts_and_rejects() {
        assert!(validate("$GPGGA,120044,6011.552,N,02501.941,E,1,08,2.0,28.0,M,19.6,M,,*71").is_ok());
        // Wrong checksum
        assert!(matches!(
            validate("$GPGGA,120044,6011.552,N,02501.941,E,1,08,2.0,28.0,M,19.6,M,,*78"),
            Err(SentenceError::Checksum { .. })
        ));
        // No leader
        assert!(matches!(
            validate("GPGGA,120044,6011.552,N,02501.941,E,1,08,2.0,28.0,M,19.6,M,,*71"),
            Err(SentenceError::Framing)
        ));
    }

    #[test]
    fn gga_build_matches_reference() {
        let gga = GgaSentence {
            talker: TalkerId::GP,
            time: NaiveTime::from_hms_milli_opt(4, 43, 57, 944).unwrap(),
            latitude: 37.8046517,
            longitude: -122.4054417,
            fix_quality: 1,
            satellites: 8,
            hdop: 1.2,
            altitude_m: 0.0,
            geoid_separation_m: 19.6,
            dgps_age_secs: None,
            dgps_station: None,
        };
        assert_eq!(
            gga.to_sentence(),
            "$GPGGA,044357.944,3748.2791,N,12224.3265,W,1,08,1.2,0.0,M,19.6,M,,*43"
        );
    }

    #[test]
    fn gga_parse_round_trip() {
        let raw = "$GPGGA,120044,6011.552,N,02501.941,E,1,08,2.0,28.0,M,19.6,M,,*71";
        let gga = GgaSentence::parse(raw).unwrap();
        assert_eq!(gga.talker, TalkerId::GP);
        assert_eq!(gga.fix_quality, 1);
        assert_eq!(gga.satellites, 8);
        assert!((gga.latitude - 60.19253333).abs() < 1e-6);
        assert!((gga.longitude - 25.03235).abs() < 1e-6);
        assert!((gga.hdop - 2.0).abs() < 1e-9);

        let rebuilt = GgaSentence::parse(&gga.to_sentence()).unwrap();
        assert!((rebuilt.latitude - gga.latitude).abs() < 1e-7);
        assert!((rebuilt.longitude - gga.longitude).abs() < 1e-7);
    }

    #[test]
    fn gga_parse_reports_field_index() {
        let body = "GPGGA,120044,6011.552,N,02501.941,E,9,08,2.0,28.0,M,19.6,M,,";
        let raw = format!("${body}*{:02X}", checksum(body));
        match GgaSentence::parse(&raw) {
            Err(SentenceError::Field { index: 5, .. }) => {}
            other => panic!("expected fix-quality field error, got {other:?}"),
        }
    }

    #[test]
    fn rmc_parse_reference() {
        let raw = "$GPRMC,120044,A,6011.552,N,02501.941,E,000.0,360.0,160705,006.1,E,A*11";
        let rmc = RmcSentence::parse(raw).unwrap();
        assert!(rmc.status_active);
        assert!((rmc.latitude - 60.19253333).abs() < 1e-6);
        assert_eq!(rmc.sog_knots, 0.0);
        assert_eq!(rmc.cog_degrees, 360.0);
        assert_eq!(rmc.date, NaiveDate::from_ymd_opt(2005, 7, 16).unwrap());
        assert_eq!(rmc.magnetic_variation, Some(6.1));
        assert_eq!(rmc.mode, FaaMode::Autonomous);
    }

    #[test]
    fn rmc_build_and_parse_round_trip() {
        let rmc = RmcSentence {
            talker: TalkerId::GP,
            time: NaiveTime::from_hms_milli_opt(12, 0, 44, 0).unwrap(),
            status_active: true,
            latitude: -33.851,
            longitude: 151.2099,
            sog_knots: 12.3,
            cog_degrees: 87.5,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            magnetic_variation: Some(-4.2),
            mode: FaaMode::Simulator,
        };
        let raw = rmc.to_sentence();
        assert!(raw.starts_with("$GPRMC,120044.000,A,3351.0600,S,15112.5940,E,12.3,87.5,010624,4.2,W,S*"));
        let parsed = RmcSentence::parse(&raw).unwrap();
        assert!((parsed.latitude - rmc.latitude).abs() < 1e-7);
        assert_eq!(parsed.magnetic_variation, Some(-4.2));
        assert_eq!(parsed.mode, FaaMode::Simulator);
    }

    #[test]
    fn aivdm_build_and_parse() {
        let aivdm = AivdmSentence {
            fragment_count: 1,
            fragment_index: 1,
            group_id: None,
            channel: Channel::A,
            payload: "H".to_string(),
            fill_bits: 0,
        };
        assert_eq!(aivdm.to_sentence(), "!AIVDM,1,1,,A,H,0*72");
        assert_eq!(AivdmSentence::parse("!AIVDM,1,1,,A,H,0*72").unwrap(), aivdm);
    }

    #[test]
    fn aivdm_parse_rejects_bad_fields() {
        // index beyond count
        let body = "AIVDM,1,2,,A,H,0";
        let raw = format!("!{body}*{:02X}", checksum(body));
        assert!(matches!(
            AivdmSentence::parse(&raw),
            Err(SentenceError::Field { index: 1, .. })
        ));
        // group id out of range
        let body = "AIVDM,2,1,12,A,H,0";
        let raw = format!("!{body}*{:02X}", checksum(body));
        assert!(matches!(
            AivdmSentence::parse(&raw),
            Err(SentenceError::Field { index: 2, .. })
        ));
    }

    #[test]
    fn sentences_fit_length_limit() {
        let gga = GgaSentence {
            talker: TalkerId::GP,
            time: NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap(),
            latitude: -89.9999999,
            longitude: -179.9999999,
            fix_quality: 8,
            satellites: 12,
            hdop: 9.9,
            altitude_m: 99.9,
            geoid_separation_m: -9.9,
            dgps_age_secs: Some(9.9),
            dgps_station: Some(120),
        };
        assert!(gga.to_sentence().len() + 2 <= MAX_SENTENCE_LEN);
    }
}
