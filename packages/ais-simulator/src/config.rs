//! YAML scenario configuration.
//!
//! The file describes the simulated population (vessels, base stations, aids
//! to navigation), the GPS sentences to emit, and the output sinks. Loading
//! and validation happen once at startup; any violation is fatal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use nmea_core::ais::Dimensions;
use nmea_core::TalkerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub vessels: Vec<VesselConfig>,
    #[serde(default)]
    pub base_stations: Vec<BaseStationConfig>,
    #[serde(default)]
    pub aids_to_navigation: Vec<AidConfig>,
    #[serde(default = "default_sentences")]
    pub sentences: Vec<SentenceConfig>,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Simulation-clock seconds to run; `None` runs until interrupted.
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default = "default_time_factor")]
    pub time_factor: f64,
    /// UTC start of the simulation clock; `None` uses the wall clock.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Engine tick frequency.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,
}

fn default_time_factor() -> f64 {
    1.0
}

fn default_tick_hz() -> f64 {
    10.0
}

/// Geographic position in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ShipClass {
    A,
    B,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VesselConfig {
    pub mmsi: u32,
    pub name: String,
    #[serde(default)]
    pub callsign: String,
    #[serde(default = "default_class")]
    pub class: ShipClass,
    #[serde(default = "default_ship_type")]
    pub ship_type: u8,
    #[serde(default)]
    pub imo: u32,
    pub position: LatLon,
    #[serde(default)]
    pub initial_speed: f64,
    #[serde(default)]
    pub initial_heading: f64,
    /// Class A navigation status, 0–15.
    #[serde(default)]
    pub nav_status: u8,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub voyage_data: Option<VoyageConfig>,
}

fn default_class() -> ShipClass {
    ShipClass::A
}

fn default_ship_type() -> u8 {
    70 // cargo
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    #[serde(flatten)]
    pub pattern: MovementPattern,
    /// Bound of the per-second speed perturbation, knots.
    #[serde(default)]
    pub speed_variation: f64,
    /// Bound of the per-second course perturbation, degrees.
    #[serde(default)]
    pub course_variation: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        MovementConfig {
            pattern: MovementPattern::Linear,
            speed_variation: 0.0,
            course_variation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum MovementPattern {
    /// Hold the initial course.
    Linear,
    /// Orbit `center` at a fixed radius.
    Circular { center: LatLon, radius_nm: f64 },
    /// Bounce the course off a bounding box.
    RandomWalk { bounds: BoundsConfig },
    /// Steer through a list of waypoints, wrapping at the end.
    Waypoint {
        waypoints: Vec<LatLon>,
        #[serde(default = "default_waypoint_tolerance")]
        tolerance_nm: f64,
    },
}

fn default_waypoint_tolerance() -> f64 {
    0.1
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundsConfig {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoyageConfig {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub draught: f64,
    #[serde(default)]
    pub eta_month: u8,
    #[serde(default)]
    pub eta_day: u8,
    #[serde(default = "default_eta_hour")]
    pub eta_hour: u8,
    #[serde(default = "default_eta_minute")]
    pub eta_minute: u8,
}

fn default_eta_hour() -> u8 {
    24 // not available
}

fn default_eta_minute() -> u8 {
    60 // not available
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseStationConfig {
    pub mmsi: u32,
    #[serde(default)]
    pub name: String,
    pub position: LatLon,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AidConfig {
    pub mmsi: u32,
    pub name: String,
    /// Aid type per the M.1371 table (13 = port-hand mark, 14 = starboard, …).
    #[serde(default)]
    pub aid_type: u8,
    #[serde(default)]
    pub virtual_aid: bool,
    pub position: LatLon,
    #[serde(default)]
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SentenceKind {
    GGA,
    RMC,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentenceConfig {
    #[serde(rename = "type")]
    pub kind: SentenceKind,
    #[serde(default)]
    pub talker_id: TalkerId,
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_rate_hz() -> f64 {
    1.0
}

fn default_sentences() -> Vec<SentenceConfig> {
    vec![
        SentenceConfig {
            kind: SentenceKind::GGA,
            talker_id: TalkerId::GP,
            rate_hz: 1.0,
            enabled: true,
        },
        SentenceConfig {
            kind: SentenceKind::RMC,
            talker_id: TalkerId::GP,
            rate_hz: 1.0,
            enabled: true,
        },
    ]
}

fn default_true() -> bool {
    true
}

// ── Output sinks ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    File(FileOutputConfig),
    Tcp(TcpOutputConfig),
    Udp(UdpOutputConfig),
    Serial(SerialOutputConfig),
}

impl OutputConfig {
    pub fn enabled(&self) -> bool {
        match self {
            OutputConfig::File(c) => c.enabled,
            OutputConfig::Tcp(c) => c.enabled,
            OutputConfig::Udp(c) => c.enabled,
            OutputConfig::Serial(c) => c.enabled,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileOutputConfig {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub auto_flush: bool,
    /// Rotate once the live file reaches this size; `None` never rotates.
    #[serde(default)]
    pub rotation_size_mb: Option<f64>,
    /// Files retained in total, the live file included.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_max_files() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct TcpOutputConfig {
    #[serde(default = "default_bind_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Drop clients with no write progress for this long.
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: f64,
    /// Per-write deadline before a client is considered hung.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: f64,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_clients() -> usize {
    10
}

fn default_client_timeout() -> f64 {
    30.0
}

fn default_send_timeout() -> f64 {
    5.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct UdpOutputConfig {
    #[serde(default = "default_udp_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub broadcast: bool,
}

fn default_udp_host() -> String {
    "255.255.255.255".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialOutputConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
    /// Minimum gap between writes, milliseconds.
    #[serde(default)]
    pub send_interval_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: f64,
    /// Negative retries forever.
    #[serde(default = "default_reconnect_attempts")]
    pub max_reconnect_attempts: i32,
    /// Appended to every sentence on the wire.
    #[serde(default = "default_line_ending")]
    pub line_ending: String,
}

fn default_line_ending() -> String {
    "\r\n".to_string()
}

fn default_baud() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_reconnect_delay() -> f64 {
    5.0
}

fn default_reconnect_attempts() -> i32 {
    5
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Software,
    Hardware,
}

// ── Loading & validation ──────────────────────────────────────────────────────

impl SimulatorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SimulatorConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if sim.time_factor <= 0.0 {
            bail!("simulation.time_factor must be positive");
        }
        if sim.tick_hz <= 0.0 {
            bail!("simulation.tick_hz must be positive");
        }
        if matches!(sim.duration_seconds, Some(d) if d <= 0.0) {
            bail!("simulation.duration_seconds must be positive");
        }

        let mut seen = HashSet::new();
        let stations = self
            .base_stations
            .iter()
            .map(|b| ("base station", b.mmsi, b.position));
        let aids = self
            .aids_to_navigation
            .iter()
            .map(|a| ("aid to navigation", a.mmsi, a.position));
        for (what, mmsi, position) in stations.chain(aids) {
            check_mmsi(what, mmsi)?;
            check_position(what, mmsi, position)?;
            if !seen.insert(mmsi) {
                bail!("duplicate MMSI {mmsi}");
            }
        }

        for v in &self.vessels {
            check_mmsi("vessel", v.mmsi)?;
            check_position("vessel", v.mmsi, v.position)?;
            if !seen.insert(v.mmsi) {
                bail!("duplicate MMSI {}", v.mmsi);
            }
            if v.initial_speed < 0.0 {
                bail!("vessel {}: initial_speed is negative", v.mmsi);
            }
            if !(0.0..360.0).contains(&v.initial_heading) {
                bail!("vessel {}: initial_heading outside [0, 360)", v.mmsi);
            }
            if v.ship_type > 99 {
                bail!("vessel {}: ship_type outside 0..=99", v.mmsi);
            }
            if v.nav_status > 15 {
                bail!("vessel {}: nav_status outside 0..=15", v.mmsi);
            }
            if v.movement.speed_variation < 0.0 || v.movement.course_variation < 0.0 {
                bail!("vessel {}: movement variations must be non-negative", v.mmsi);
            }
            match &v.movement.pattern {
                MovementPattern::Circular { radius_nm, .. } if *radius_nm <= 0.0 => {
                    bail!("vessel {}: circular radius_nm must be positive", v.mmsi)
                }
                MovementPattern::RandomWalk { bounds } => {
                    if bounds.min_lat >= bounds.max_lat || bounds.min_lon >= bounds.max_lon {
                        bail!("vessel {}: random_walk bounds are inverted", v.mmsi);
                    }
                }
                MovementPattern::Waypoint { waypoints, .. } if waypoints.is_empty() => {
                    bail!("vessel {}: waypoint pattern needs at least one waypoint", v.mmsi)
                }
                _ => {}
            }
            if let Some(voyage) = &v.voyage_data {
                if voyage.destination.len() > 20 {
                    bail!("vessel {}: destination exceeds 20 characters", v.mmsi);
                }
                if !(0.0..=25.5).contains(&voyage.draught) {
                    bail!("vessel {}: draught outside 0..=25.5 m", v.mmsi);
                }
            }
        }

        for a in &self.aids_to_navigation {
            if a.aid_type > 31 {
                bail!("aid to navigation {}: aid_type outside 0..=31", a.mmsi);
            }
        }

        for s in &self.sentences {
            if s.rate_hz <= 0.0 {
                bail!("sentences: rate_hz must be positive");
            }
        }

        if !self.outputs.iter().any(|o| o.enabled()) {
            bail!("at least one enabled output is required");
        }
        for o in &self.outputs {
            match o {
                OutputConfig::File(c) => {
                    if c.max_files == 0 {
                        bail!("file output: max_files must be at least 1");
                    }
                    if matches!(c.rotation_size_mb, Some(mb) if mb <= 0.0) {
                        bail!("file output: rotation_size_mb must be positive");
                    }
                }
                OutputConfig::Serial(c) => {
                    if !(5..=8).contains(&c.data_bits) {
                        bail!("serial output: data_bits outside 5..=8");
                    }
                    if !(1..=2).contains(&c.stop_bits) {
                        bail!("serial output: stop_bits outside 1..=2");
                    }
                    if c.line_ending.is_empty() || !c.line_ending.is_ascii() {
                        bail!("serial output: line_ending must be non-empty ASCII");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn check_mmsi(what: &str, mmsi: u32) -> Result<()> {
    if mmsi == 0 || mmsi > 999_999_999 {
        bail!("{what} MMSI {mmsi} is not a 9-digit identifier");
    }
    Ok(())
}

fn check_position(what: &str, mmsi: u32, position: LatLon) -> Result<()> {
    if position.lat.abs() > 90.0 || position.lon.abs() > 180.0 {
        bail!("{what} {mmsi}: position outside the WGS-84 envelope");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
simulation:
  duration_seconds: 300
  time_factor: 1.0
  tick_hz: 10

vessels:
  - mmsi: 367001234
    name: EVER FORWARD
    callsign: WDD8888
    class: A
    ship_type: 70
    position: { lat: 37.8, lon: -122.4 }
    initial_speed: 12.0
    initial_heading: 90.0
    dimensions: { to_bow: 200, to_stern: 100, to_port: 20, to_starboard: 20 }
    movement:
      pattern: waypoint
      waypoints:
        - { lat: 37.9, lon: -122.3 }
        - { lat: 37.95, lon: -122.2 }
      speed_variation: 0.5
      course_variation: 2.0
    voyage_data:
      destination: OAKLAND
      draught: 12.5
      eta_month: 6
      eta_day: 15
      eta_hour: 8
      eta_minute: 30
  - mmsi: 338123456
    name: BAY ROAMER
    class: B
    ship_type: 37
    position: { lat: 37.85, lon: -122.38 }
    initial_speed: 5.5
    initial_heading: 200.0
    movement:
      pattern: circular
      center: { lat: 37.86, lon: -122.37 }
      radius_nm: 0.8

base_stations:
  - mmsi: 3669705
    name: SF VTS
    position: { lat: 37.81, lon: -122.465 }

aids_to_navigation:
  - mmsi: 993672001
    name: ALCATRAZ LIGHT
    aid_type: 14
    position: { lat: 37.8267, lon: -122.4229 }

sentences:
  - type: GGA
    talker_id: GP
    rate_hz: 1.0
  - type: RMC
    talker_id: GP
    rate_hz: 0.5

outputs:
  - type: file
    path: out/nmea.log
    rotation_size_mb: 10
    max_files: 3
  - type: tcp
    host: 0.0.0.0
    port: 10110
    max_clients: 5
  - type: udp
    host: 255.255.255.255
    port: 10111
    broadcast: true
  - type: serial
    port: /dev/ttyUSB0
    baud_rate: 38400
    enabled: false
"#;

    #[test]
    fn full_scenario_parses_and_validates() {
        let config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.validate().unwrap();
        assert_eq!(config.vessels.len(), 2);
        assert_eq!(config.vessels[0].class, ShipClass::A);
        assert!(matches!(
            config.vessels[1].movement.pattern,
            MovementPattern::Circular { .. }
        ));
        assert_eq!(config.sentences.len(), 2);
        assert_eq!(config.outputs.len(), 4);
        assert!(!config.outputs[3].enabled());
    }

    #[test]
    fn duplicate_mmsi_is_rejected() {
        let mut config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.vessels[1].mmsi = config.vessels[0].mmsi;
        assert!(config.validate().unwrap_err().to_string().contains("duplicate MMSI"));
    }

    #[test]
    fn ten_digit_mmsi_is_rejected() {
        let mut config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.vessels[0].mmsi = 1_000_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_outputs_are_rejected() {
        let mut config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.outputs.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_draught_is_rejected() {
        let mut config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.vessels[0].voyage_data.as_mut().unwrap().draught = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn serial_line_ending_is_validated() {
        let mut config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        let OutputConfig::Serial(serial) = &mut config.outputs[3] else {
            panic!("expected serial output");
        };
        assert_eq!(serial.line_ending, "\r\n");
        serial.enabled = true;
        serial.line_ending = String::new();
        assert!(config.validate().is_err());

        let mut config: SimulatorConfig = serde_yaml::from_str(SCENARIO).unwrap();
        let OutputConfig::Serial(serial) = &mut config.outputs[3] else {
            panic!("expected serial output");
        };
        serial.enabled = true;
        serial.line_ending = "é".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_fill_in() {
        let minimal = r#"
simulation: {}
vessels:
  - mmsi: 367000001
    name: TEST
    position: { lat: 0.0, lon: 0.0 }
outputs:
  - type: udp
    port: 10110
"#;
        let config: SimulatorConfig = serde_yaml::from_str(minimal).unwrap();
        config.validate().unwrap();
        assert_eq!(config.simulation.time_factor, 1.0);
        assert_eq!(config.simulation.tick_hz, 10.0);
        assert_eq!(config.sentences.len(), 2);
        match &config.outputs[0] {
            OutputConfig::Udp(u) => {
                assert_eq!(u.host, "255.255.255.255");
                assert!(u.broadcast);
            }
            other => panic!("expected udp output, got {other:?}"),
        }
    }
}
