//! The simulation engine: a single tick loop that owns all mutable state.
//!
//! Each tick advances the simulation clock by `dt · time_factor`, moves the
//! fleet, emits due GPS sentences, asks the AIS scheduler what is due,
//! encodes/fragments/wraps those reports, and publishes every sentence to
//! the output bus. Nothing else mutates vessels, timers, or counters — the
//! sinks only ever see immutable sentence values.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use nmea_core::sentence::{Channel, FaaMode, GgaSentence, RmcSentence};
use nmea_core::{AisMessage, GroupIdAllocator};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use anyhow::Result;

use crate::ais_scheduler::{AisScheduler, ReportKind};
use crate::config::{SentenceConfig, SentenceKind, SimulatorConfig};
use crate::outputs::{self, SinkHandle, Sentence, BUS_CAPACITY};
use crate::vessel::{AidToNavigation, BaseStation, Vessel};

/// Engine lifecycle. Transitions only move forward and are idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    pub ticks: u64,
    pub gps_sentences: u64,
    pub ais_sentences: u64,
    pub encode_errors: u64,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} gps={} ais={} encode_errors={}",
            self.ticks, self.gps_sentences, self.ais_sentences, self.encode_errors
        )
    }
}

pub struct SimulationEngine {
    vessels: Vec<Vessel>,
    base_stations: Vec<BaseStation>,
    aids: Vec<AidToNavigation>,
    sentences: Vec<SentenceConfig>,
    scheduler: AisScheduler,
    /// Per (vessel, sentence type) GPS cadence timers, simulation seconds.
    gps_next_due: HashMap<(u32, SentenceKind), f64>,
    groups: GroupIdAllocator,
    next_channel: Channel,
    start_time: DateTime<Utc>,
    sim_elapsed: f64,
    duration: Option<f64>,
    tick_hz: f64,
    time_factor: f64,
    state: EngineState,
    stats: EngineStats,
    bus: broadcast::Sender<Sentence>,
}

impl SimulationEngine {
    pub fn new(config: &SimulatorConfig, bus: broadcast::Sender<Sentence>) -> SimulationEngine {
        SimulationEngine {
            vessels: config.vessels.iter().map(Vessel::from_config).collect(),
            base_stations: config
                .base_stations
                .iter()
                .map(BaseStation::from_config)
                .collect(),
            aids: config
                .aids_to_navigation
                .iter()
                .map(AidToNavigation::from_config)
                .collect(),
            sentences: config.sentences.clone(),
            scheduler: AisScheduler::new(),
            gps_next_due: HashMap::new(),
            groups: GroupIdAllocator::new(),
            next_channel: Channel::A,
            start_time: config.simulation.start_time.unwrap_or_else(Utc::now),
            sim_elapsed: 0.0,
            duration: config.simulation.duration_seconds,
            tick_hz: config.simulation.tick_hz,
            time_factor: config.simulation.time_factor,
            state: EngineState::Created,
            stats: EngineStats::default(),
            bus,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the tick loop until the configured duration elapses or shutdown
    /// is signalled. Ticks that cannot keep up are skipped, not bunched.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> EngineStats {
        let wall_dt = std::time::Duration::from_secs_f64(1.0 / self.tick_hz);
        let dt = self.time_factor / self.tick_hz;
        let mut ticker = tokio::time::interval(wall_dt);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.state = EngineState::Running;
        info!(
            "engine running: {} vessels, {} base stations, {} aids, {} Hz, time factor {}",
            self.vessels.len(),
            self.base_stations.len(),
            self.aids.len(),
            self.tick_hz,
            self.time_factor,
        );

        let mut last_report = Instant::now();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.tick(dt) {
                        info!("configured duration reached");
                        break;
                    }
                    if last_report.elapsed().as_secs() >= 5 {
                        info!("t={:.1}s {}", self.sim_elapsed, self.stats);
                        last_report = Instant::now();
                    }
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        self.state = EngineState::Stopping;
        // Producing has stopped; the caller closes the bus and drains sinks.
        self.state = EngineState::Stopped;
        info!("engine stopped at t={:.1}s: {}", self.sim_elapsed, self.stats);
        self.stats
    }

    /// One simulation step. Returns true once the configured duration is
    /// reached.
    fn tick(&mut self, dt: f64) -> bool {
        self.sim_elapsed += dt;
        self.stats.ticks += 1;
        if matches!(self.duration, Some(limit) if self.sim_elapsed >= limit) {
            return true;
        }
        let utc = self.utc();

        let mut rng = rand::thread_rng();
        for vessel in &mut self.vessels {
            vessel.tick(dt, &mut rng);
        }

        self.emit_gps(utc);
        self.emit_ais(utc);
        false
    }

    fn utc(&self) -> DateTime<Utc> {
        self.start_time + ChronoDuration::milliseconds((self.sim_elapsed * 1000.0).round() as i64)
    }

    fn emit_gps(&mut self, utc: DateTime<Utc>) {
        let mut produced = Vec::new();
        for sentence_cfg in self.sentences.iter().filter(|s| s.enabled) {
            let interval = 1.0 / sentence_cfg.rate_hz;
            for vessel in &self.vessels {
                let key = (vessel.mmsi, sentence_cfg.kind);
                if !cadence_due(&mut self.gps_next_due, key, self.sim_elapsed, interval) {
                    continue;
                }
                let line = match sentence_cfg.kind {
                    SentenceKind::GGA => GgaSentence {
                        talker: sentence_cfg.talker_id,
                        time: utc.time(),
                        latitude: vessel.position.lat,
                        longitude: vessel.position.lon,
                        fix_quality: 1,
                        satellites: 10,
                        hdop: 0.9,
                        altitude_m: 0.0,
                        geoid_separation_m: 0.0,
                        dgps_age_secs: None,
                        dgps_station: None,
                    }
                    .to_sentence(),
                    SentenceKind::RMC => RmcSentence {
                        talker: sentence_cfg.talker_id,
                        time: utc.time(),
                        status_active: true,
                        latitude: vessel.position.lat,
                        longitude: vessel.position.lon,
                        sog_knots: vessel.sog_knots,
                        cog_degrees: vessel.cog_degrees,
                        date: utc.date_naive(),
                        magnetic_variation: None,
                        mode: FaaMode::Autonomous,
                    }
                    .to_sentence(),
                };
                produced.push(line);
            }
        }
        for line in produced {
            self.stats.gps_sentences += 1;
            self.publish(line);
        }
    }

    fn emit_ais(&mut self, utc: DateTime<Utc>) {
        let due = self.scheduler.due_reports(
            self.sim_elapsed,
            &self.vessels,
            &self.base_stations,
            &self.aids,
        );
        let second = utc.second().min(59) as u8;

        let mut messages: Vec<AisMessage> = Vec::new();
        for (mmsi, kind) in due {
            match kind {
                ReportKind::Position => {
                    if let Some(v) = self.vessels.iter().find(|v| v.mmsi == mmsi) {
                        messages.push(v.position_report(second));
                    }
                }
                ReportKind::Extended => {
                    if let Some(v) = self.vessels.iter().find(|v| v.mmsi == mmsi) {
                        messages.push(v.extended_report(second));
                    }
                }
                ReportKind::Static => {
                    if let Some(v) = self.vessels.iter().find(|v| v.mmsi == mmsi) {
                        messages.extend(v.static_reports());
                    }
                }
                ReportKind::BaseStation => {
                    if let Some(b) = self.base_stations.iter().find(|b| b.mmsi == mmsi) {
                        messages.push(b.report(utc));
                    }
                }
                ReportKind::AidToNavigation => {
                    if let Some(a) = self.aids.iter().find(|a| a.mmsi == mmsi) {
                        messages.push(a.report(second));
                    }
                }
            }
        }

        for message in messages {
            let bits = match message.encode() {
                Ok(bits) => bits,
                Err(e) => {
                    // Bad field: report and skip this emission, keep running.
                    warn!("encode failed for mmsi {} type {}: {e}", message.mmsi(), message.message_type());
                    self.stats.encode_errors += 1;
                    continue;
                }
            };
            let channel = self.next_channel;
            self.next_channel = channel.other();
            // Fragments of one message go out back to back, never
            // interleaved with anything else.
            for fragment in nmea_core::fragment::fragment(&bits, channel, &mut self.groups) {
                self.stats.ais_sentences += 1;
                self.publish(fragment.to_sentence());
            }
        }
    }

    fn publish(&mut self, line: String) {
        // Send only fails with zero receivers; sinks count their own drops.
        let _ = self.bus.send(line.into());
    }
}

/// Same skip discipline as the AIS scheduler: a timer more than one interval
/// behind re-anchors on `now` instead of bursting.
fn cadence_due(
    timers: &mut HashMap<(u32, SentenceKind), f64>,
    key: (u32, SentenceKind),
    now: f64,
    interval: f64,
) -> bool {
    let next = timers.entry(key).or_insert(now);
    if now + 1e-9 < *next {
        return false;
    }
    *next = if now - *next > interval {
        now + interval
    } else {
        *next + interval
    };
    true
}

// ── Simulator context ─────────────────────────────────────────────────────────

/// Owns the engine, the bus, and the sink tasks for one simulation run.
pub struct Simulator {
    engine: SimulationEngine,
    sinks: Vec<SinkHandle>,
    bus: broadcast::Sender<Sentence>,
    shutdown: watch::Receiver<bool>,
}

impl Simulator {
    /// Bring up the sinks and build the engine. Sink startup failures (bind,
    /// open) abort here.
    pub async fn new(
        config: &SimulatorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Simulator> {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let sinks = outputs::spawn_sinks(&config.outputs, &bus).await?;
        let engine = SimulationEngine::new(config, bus.clone());
        Ok(Simulator {
            engine,
            sinks,
            bus,
            shutdown,
        })
    }

    /// Run to completion, then close the bus and drain the sinks.
    pub async fn run(self) -> EngineStats {
        let stats = self.engine.run(self.shutdown).await;
        // Dropping every sender closes the bus; sinks drain their backlog
        // and exit on `Closed`.
        drop(self.bus);
        outputs::shutdown_sinks(self.sinks).await;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmea_core::sentence::{validate, AivdmSentence};
    use nmea_core::{fragment::reassemble, BitBuffer};

    fn scenario() -> SimulatorConfig {
        serde_yaml::from_str(
            r#"
simulation:
  duration_seconds: 120
  time_factor: 1.0
  tick_hz: 10
vessels:
  - mmsi: 367001234
    name: EVER FORWARD
    callsign: WDD8888
    class: A
    ship_type: 70
    position: { lat: 37.8, lon: -122.4 }
    initial_speed: 10.0
    initial_heading: 90.0
    voyage_data:
      destination: OAKLAND
      draught: 12.5
  - mmsi: 338123456
    name: BAY ROAMER
    class: B
    ship_type: 37
    position: { lat: 37.85, lon: -122.38 }
    initial_speed: 1.0
    initial_heading: 200.0
sentences:
  - type: GGA
    rate_hz: 1.0
  - type: RMC
    rate_hz: 1.0
outputs:
  - type: udp
    port: 10199
"#,
        )
        .unwrap()
    }

    /// Drive the engine tick-by-tick and collect everything it publishes.
    fn run_ticks(engine: &mut SimulationEngine, rx: &mut broadcast::Receiver<Sentence>, secs: f64) -> Vec<String> {
        let dt = 0.1;
        let mut out = Vec::new();
        for _ in 0..(secs / dt).round() as u64 {
            engine.tick(dt);
            while let Ok(line) = rx.try_recv() {
                out.push(line.to_string());
            }
        }
        out
    }

    #[test]
    fn every_emitted_sentence_passes_checksum() {
        let config = scenario();
        let (bus, mut rx) = broadcast::channel(BUS_CAPACITY);
        let mut engine = SimulationEngine::new(&config, bus);
        let lines = run_ticks(&mut engine, &mut rx, 30.0);
        assert!(!lines.is_empty());
        for line in &lines {
            validate(line).unwrap_or_else(|e| panic!("{line}: {e}"));
            assert!(line.len() + 2 <= nmea_core::sentence::MAX_SENTENCE_LEN);
        }
    }

    #[test]
    fn gps_and_ais_cadences_hold() {
        let config = scenario();
        let (bus, mut rx) = broadcast::channel(BUS_CAPACITY);
        let mut engine = SimulationEngine::new(&config, bus);
        let lines = run_ticks(&mut engine, &mut rx, 60.0);

        let gga = lines.iter().filter(|l| l.starts_with("$GPGGA")).count();
        let rmc = lines.iter().filter(|l| l.starts_with("$GPRMC")).count();
        // Two vessels at 1 Hz over 60 s.
        assert!((118..=122).contains(&gga), "{gga} GGA sentences");
        assert!((118..=122).contains(&rmc), "{rmc} RMC sentences");

        // Class A at 10 kn reports every 10 s; the Class B at 1 kn every 30 s.
        let aivdm: Vec<AivdmSentence> = lines
            .iter()
            .filter(|l| l.starts_with("!AIVDM"))
            .map(|l| AivdmSentence::parse(l).unwrap())
            .collect();
        let type_1 = aivdm
            .iter()
            .filter(|s| s.fragment_index == 1 && s.payload.starts_with('1'))
            .count();
        let type_18 = aivdm
            .iter()
            .filter(|s| s.fragment_index == 1 && s.payload.starts_with('B'))
            .count();
        assert!((6..=7).contains(&type_1), "{type_1} type 1 reports");
        assert!((2..=3).contains(&type_18), "{type_18} type 18 reports");
    }

    #[test]
    fn multipart_fragments_are_contiguous_and_decode() {
        let config = scenario();
        let (bus, mut rx) = broadcast::channel(BUS_CAPACITY);
        let mut engine = SimulationEngine::new(&config, bus);
        let lines = run_ticks(&mut engine, &mut rx, 5.0);

        // The Class A static report (type 5, 424 bits) must appear as two
        // back-to-back fragments.
        let mut found = false;
        let mut i = 0;
        let aivdm: Vec<AivdmSentence> = lines
            .iter()
            .filter(|l| l.starts_with("!AIVDM"))
            .map(|l| AivdmSentence::parse(l).unwrap())
            .collect();
        while i < aivdm.len() {
            if aivdm[i].fragment_count == 2 {
                let first = &aivdm[i];
                let second = &aivdm[i + 1];
                assert_eq!(first.fragment_index, 1);
                assert_eq!(second.fragment_index, 2);
                assert_eq!(first.channel, second.channel);
                assert!(first.group_id.is_some());
                assert_eq!(first.group_id, second.group_id);

                let bits: BitBuffer =
                    reassemble(&[first.clone(), second.clone()]).unwrap();
                match AisMessage::decode(&bits).unwrap() {
                    AisMessage::StaticAndVoyage(v) => {
                        assert_eq!(v.mmsi, 367_001_234);
                        assert_eq!(v.destination, "OAKLAND");
                        assert_eq!(v.draught_m, 12.5);
                    }
                    other => panic!("expected type 5, got {other:?}"),
                }
                found = true;
                i += 2;
            } else {
                i += 1;
            }
        }
        assert!(found, "no multi-part message observed");
    }

    #[test]
    fn ais_channels_alternate() {
        let config = scenario();
        let (bus, mut rx) = broadcast::channel(BUS_CAPACITY);
        let mut engine = SimulationEngine::new(&config, bus);
        let lines = run_ticks(&mut engine, &mut rx, 1.0);
        let channels: Vec<Channel> = lines
            .iter()
            .filter(|l| l.starts_with("!AIVDM"))
            .map(|l| AivdmSentence::parse(l).unwrap())
            .filter(|s| s.fragment_index == 1)
            .map(|s| s.channel)
            .collect();
        assert!(channels.len() >= 2);
        for pair in channels.windows(2) {
            assert_ne!(pair[0], pair[1], "channels must alternate per message");
        }
    }

    #[test]
    fn duration_limit_stops_the_engine() {
        let mut config = scenario();
        config.simulation.duration_seconds = Some(1.0);
        let (bus, _rx) = broadcast::channel(BUS_CAPACITY);
        let mut engine = SimulationEngine::new(&config, bus);
        let mut done = false;
        for _ in 0..20 {
            if engine.tick(0.1) {
                done = true;
                break;
            }
        }
        assert!(done, "engine never reported completion");
    }

    #[tokio::test]
    async fn run_honors_shutdown_signal() {
        let mut config = scenario();
        config.simulation.duration_seconds = None;
        let (bus, _rx) = broadcast::channel(BUS_CAPACITY);
        let engine = SimulationEngine::new(&config, bus);
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(engine.run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let stats = tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("engine should stop promptly")
            .unwrap();
        assert!(stats.ticks > 0);
    }
}
