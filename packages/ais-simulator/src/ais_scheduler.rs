//! AIS reporting cadence.
//!
//! One monotonic next-due timestamp per (entity, report kind), in simulation
//! seconds. Intervals follow the ITU-R M.1371 reporting tables: Class A
//! dynamic reports speed up with SOG (and while turning), Class B reports at
//! 30 s / 3 s, static data goes out every six minutes, base stations every
//! ten seconds, aids to navigation every three minutes.
//!
//! A late engine never bursts: if more than one whole interval was missed,
//! the missed instances are skipped and the timer re-anchors on `now`.

use std::collections::HashMap;

use crate::config::ShipClass;
use crate::vessel::{AidToNavigation, BaseStation, Vessel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Type 1 (Class A) or type 18 (Class B) dynamic report.
    Position,
    /// Type 19 extended Class B report.
    Extended,
    /// Type 5 (Class A) or type 24 A+B (Class B) static data.
    Static,
    /// Type 4 base station report.
    BaseStation,
    /// Type 21 aid-to-navigation report.
    AidToNavigation,
}

pub const STATIC_INTERVAL_SECS: f64 = 360.0;
pub const EXTENDED_B_INTERVAL_SECS: f64 = 360.0;
pub const BASE_STATION_INTERVAL_SECS: f64 = 10.0;
pub const ATON_INTERVAL_SECS: f64 = 180.0;

/// Class A dynamic-report interval for the current state.
pub fn class_a_interval(nav_status: u8, sog_knots: f64, turning: bool) -> f64 {
    // 1 = at anchor, 5 = moored.
    let anchored = matches!(nav_status, 1 | 5);
    if anchored && sog_knots <= 3.0 {
        180.0
    } else if anchored {
        10.0
    } else if sog_knots <= 14.0 {
        10.0
    } else if sog_knots <= 23.0 {
        if turning {
            10.0 / 3.0
        } else {
            6.0
        }
    } else {
        2.0
    }
}

/// Class B dynamic-report interval.
pub fn class_b_interval(sog_knots: f64) -> f64 {
    if sog_knots < 2.0 {
        30.0
    } else {
        3.0
    }
}

#[derive(Debug, Default)]
pub struct AisScheduler {
    next_due: HashMap<(u32, ReportKind), f64>,
}

impl AisScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything due at simulation time `now`, in (mmsi, kind) pairs.
    /// Timers advance as a side effect; each due entry is yielded exactly
    /// once.
    pub fn due_reports(
        &mut self,
        now: f64,
        vessels: &[Vessel],
        base_stations: &[BaseStation],
        aids: &[AidToNavigation],
    ) -> Vec<(u32, ReportKind)> {
        let mut due = Vec::new();

        for v in vessels {
            let dynamic_interval = match v.class {
                ShipClass::A => class_a_interval(v.nav_status, v.sog_knots, v.turning),
                ShipClass::B => class_b_interval(v.sog_knots),
            };
            if self.check(v.mmsi, ReportKind::Position, now, dynamic_interval) {
                due.push((v.mmsi, ReportKind::Position));
            }
            if v.class == ShipClass::B
                && self.check(v.mmsi, ReportKind::Extended, now, EXTENDED_B_INTERVAL_SECS)
            {
                due.push((v.mmsi, ReportKind::Extended));
            }
            if self.check(v.mmsi, ReportKind::Static, now, STATIC_INTERVAL_SECS) {
                due.push((v.mmsi, ReportKind::Static));
            }
        }
        for b in base_stations {
            if self.check(b.mmsi, ReportKind::BaseStation, now, BASE_STATION_INTERVAL_SECS) {
                due.push((b.mmsi, ReportKind::BaseStation));
            }
        }
        for a in aids {
            if self.check(a.mmsi, ReportKind::AidToNavigation, now, ATON_INTERVAL_SECS) {
                due.push((a.mmsi, ReportKind::AidToNavigation));
            }
        }
        due
    }

    fn check(&mut self, mmsi: u32, kind: ReportKind, now: f64, interval: f64) -> bool {
        let next = self.next_due.entry((mmsi, kind)).or_insert(now);
        if now + 1e-9 < *next {
            return false;
        }
        *next = if now - *next > interval {
            // More than one interval behind: skip the missed instances.
            now + interval
        } else {
            *next + interval
        };
        true
    }
}
