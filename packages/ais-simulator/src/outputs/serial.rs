//! Serial sink: blocking writes on a dedicated task.
//!
//! The `serialport` API is synchronous, so this sink runs on a blocking task
//! and pulls from the bus with `blocking_recv`. A failed write closes the
//! port and enters the reconnect loop: retry every `reconnect_delay_secs`,
//! up to `max_reconnect_attempts` (negative retries forever). Sentences that
//! arrive while the port is down back up on the bus ring and surface as
//! dropped once the sink resumes.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serialport::SerialPort;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Sentence, SinkCounters};
use crate::config::{FlowControlConfig, ParityConfig, SerialOutputConfig};

fn data_bits(bits: u8) -> serialport::DataBits {
    match bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        _ => serialport::DataBits::Eight,
    }
}

fn parity(p: ParityConfig) -> serialport::Parity {
    match p {
        ParityConfig::None => serialport::Parity::None,
        ParityConfig::Odd => serialport::Parity::Odd,
        ParityConfig::Even => serialport::Parity::Even,
    }
}

fn stop_bits(bits: u8) -> serialport::StopBits {
    match bits {
        2 => serialport::StopBits::Two,
        _ => serialport::StopBits::One,
    }
}

fn flow_control(f: FlowControlConfig) -> serialport::FlowControl {
    match f {
        FlowControlConfig::None => serialport::FlowControl::None,
        FlowControlConfig::Software => serialport::FlowControl::Software,
        FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
    }
}

/// Open the device. Failure here is fatal at startup; later failures go
/// through the reconnect loop instead.
pub fn open(cfg: &SerialOutputConfig) -> Result<Box<dyn SerialPort>> {
    serialport::new(&cfg.port, cfg.baud_rate)
        .data_bits(data_bits(cfg.data_bits))
        .parity(parity(cfg.parity))
        .stop_bits(stop_bits(cfg.stop_bits))
        .flow_control(flow_control(cfg.flow_control))
        .timeout(Duration::from_secs(1))
        .open()
        .with_context(|| format!("opening serial port {}", cfg.port))
}

pub fn spawn(
    port: Box<dyn SerialPort>,
    cfg: SerialOutputConfig,
    rx: broadcast::Receiver<Sentence>,
    counters: Arc<SinkCounters>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || run_blocking(port, cfg, rx, counters))
}

fn run_blocking(
    port: Box<dyn SerialPort>,
    cfg: SerialOutputConfig,
    mut rx: broadcast::Receiver<Sentence>,
    counters: Arc<SinkCounters>,
) {
    let send_interval = Duration::from_millis(cfg.send_interval_ms);
    let line_ending = cfg.line_ending.clone();
    let mut port = Some(port);
    let mut last_send: Option<Instant> = None;

    loop {
        match rx.blocking_recv() {
            Ok(sentence) => {
                let Some(active) = port.as_mut() else {
                    match reconnect(&cfg) {
                        Some(reopened) => port = Some(reopened),
                        None => {
                            counters.add_dropped(1);
                            continue;
                        }
                    };
                    counters.add_dropped(1); // the triggering sentence is lost
                    continue;
                };

                if let Some(last) = last_send {
                    let since = last.elapsed();
                    if since < send_interval {
                        thread::sleep(send_interval - since);
                    }
                }

                let write = active
                    .write_all(sentence.as_bytes())
                    .and_then(|_| active.write_all(line_ending.as_bytes()))
                    .and_then(|_| active.flush());
                match write {
                    Ok(()) => {
                        counters.add_sent(1);
                        last_send = Some(Instant::now());
                    }
                    Err(e) => {
                        warn!("serial write on {} failed: {e}", cfg.port);
                        counters.add_dropped(1);
                        port = None; // close and reconnect on the next sentence
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => counters.add_dropped(n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// One full reconnect cycle. Returns the reopened port, or `None` once the
/// attempt budget is spent.
fn reconnect(cfg: &SerialOutputConfig) -> Option<Box<dyn SerialPort>> {
    let delay = Duration::from_secs_f64(cfg.reconnect_delay_secs);
    let mut attempts = 0i32;
    loop {
        if cfg.max_reconnect_attempts >= 0 && attempts >= cfg.max_reconnect_attempts {
            warn!(
                "serial {}: giving up after {attempts} reconnect attempts",
                cfg.port
            );
            return None;
        }
        thread::sleep(delay);
        attempts += 1;
        match open(cfg) {
            Ok(port) => {
                info!("serial {}: reconnected after {attempts} attempts", cfg.port);
                return Some(port);
            }
            Err(e) => warn!("serial {}: reconnect attempt {attempts} failed: {e:#}", cfg.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_to_serialport_options() {
        assert_eq!(data_bits(7), serialport::DataBits::Seven);
        assert_eq!(data_bits(8), serialport::DataBits::Eight);
        assert_eq!(parity(ParityConfig::Even), serialport::Parity::Even);
        assert_eq!(stop_bits(2), serialport::StopBits::Two);
        assert_eq!(
            flow_control(FlowControlConfig::Hardware),
            serialport::FlowControl::Hardware
        );
    }

    #[test]
    fn opening_a_missing_device_fails() {
        let cfg = SerialOutputConfig {
            port: "/dev/does-not-exist-9999".into(),
            baud_rate: 9600,
            enabled: true,
            data_bits: 8,
            parity: ParityConfig::None,
            stop_bits: 1,
            flow_control: FlowControlConfig::None,
            send_interval_ms: 0,
            reconnect_delay_secs: 0.01,
            max_reconnect_attempts: 2,
            line_ending: "\r\n".into(),
        };
        assert!(open(&cfg).is_err());
        assert!(reconnect(&cfg).is_none());
    }
}
