//! NMEA 0183 / AIS vessel traffic simulator.
//!
//! Loads a YAML scenario, runs the simulation engine, and streams the
//! resulting sentence mix to every configured output. Exit code is zero on a
//! normal stop; configuration errors and sink startup failures are fatal.

mod ais_scheduler;
mod config;
mod engine;
mod outputs;
mod vessel;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use config::{FileOutputConfig, OutputConfig, SimulatorConfig, TcpOutputConfig, UdpOutputConfig};
use engine::Simulator;

#[derive(Parser, Debug)]
#[command(name = "ais-simulator", about = "NMEA 0183 / AIS vessel traffic simulator")]
struct Args {
    /// Scenario configuration file (YAML)
    #[arg(short, long)]
    config: PathBuf,
    /// Override the configured duration, simulation seconds
    #[arg(long)]
    duration: Option<f64>,
    /// Override the configured time factor
    #[arg(long)]
    time_factor: Option<f64>,
    /// Additional output, e.g. file:nmea.log, tcp:0.0.0.0:10110,
    /// udp:255.255.255.255:10111 (repeatable)
    #[arg(long)]
    output: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ais_simulator=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = SimulatorConfig::load(&args.config)?;
    if let Some(duration) = args.duration {
        config.simulation.duration_seconds = Some(duration);
    }
    if let Some(time_factor) = args.time_factor {
        config.simulation.time_factor = time_factor;
    }
    for spec in &args.output {
        config.outputs.push(parse_output_spec(spec)?);
    }
    config.validate().context("invalid configuration")?;

    info!(
        "scenario loaded: {} vessels, {} base stations, {} aids to navigation",
        config.vessels.len(),
        config.base_stations.len(),
        config.aids_to_navigation.len(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let simulator = Simulator::new(&config, shutdown_rx).await?;
    let stats = simulator.run().await;
    info!("done: {stats}");
    Ok(())
}

/// `--output` shorthand: `file:PATH`, `tcp:HOST:PORT`, `udp:HOST:PORT`.
fn parse_output_spec(spec: &str) -> Result<OutputConfig> {
    let (kind, rest) = spec
        .split_once(':')
        .with_context(|| format!("output spec {spec:?} is missing a type prefix"))?;
    match kind {
        "file" => Ok(OutputConfig::File(FileOutputConfig {
            path: PathBuf::from(rest),
            enabled: true,
            auto_flush: true,
            rotation_size_mb: None,
            max_files: 10,
        })),
        "tcp" | "udp" => {
            let (host, port) = rest
                .rsplit_once(':')
                .with_context(|| format!("output spec {spec:?} needs HOST:PORT"))?;
            let port: u16 = port
                .parse()
                .with_context(|| format!("bad port in output spec {spec:?}"))?;
            if kind == "tcp" {
                Ok(OutputConfig::Tcp(TcpOutputConfig {
                    host: host.to_string(),
                    port,
                    enabled: true,
                    max_clients: 10,
                    client_timeout_secs: 30.0,
                    send_timeout_secs: 5.0,
                }))
            } else {
                Ok(OutputConfig::Udp(UdpOutputConfig {
                    host: host.to_string(),
                    port,
                    enabled: true,
                    broadcast: true,
                }))
            }
        }
        other => bail!("unknown output type {other:?} in {spec:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_spec_parsing() {
        assert!(matches!(
            parse_output_spec("file:logs/nmea.log").unwrap(),
            OutputConfig::File(_)
        ));
        match parse_output_spec("tcp:0.0.0.0:10110").unwrap() {
            OutputConfig::Tcp(c) => {
                assert_eq!(c.host, "0.0.0.0");
                assert_eq!(c.port, 10110);
            }
            other => panic!("expected tcp, got {other:?}"),
        }
        match parse_output_spec("udp:255.255.255.255:10111").unwrap() {
            OutputConfig::Udp(c) => assert_eq!(c.port, 10111),
            other => panic!("expected udp, got {other:?}"),
        }
        assert!(parse_output_spec("serial/dev/ttyUSB0").is_err());
        assert!(parse_output_spec("carrier:pigeon").is_err());
        assert!(parse_output_spec("tcp:nohost").is_err());
    }
}
