//! Output sinks and the fan-out bus.
//!
//! The engine publishes every sentence to a single `tokio::sync::broadcast`
//! channel; each sink owns its own receiver and drains it at its own pace.
//! The engine's send never blocks. A sink that falls behind loses the oldest
//! sentences — the broadcast ring reports the count as `Lagged(n)`, which
//! feeds the sink's `dropped` counter. I/O errors stay inside the sink task:
//! transient ones are retried per each sink's policy, only startup failures
//! (bind, open) are fatal.

mod file;
mod serial;
mod tcp;
mod udp;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::OutputConfig;

/// Sentences buffered per receiver before the oldest are dropped.
pub const BUS_CAPACITY: usize = 2048;

/// How long shutdown waits for sinks to drain their backlog.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Sentences travel the bus framed-but-unterminated; sinks own line endings.
pub type Sentence = Arc<str>;

/// Shared per-sink counters, owned by the sink task and read at shutdown.
#[derive(Debug, Default)]
pub struct SinkCounters {
    pub sent: AtomicU64,
    pub dropped: AtomicU64,
}

impl SinkCounters {
    pub fn add_sent(&self, n: u64) {
        self.sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }
}

/// A running sink: its task plus the counters it reports through.
pub struct SinkHandle {
    pub name: String,
    pub task: JoinHandle<()>,
    pub counters: Arc<SinkCounters>,
}

/// Bring up every enabled sink. A sink that cannot acquire its resource
/// (bind, open) fails the whole startup.
pub async fn spawn_sinks(
    configs: &[OutputConfig],
    bus: &broadcast::Sender<Sentence>,
) -> Result<Vec<SinkHandle>> {
    let mut handles = Vec::new();
    for config in configs.iter().filter(|c| c.enabled()) {
        let counters = Arc::new(SinkCounters::default());
        let handle = match config {
            OutputConfig::File(cfg) => {
                let sink = file::FileSink::open(cfg.clone()).await?;
                let name = format!("file:{}", cfg.path.display());
                let task = tokio::spawn(sink.run(bus.subscribe(), counters.clone()));
                SinkHandle { name, task, counters }
            }
            OutputConfig::Tcp(cfg) => {
                let listener = tcp::bind(cfg).await?;
                let name = format!("tcp:{}", listener.local_addr()?);
                let task = tokio::spawn(tcp::run(
                    listener,
                    cfg.clone(),
                    bus.clone(),
                    counters.clone(),
                ));
                SinkHandle { name, task, counters }
            }
            OutputConfig::Udp(cfg) => {
                let socket = udp::bind(cfg).await?;
                let name = format!("udp:{}:{}", cfg.host, cfg.port);
                let task = tokio::spawn(udp::run(
                    socket,
                    cfg.clone(),
                    bus.subscribe(),
                    counters.clone(),
                ));
                SinkHandle { name, task, counters }
            }
            OutputConfig::Serial(cfg) => {
                let port = serial::open(cfg)?;
                let name = format!("serial:{}", cfg.port);
                let task = serial::spawn(port, cfg.clone(), bus.subscribe(), counters.clone());
                SinkHandle { name, task, counters }
            }
        };
        info!("output up: {}", handle.name);
        handles.push(handle);
    }
    Ok(handles)
}

/// Wait for the sinks to drain after the bus closed, then report totals.
pub async fn shutdown_sinks(handles: Vec<SinkHandle>) {
    for handle in handles {
        let abort = handle.task.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, handle.task).await.is_err() {
            tracing::warn!("{}: drain deadline hit, aborting", handle.name);
            abort.abort();
        }
        info!(
            "{}: {} sentences written, {} dropped",
            handle.name,
            handle.counters.sent.load(Ordering::Relaxed),
            handle.counters.dropped.load(Ordering::Relaxed),
        );
    }
}
