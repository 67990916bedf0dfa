//! TCP sink: a listener fanning the sentence stream out to every connected
//! client.
//!
//! Each accepted client gets its own writer task and its own bus receiver,
//! so one slow client never stalls another. A client is dropped when a write
//! errors, exceeds the send timeout, or when no write has succeeded for the
//! client timeout. Connections beyond `max_clients` are closed on accept.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::{Sentence, SinkCounters};
use crate::config::TcpOutputConfig;

pub async fn bind(cfg: &TcpOutputConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding tcp output on {addr}"))
}

/// Accept loop. Exits when the bus closes.
pub async fn run(
    listener: TcpListener,
    cfg: TcpOutputConfig,
    bus: broadcast::Sender<Sentence>,
    counters: Arc<SinkCounters>,
) {
    let clients = Arc::new(AtomicUsize::new(0));
    let mut closed = bus.subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("tcp accept failed: {e}");
                        continue;
                    }
                };
                if clients.load(Ordering::Relaxed) >= cfg.max_clients {
                    warn!("tcp client {peer} refused: at max_clients={}", cfg.max_clients);
                    continue; // dropping the stream closes it
                }
                clients.fetch_add(1, Ordering::Relaxed);
                info!("tcp client connected: {peer}");
                let rx = bus.subscribe();
                let cfg = cfg.clone();
                let counters = counters.clone();
                let clients = clients.clone();
                tokio::spawn(async move {
                    serve_client(stream, rx, &cfg, &counters).await;
                    clients.fetch_sub(1, Ordering::Relaxed);
                    info!("tcp client gone: {peer}");
                });
            }
            // The acceptor keeps its own receiver purely to notice shutdown.
            result = drain_until_closed(&mut closed) => {
                let _ = result;
                break;
            }
        }
    }
}

async fn drain_until_closed(rx: &mut broadcast::Receiver<Sentence>) {
    loop {
        match rx.recv().await {
            Err(broadcast::error::RecvError::Closed) => return,
            _ => continue,
        }
    }
}

async fn serve_client(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<Sentence>,
    cfg: &TcpOutputConfig,
    counters: &SinkCounters,
) {
    let send_timeout = Duration::from_secs_f64(cfg.send_timeout_secs);
    let client_timeout = Duration::from_secs_f64(cfg.client_timeout_secs);
    let mut last_write = Instant::now();

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(sentence) => {
                    let write = async {
                        stream.write_all(sentence.as_bytes()).await?;
                        stream.write_all(b"\r\n").await
                    };
                    match timeout(send_timeout, write).await {
                        Ok(Ok(())) => {
                            counters.add_sent(1);
                            last_write = Instant::now();
                        }
                        Ok(Err(e)) => {
                            debug!("tcp write failed: {e}");
                            return;
                        }
                        Err(_) => {
                            warn!("tcp client exceeded send timeout, dropping");
                            return;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => counters.add_dropped(n),
                Err(broadcast::error::RecvError::Closed) => {
                    let _ = stream.flush().await;
                    let _ = stream.shutdown().await;
                    return;
                }
            },
            _ = tokio::time::sleep_until(last_write + client_timeout) => {
                warn!("tcp client idle past client_timeout, dropping");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn test_config(client_timeout_secs: f64) -> TcpOutputConfig {
        TcpOutputConfig {
            host: "127.0.0.1".into(),
            port: 0,
            enabled: true,
            max_clients: 4,
            client_timeout_secs,
            send_timeout_secs: 1.0,
        }
    }

    async fn read_lines(stream: &mut TcpStream, count: usize) -> Vec<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let text = String::from_utf8_lossy(&buf);
            if text.matches("\r\n").count() >= count {
                return text
                    .split_terminator("\r\n")
                    .map(str::to_string)
                    .collect();
            }
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed after {}", String::from_utf8_lossy(&buf));
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn fans_out_in_order_to_all_clients() {
        let cfg = test_config(30.0);
        let listener = bind(&cfg).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (bus, _keep) = broadcast::channel::<Sentence>(BUS_CAP);
        let counters = Arc::new(SinkCounters::default());
        tokio::spawn(run(listener, cfg, bus.clone(), counters));

        let mut one = TcpStream::connect(addr).await.unwrap();
        let mut two = TcpStream::connect(addr).await.unwrap();
        // Give the acceptor a beat to subscribe both clients.
        tokio::time::sleep(Duration::from_millis(50)).await;

        for i in 1..=100 {
            bus.send(format!("$GPGGA,S{i}*00").into()).unwrap();
        }

        let expected: Vec<String> = (1..=100).map(|i| format!("$GPGGA,S{i}*00")).collect();
        assert_eq!(read_lines(&mut one, 100).await, expected);
        assert_eq!(read_lines(&mut two, 100).await, expected);
    }

    #[tokio::test]
    async fn idle_client_is_dropped_after_timeout() {
        let cfg = test_config(0.2);
        let listener = bind(&cfg).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (bus, _keep) = broadcast::channel::<Sentence>(BUS_CAP);
        let counters = Arc::new(SinkCounters::default());
        tokio::spawn(run(listener, cfg, bus.clone(), counters));

        let mut client = TcpStream::connect(addr).await.unwrap();
        // No traffic flows; the server must hang up after ~200 ms.
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("server should close the connection")
            .unwrap();
        assert_eq!(n, 0);

        // A fresh client still gets served.
        let mut fresh = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        bus.send("$GPGGA,AFTER*00".into()).unwrap();
        assert_eq!(read_lines(&mut fresh, 1).await, vec!["$GPGGA,AFTER*00"]);
    }

    const BUS_CAP: usize = 256;
}
