//! UDP sink: one datagram per sentence, unicast or broadcast.
//!
//! Every NMEA sentence fits a single datagram by construction (82 bytes
//! at most), so there is no fragmentation at this layer. Send errors are
//! counted and skipped; the stream carries on.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::warn;

use super::{Sentence, SinkCounters};
use crate::config::UdpOutputConfig;

pub async fn bind(cfg: &UdpOutputConfig) -> Result<UdpSocket> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("binding udp output socket")?;
    if cfg.broadcast {
        socket
            .set_broadcast(true)
            .context("requesting SO_BROADCAST")?;
    }
    Ok(socket)
}

pub async fn run(
    socket: UdpSocket,
    cfg: UdpOutputConfig,
    mut rx: broadcast::Receiver<Sentence>,
    counters: Arc<SinkCounters>,
) {
    let target = format!("{}:{}", cfg.host, cfg.port);
    loop {
        match rx.recv().await {
            Ok(sentence) => {
                let datagram = format!("{sentence}\r\n");
                match socket.send_to(datagram.as_bytes(), &target).await {
                    Ok(_) => counters.add_sent(1),
                    Err(e) => {
                        warn!("udp send to {target} failed: {e}");
                        counters.add_dropped(1);
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => counters.add_dropped(n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_one_datagram_per_sentence() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let cfg = UdpOutputConfig {
            host: "127.0.0.1".into(),
            port,
            enabled: true,
            broadcast: false,
        };
        let socket = bind(&cfg).await.unwrap();
        let (bus, rx) = broadcast::channel::<Sentence>(64);
        let counters = Arc::new(SinkCounters::default());
        tokio::spawn(run(socket, cfg, rx, counters.clone()));

        bus.send("$GPGGA,first*00".into()).unwrap();
        bus.send("$GPGGA,second*00".into()).unwrap();

        let mut buf = [0u8; 128];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$GPGGA,first*00\r\n");
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$GPGGA,second*00\r\n");
    }
}
