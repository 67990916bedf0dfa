//! File sink: append-only log with size-based rotation.
//!
//! On rotation the live file becomes `<path>.1`, existing backups shift up
//! one, and anything beyond `max_files` total (live file included) is
//! deleted. The newest backup is always `.1`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{Sentence, SinkCounters};
use crate::config::FileOutputConfig;

pub struct FileSink {
    path: PathBuf,
    file: File,
    written: u64,
    auto_flush: bool,
    rotation_bytes: Option<u64>,
    max_files: usize,
}

impl FileSink {
    pub async fn open(cfg: FileOutputConfig) -> Result<FileSink> {
        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.path)
            .await
            .with_context(|| format!("opening {}", cfg.path.display()))?;
        let written = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        Ok(FileSink {
            path: cfg.path,
            file,
            written,
            auto_flush: cfg.auto_flush,
            rotation_bytes: cfg.rotation_size_mb.map(|mb| (mb * 1024.0 * 1024.0) as u64),
            max_files: cfg.max_files,
        })
    }

    pub async fn run(mut self, mut rx: broadcast::Receiver<Sentence>, counters: Arc<SinkCounters>) {
        loop {
            match rx.recv().await {
                Ok(sentence) => {
                    if let Err(e) = self.write_line(&sentence).await {
                        warn!("file sink {}: {e:#}", self.path.display());
                    } else {
                        counters.add_sent(1);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => counters.add_dropped(n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        let _ = self.file.flush().await;
    }

    async fn write_line(&mut self, sentence: &str) -> Result<()> {
        let line_len = sentence.len() as u64 + 2;
        if let Some(limit) = self.rotation_bytes {
            if self.written + line_len > limit && self.written > 0 {
                self.rotate().await?;
            }
        }
        self.file.write_all(sentence.as_bytes()).await?;
        self.file.write_all(b"\r\n").await?;
        if self.auto_flush {
            self.file.flush().await?;
        }
        self.written += line_len;
        Ok(())
    }

    /// Shift the backup chain up and reopen a fresh live file.
    async fn rotate(&mut self) -> Result<()> {
        self.file.flush().await?;

        let backup = |n: usize| PathBuf::from(format!("{}.{n}", self.path.display()));
        // max_files counts the live file; backups run .1 .. .(max_files-1).
        let oldest = self.max_files.saturating_sub(1);
        if oldest == 0 {
            // Only the live file is retained: truncate in place.
            self.file = File::create(&self.path).await?;
            self.written = 0;
            return Ok(());
        }
        let _ = fs::remove_file(backup(oldest)).await;
        for n in (1..oldest).rev() {
            let from = backup(n);
            if fs::try_exists(&from).await.unwrap_or(false) {
                fs::rename(&from, backup(n + 1)).await?;
            }
        }
        fs::rename(&self.path, backup(1)).await?;
        self.file = File::create(&self.path).await?;
        self.written = 0;
        debug!("rotated {}", self.path.display());
        Ok(())
    }
}
