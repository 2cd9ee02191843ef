//! Live sample ingestion from the device stream.
//!
//! The device (or its simulator) connects over TCP and sends batches of
//! `t,y;` records, 20 records every 20 ms. Records may be split across reads
//! at any byte.

use super::IngestError;
use crate::engine::CancelFlag;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// Port the device simulator connects to.
pub const DEFAULT_STREAM_PORT: u16 = 11520;

const RECORD_SEPARATOR: u8 = b';';
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One `t,y` record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamSample {
    /// Seconds since the device started sending
    pub t: f64,
    pub value: f32,
}

/// Incremental `t,y;` record decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    skipped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every record completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamSample> {
        self.pending.extend_from_slice(chunk);

        let Some(last) = self.pending.iter().rposition(|&b| b == RECORD_SEPARATOR) else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last).collect();
        complete
            .split(|&b| b == RECORD_SEPARATOR)
            .filter_map(|record| self.decode(record))
            .collect()
    }

    /// Decode a trailing record that was never terminated.
    pub fn finish(&mut self) -> Option<StreamSample> {
        let rest = std::mem::take(&mut self.pending);
        self.decode(&rest)
    }

    /// Records that could not be parsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode(&mut self, record: &[u8]) -> Option<StreamSample> {
        let text = std::str::from_utf8(record).ok().map(str::trim);
        if text.map_or(false, str::is_empty) {
            return None;
        }

        let sample = text.and_then(|text| {
            let (t, y) = text.split_once(',')?;
            let t = t.trim().parse::<f64>().ok()?;
            let value = y.trim().parse::<f32>().ok().filter(|v| v.is_finite())?;
            Some(StreamSample { t, value })
        });

        if sample.is_none() {
            self.skipped += 1;
            tracing::debug!(
                record = %String::from_utf8_lossy(record),
                "skipping malformed stream record"
            );
        }
        sample
    }
}

/// Samples gathered from one device connection.
#[derive(Debug, Clone, Default)]
pub struct StreamCollection {
    pub samples: Vec<StreamSample>,
    pub skipped: usize,
    /// `false` when collection stopped early on cancel
    pub complete: bool,
}

impl StreamCollection {
    pub fn values(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.value).collect()
    }
}

/// Accept one connection and gather samples until EOF, `max_samples`, or
/// cancellation.
pub async fn collect_tcp(
    listener: TcpListener,
    max_samples: Option<usize>,
    cancel: CancelFlag,
) -> Result<StreamCollection, IngestError> {
    let mut collection = StreamCollection::default();

    let (mut socket, peer) = loop {
        if cancel.is_cancelled() {
            return Ok(collection);
        }
        if let Ok(accepted) = tokio::time::timeout(POLL_INTERVAL, listener.accept()).await {
            break accepted?;
        }
    };
    tracing::info!(%peer, "device connected");

    let limit = max_samples.unwrap_or(usize::MAX);
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        if cancel.is_cancelled() {
            tracing::warn!(samples = collection.samples.len(), "stream collection cancelled");
            collection.skipped = decoder.skipped();
            return Ok(collection);
        }

        let n = match tokio::time::timeout(POLL_INTERVAL, socket.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => continue,
        };

        if n == 0 {
            collection.samples.extend(decoder.finish());
            break;
        }

        collection.samples.extend(decoder.push(&buf[..n]));
        if collection.samples.len() >= limit {
            break;
        }
    }

    collection.samples.truncate(limit);
    collection.skipped = decoder.skipped();
    collection.complete = true;
    tracing::info!(
        %peer,
        samples = collection.samples.len(),
        skipped = collection.skipped,
        "stream collection finished"
    );
    Ok(collection)
}
