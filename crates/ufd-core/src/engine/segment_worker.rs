//! Segment worker - downloads a single byte range into the destination file
//!
//! Every worker opens its own handle on the shared, pre-sized destination
//! file and writes only inside its segment's `[start, end]` range, so
//! workers never need to coordinate with each other. Progress is reported
//! to the engine over a channel after each chunk is written.

use crate::error::DownloadError;
use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use ufd_types::Segment;

/// What a worker reports to the engine while it streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentProgress {
    /// `bytes` more bytes were written for the segment
    Written { segment_id: u32, bytes: u64 },
    /// The server sent the whole body, so the segment is being rewritten
    /// from its first byte and its `current` starts over at 0
    Restarted { segment_id: u32 },
}

/// How a worker finished when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// The remaining range was fetched and flushed
    Finished,
    /// Nothing left to fetch; no request was made
    AlreadyComplete,
    /// `stop()` was called before the range was fully fetched
    Cancelled,
}

/// A worker that downloads one segment's remaining bytes
pub struct SegmentWorker {
    segment: Segment,
    url: String,
    destination: PathBuf,
    client: Client,
    progress_tx: mpsc::UnboundedSender<SegmentProgress>,
    cancel: CancellationToken,
    whole_file: bool,
}

impl SegmentWorker {
    /// Create a new segment worker
    pub fn new(
        segment: Segment,
        url: String,
        destination: PathBuf,
        client: Client,
        progress_tx: mpsc::UnboundedSender<SegmentProgress>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            segment,
            url,
            destination,
            client,
            progress_tx,
            cancel,
            whole_file: false,
        }
    }

    /// Mark this worker's segment as covering the entire resource, which
    /// lets it fall back to a plain `200` body when ranges are ignored
    pub fn whole_file(mut self, whole_file: bool) -> Self {
        self.whole_file = whole_file;
        self
    }

    pub fn segment_id(&self) -> u32 {
        self.segment.id
    }

    /// Request cancellation of any in-flight transfer. Safe at any time.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Fetch `[start + current, end]` and write it at the matching offsets
    pub async fn start(&self) -> Result<SegmentOutcome, DownloadError> {
        let id = self.segment.id;
        let start_byte = self.segment.resume_offset();
        let end_byte = self.segment.end;

        if start_byte > end_byte {
            info!("Segment {} already complete", id);
            return Ok(SegmentOutcome::AlreadyComplete);
        }

        if self.cancel.is_cancelled() {
            return Ok(SegmentOutcome::Cancelled);
        }

        if self.segment.current > 0 {
            info!(
                "Resuming segment {} from byte {} ({} already written)",
                id, start_byte, self.segment.current
            );
        } else {
            info!("Starting segment {} (bytes {}-{})", id, start_byte, end_byte);
        }

        let range_header = format!("bytes={}-{}", start_byte, end_byte);
        debug!("Segment {} requesting range: {}", id, range_header);

        let request = self.client.get(&self.url).header(RANGE, range_header).send();
        let response = tokio::select! {
            _ = self.cancel.cancelled() => {
                info!("Segment {} cancelled before response", id);
                return Ok(SegmentOutcome::Cancelled);
            }
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::from_status(status));
        }
        // A plain 200 carries the whole resource from byte 0. Only a worker
        // that owns the whole file may write it, starting over if it resumed.
        let write_from = match status {
            StatusCode::PARTIAL_CONTENT => start_byte,
            StatusCode::OK if self.whole_file => {
                if start_byte > self.segment.start {
                    info!(
                        "Segment {} got the full body instead of bytes {}-{}, restarting",
                        id, start_byte, end_byte
                    );
                    let _ = self
                        .progress_tx
                        .send(SegmentProgress::Restarted { segment_id: id });
                }
                self.segment.start
            }
            _ => return Err(DownloadError::RangeNotHonored { segment: id }),
        };

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.destination)
            .await?;
        file.seek(SeekFrom::Start(write_from)).await?;

        let expected = end_byte - write_from + 1;
        let mut remaining = expected;
        let mut stream = response.bytes_stream();

        while remaining > 0 {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    file.flush().await?;
                    info!("Segment {} cancelled with {} bytes left", id, remaining);
                    return Ok(SegmentOutcome::Cancelled);
                }
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            // Never write past our own range, whatever the server sends
            let take = (chunk.len() as u64).min(remaining) as usize;
            file.write_all(&chunk[..take]).await?;
            remaining -= take as u64;

            let _ = self.progress_tx.send(SegmentProgress::Written {
                segment_id: id,
                bytes: take as u64,
            });
        }

        file.flush().await?;
        file.sync_all().await?;

        if remaining > 0 {
            return Err(DownloadError::SegmentIncomplete {
                segment: id,
                expected,
                received: expected - remaining,
            });
        }

        info!("Segment {} complete ({} bytes)", id, expected);
        Ok(SegmentOutcome::Finished)
    }
}
