//! Download engine - coordinates the segment workers of one download
//!
//! The engine is the only owner of the [`DownloadDescriptor`]. Workers send
//! [`SegmentProgress`] messages over a channel and the engine applies them,
//! persists the descriptor (throttled) and broadcasts [`EngineEvent`]s.

use crate::config::EngineConfig;
use crate::destination::resolve_destination;
use crate::engine::{probe_url, SegmentOutcome, SegmentProgress, SegmentWorker, StateStore};
use crate::error::DownloadError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use ufd_types::{DownloadDescriptor, EngineEvent, Segment, SegmentStatus};

/// Split `total_size` bytes into contiguous inclusive ranges.
///
/// Each segment gets `total_size / connections` bytes and the last one also
/// takes the remainder. Without range support the whole file is one segment.
pub fn plan_segments(total_size: u64, connections: u32, supports_range: bool) -> Vec<Segment> {
    if total_size == 0 {
        return Vec::new();
    }
    if !supports_range {
        return vec![Segment::new(0, 0, total_size - 1)];
    }

    // Never more segments than bytes, so no segment is empty
    let count = u64::from(connections.max(1)).min(total_size);
    let segment_size = total_size / count;

    (0..count)
        .map(|i| {
            let start = i * segment_size;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                (i + 1) * segment_size - 1
            };
            Segment::new(i as u32, start, end)
        })
        .collect()
}

/// Drives one download from size discovery to completion
pub struct DownloadEngine {
    descriptor: DownloadDescriptor,
    config: EngineConfig,
    client: Client,
    store: StateStore,
    event_tx: broadcast::Sender<EngineEvent>,
    cancel: CancellationToken,
}

impl DownloadEngine {
    /// Create an engine with the default configuration
    pub async fn new(
        url: &str,
        connections: u32,
        destination: Option<&Path>,
    ) -> Result<Self, DownloadError> {
        Self::with_config(url, connections, destination, EngineConfig::default()).await
    }

    /// Create an engine, adopting any resume state saved for the same URL
    pub async fn with_config(
        url: &str,
        connections: u32,
        destination: Option<&Path>,
        config: EngineConfig,
    ) -> Result<Self, DownloadError> {
        let destination_path = resolve_destination(url, destination)?;
        let store = StateStore::new(config.state_suffix.clone());

        if connections == 0 {
            warn!("Connection count 0 requested, using 1");
        }
        let connections = connections.max(1);

        let saved = store.load(&destination_path).await;
        let descriptor = match saved {
            Some(mut saved) if saved.url == url => {
                info!(
                    "Found resume state for {} ({} / {} bytes)",
                    destination_path.display(),
                    saved.downloaded(),
                    saved.total_size
                );
                saved.destination_path = destination_path;
                saved
            }
            Some(_) => {
                warn!(
                    "Resume state at {} belongs to another URL, starting fresh",
                    destination_path.display()
                );
                DownloadDescriptor::new(url.to_string(), destination_path, connections)
            }
            None => DownloadDescriptor::new(url.to_string(), destination_path, connections),
        };

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()?;

        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            descriptor,
            config,
            client,
            store,
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    pub fn descriptor(&self) -> &DownloadDescriptor {
        &self.descriptor
    }

    pub fn destination(&self) -> &Path {
        &self.descriptor.destination_path
    }

    /// Where the resume document for this download lives
    pub fn state_path(&self) -> PathBuf {
        self.store.state_path(&self.descriptor.destination_path)
    }

    /// Stop all running workers. The current run ends as paused and keeps
    /// its resume state; a later `start()` on this engine runs again.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this engine's workers when cancelled.
    ///
    /// A stopped run replaces the token, so fetch it again before each run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }

    fn fail(&self, e: DownloadError) -> DownloadError {
        error!("Download failed: {} - {}", self.descriptor.url, e);
        self.emit(EngineEvent::Error {
            message: e.to_string(),
        });
        e
    }

    /// Discover the remote size, pre-size the file and plan segments.
    ///
    /// Does nothing but emit `Initialized` if the descriptor was resumed.
    pub async fn init(&mut self) -> Result<(), DownloadError> {
        if self.descriptor.is_planned()
            && !tokio::fs::try_exists(&self.descriptor.destination_path)
                .await
                .unwrap_or(false)
        {
            warn!(
                "{} is gone, discarding its resume state",
                self.descriptor.destination_path.display()
            );
            self.descriptor = DownloadDescriptor::new(
                self.descriptor.url.clone(),
                self.descriptor.destination_path.clone(),
                self.descriptor.connections,
            );
        }

        if self.descriptor.is_planned() {
            info!(
                "Resuming {} with {} segments",
                self.descriptor.destination_path.display(),
                self.descriptor.segments.len()
            );
            self.emit(EngineEvent::Initialized {
                descriptor: self.descriptor.clone(),
            });
            return Ok(());
        }

        if let Err(e) = self.plan().await {
            return Err(self.fail(e));
        }

        self.emit(EngineEvent::Initialized {
            descriptor: self.descriptor.clone(),
        });
        Ok(())
    }

    async fn plan(&mut self) -> Result<(), DownloadError> {
        let remote = probe_url(&self.client, &self.descriptor.url, &self.config).await?;

        self.prepare_file(remote.total_size).await?;

        self.descriptor.total_size = remote.total_size;
        self.descriptor.segments = plan_segments(
            remote.total_size,
            self.descriptor.connections,
            remote.supports_range,
        );
        info!(
            "Planned {} segments for {} bytes",
            self.descriptor.segments.len(),
            remote.total_size
        );

        self.store.save(&self.descriptor).await
    }

    /// Create the destination (and missing parent directories) at its final size
    async fn prepare_file(&self, size: u64) -> Result<(), DownloadError> {
        let path = &self.descriptor.destination_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .await?;
        file.set_len(size).await?;
        Ok(())
    }

    /// Fetch every incomplete segment concurrently and wait for all of them.
    ///
    /// A failed worker does not stop its siblings; once all have settled the
    /// descriptor is persisted and the first failure is reported.
    pub async fn start(&mut self) -> Result<(), DownloadError> {
        if !self.descriptor.is_planned() {
            self.init().await?;
        }

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.descriptor.is_paused = false;
        info!(
            "Starting download {} -> {}",
            self.descriptor.url,
            self.descriptor.destination_path.display()
        );

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let mut join_set = JoinSet::new();

        let last_byte = self.descriptor.total_size.saturating_sub(1);
        for segment in self.descriptor.segments.iter().filter(|s| !s.is_complete()) {
            let whole_file = segment.start == 0 && segment.end == last_byte;
            let worker = SegmentWorker::new(
                segment.clone(),
                self.descriptor.url.clone(),
                self.descriptor.destination_path.clone(),
                self.client.clone(),
                progress_tx.clone(),
                self.cancel.child_token(),
            )
            .whole_file(whole_file);
            join_set.spawn(async move {
                let result = worker.start().await;
                (worker.segment_id(), result)
            });
        }
        drop(progress_tx);

        let mut last_save = Instant::now();
        let mut settled = Vec::new();

        loop {
            tokio::select! {
                Some(progress) = progress_rx.recv() => {
                    self.apply_progress(progress, &mut last_save).await;
                }
                joined = join_set.join_next(), if !join_set.is_empty() => {
                    if let Some(joined) = joined {
                        settled.push(joined);
                    }
                }
                else => break,
            }
        }

        let mut first_error = None;
        let mut stopped = false;

        for joined in settled {
            match joined {
                Ok((id, Ok(SegmentOutcome::Finished | SegmentOutcome::AlreadyComplete))) => {
                    if let Some(segment) = self.descriptor.segment_mut(id) {
                        if segment.current >= segment.total {
                            segment.status = SegmentStatus::Completed;
                        }
                    }
                }
                Ok((id, Ok(SegmentOutcome::Cancelled))) => {
                    info!("Segment {} stopped", id);
                    stopped = true;
                }
                Ok((id, Err(e))) => {
                    warn!("Segment {} failed: {}", id, e);
                    if let Some(segment) = self.descriptor.segment_mut(id) {
                        segment.status = SegmentStatus::Failed;
                    }
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    error!("Segment task panicked: {}", e);
                    if first_error.is_none() {
                        first_error = Some(DownloadError::TaskFailed(e.to_string()));
                    }
                }
            }
        }

        if let Some(e) = first_error {
            self.persist().await;
            return Err(self.fail(e));
        }

        if !self.descriptor.is_complete() {
            if stopped {
                self.descriptor.is_paused = true;
                self.persist().await;
                info!("Download paused: {}", self.descriptor.destination_path.display());
                self.emit(EngineEvent::Paused {
                    descriptor: self.descriptor.clone(),
                });
                return Ok(());
            }

            let e = self
                .descriptor
                .segments
                .iter()
                .find(|s| !s.is_complete())
                .map(|s| DownloadError::SegmentIncomplete {
                    segment: s.id,
                    expected: s.total,
                    received: s.current,
                })
                .unwrap_or_else(|| DownloadError::TaskFailed("no segments planned".to_string()));
            self.persist().await;
            return Err(self.fail(e));
        }

        if let Err(e) = self.store.delete(&self.descriptor.destination_path).await {
            return Err(self.fail(e));
        }

        info!("Download completed: {}", self.descriptor.destination_path.display());
        self.emit(EngineEvent::Completed {
            descriptor: self.descriptor.clone(),
        });
        Ok(())
    }

    async fn apply_progress(&mut self, progress: SegmentProgress, last_save: &mut Instant) {
        match progress {
            SegmentProgress::Written { segment_id, bytes } => {
                if let Some(segment) = self.descriptor.segment_mut(segment_id) {
                    segment.current = (segment.current + bytes).min(segment.total);
                    segment.status = if segment.current >= segment.total {
                        SegmentStatus::Completed
                    } else {
                        SegmentStatus::Downloading
                    };
                }
            }
            SegmentProgress::Restarted { segment_id } => {
                if let Some(segment) = self.descriptor.segment_mut(segment_id) {
                    segment.current = 0;
                    segment.status = SegmentStatus::Downloading;
                }
            }
        }

        if last_save.elapsed() >= self.config.persist_interval {
            self.persist().await;
            *last_save = Instant::now();
        }

        self.emit(EngineEvent::Progress {
            descriptor: self.descriptor.clone(),
        });
    }

    /// Save the descriptor; a failed write only costs re-fetching on resume
    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.descriptor).await {
            warn!("Failed to save resume state: {}", e);
        }
    }
}
