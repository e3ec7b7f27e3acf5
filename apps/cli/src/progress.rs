//! Progress bar rendering for engine events

use crate::output::format_bytes;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use ufd_types::{DownloadDescriptor, EngineEvent};

/// Renders one download as a single progress bar
pub struct DownloadProgress {
    pb: ProgressBar,
}

impl DownloadProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(bar_style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        ) {
            pb.set_style(bar_style.progress_chars("█▓▒░  "));
        }
        Self { pb }
    }

    /// Consume events until the engine goes away
    pub async fn run(self, mut events: broadcast::Receiver<EngineEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(&event),
                // Only snapshots are sent, so skipping some is harmless
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Update the bar from an event
    pub fn handle_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Initialized { descriptor } => {
                self.pb.set_length(descriptor.total_size);
                self.pb.set_position(descriptor.downloaded());
                self.pb.set_message(describe(descriptor));
            }

            EngineEvent::Progress { descriptor } => {
                self.pb.set_position(descriptor.downloaded());
            }

            EngineEvent::Completed { descriptor } => {
                self.pb.set_position(descriptor.total_size);
                self.pb.finish_with_message(format!(
                    "{} Saved to {}",
                    style("✓").green().bold(),
                    descriptor.destination_path.display()
                ));
            }

            EngineEvent::Paused { descriptor } => {
                self.pb.abandon_with_message(format!(
                    "{} Paused at {} ({:.1}%), run again to resume",
                    style("⏸").yellow(),
                    format_bytes(descriptor.downloaded()),
                    descriptor.progress()
                ));
            }

            EngineEvent::Error { message } => {
                self.pb.abandon_with_message(format!(
                    "{} Failed: {}",
                    style("✗").red().bold(),
                    message
                ));
            }
        }
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(descriptor: &DownloadDescriptor) -> String {
    let name = descriptor
        .destination_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let segments = descriptor.segments.len();

    if descriptor.downloaded() > 0 {
        format!(
            "{} (resuming, {} segments)",
            style(name).cyan(),
            segments
        )
    } else {
        format!(
            "{} ({}, {} segments)",
            style(name).cyan(),
            format_bytes(descriptor.total_size),
            segments
        )
    }
}
