//! Side-car persistence for resumable downloads
//!
//! The descriptor is stored as pretty JSON at `<destination><suffix>`.
//! A missing or unreadable document means "no resume state", never an error.

use crate::error::DownloadError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use ufd_types::DownloadDescriptor;

/// Reads and writes the resume document next to a destination file
#[derive(Clone, Debug)]
pub struct StateStore {
    suffix: String,
}

impl StateStore {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Path of the side-car document for `destination`
    pub fn state_path(&self, destination: &Path) -> PathBuf {
        let mut name = OsString::from(destination.as_os_str());
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    /// Write the full descriptor, replacing any previous document.
    ///
    /// Goes through a temporary file and a rename so a crash mid-write never
    /// leaves a truncated document behind.
    pub async fn save(&self, descriptor: &DownloadDescriptor) -> Result<(), DownloadError> {
        let path = self.state_path(&descriptor.destination_path);
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let content = serde_json::to_string_pretty(descriptor)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        debug!(
            "Saved state for {} ({} / {} bytes)",
            descriptor.destination_path.display(),
            descriptor.downloaded(),
            descriptor.total_size
        );
        Ok(())
    }

    /// Load the descriptor stored for `destination`, if any
    pub async fn load(&self, destination: &Path) -> Option<DownloadDescriptor> {
        let path = self.state_path(destination);
        let content = fs::read_to_string(&path).await.ok()?;

        match serde_json::from_str::<DownloadDescriptor>(&content) {
            Ok(descriptor) if descriptor.is_consistent() => Some(descriptor),
            Ok(_) => {
                warn!(
                    "Ignoring state file {}: segments do not match the recorded size",
                    path.display()
                );
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable state file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove the document for `destination`; no-op if absent
    pub async fn delete(&self, destination: &Path) -> Result<(), DownloadError> {
        let path = self.state_path(destination);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
