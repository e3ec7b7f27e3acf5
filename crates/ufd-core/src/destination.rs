//! Destination path resolution
//!
//! Turns the user's optional destination into the exact file path the
//! download (and its resume document) will live at.

use crate::error::DownloadError;
use std::path::{Path, PathBuf};
use url::Url;

/// Used when the URL path has no usable last segment
pub const DEFAULT_BASE_NAME: &str = "download";

/// File name derived from the last segment of the URL path
pub fn base_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string())
}

/// Resolve the final file path for a download.
///
/// - no destination: `base_name` in the current directory
/// - existing directory: `destination/base_name`
/// - existing file: used as-is (resuming an exact path)
/// - missing path with an extension: treated as a file path
/// - missing path without an extension: treated as a directory to create
pub fn resolve_destination(url: &str, destination: Option<&Path>) -> Result<PathBuf, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
    let base_name = base_name_from_url(&parsed);

    let Some(destination) = destination else {
        return Ok(PathBuf::from(".").join(base_name));
    };

    let path = match std::fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => destination.join(base_name),
        Ok(_) => destination.to_path_buf(),
        Err(_) if destination.extension().is_some() => destination.to_path_buf(),
        Err(_) => destination.join(base_name),
    };

    Ok(path)
}
