//! Remote size and range-support discovery

use crate::config::EngineConfig;
use crate::error::DownloadError;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a HEAD request told us about the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInfo {
    pub total_size: u64,
    pub supports_range: bool,
}

/// Discover the size of `url` and whether it honors byte ranges.
///
/// Timeouts and 5xx responses are retried with a linear backoff
/// (`retry_backoff * attempt`) until `probe_attempts` is used up.
/// Everything else fails on the first attempt.
pub async fn probe_url(
    client: &Client,
    url: &str,
    config: &EngineConfig,
) -> Result<RemoteInfo, DownloadError> {
    let max_attempts = config.probe_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("Probing {} (attempt {}/{})", url, attempt, max_attempts);

        match probe_once(client, url, config.probe_timeout).await {
            Ok(info) => {
                info!(
                    "Remote size {} bytes, range support: {}",
                    info.total_size, info.supports_range
                );
                return Ok(info);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.retry_backoff * attempt;
                warn!(
                    "Probe attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn probe_once(client: &Client, url: &str, timeout: Duration) -> Result<RemoteInfo, DownloadError> {
    let response = client
        .head(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout
            } else {
                DownloadError::Network(e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::from_status(status));
    }

    let headers = response.headers();
    let total_size = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);

    if total_size == 0 {
        return Err(DownloadError::UnknownSize);
    }

    let supports_range = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")))
        .unwrap_or(false);

    Ok(RemoteInfo {
        total_size,
        supports_range,
    })
}
