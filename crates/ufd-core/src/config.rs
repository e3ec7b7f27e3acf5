//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User agent sent with every request; some hosts reject non-browser agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Tunables for a [`DownloadEngine`](crate::DownloadEngine)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub user_agent: String,
    /// Timeout for a single size-discovery request
    pub probe_timeout: Duration,
    /// Total discovery attempts, including the first one
    pub probe_attempts: u32,
    /// Base delay between discovery attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// Minimum time between two resume-state writes while downloading
    pub persist_interval: Duration,
    pub connect_timeout: Duration,
    /// Appended to the destination file name to locate the resume document
    pub state_suffix: String,
    /// Buffer of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            probe_timeout: Duration::from_secs(10),
            probe_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            persist_interval: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(30),
            state_suffix: ".ufd".to_string(),
            event_capacity: 1024,
        }
    }
}
