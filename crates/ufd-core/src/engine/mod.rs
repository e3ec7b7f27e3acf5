//! Download Engine - the heart of UFD
//!
//! This module implements a segmented, resumable download engine with:
//! - Size and range-support discovery with bounded retries
//! - Multi-segment parallel downloads into one pre-sized file
//! - Throttled side-car persistence for crash-safe resume
//! - Cooperative per-worker cancellation

mod download_engine;
mod persistence;
mod probe;
mod segment_worker;

pub use download_engine::*;
pub use persistence::*;
pub use probe::*;
pub use segment_worker::*;
