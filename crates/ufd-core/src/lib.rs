//! UFD Core - Download Engine
//!
//! This crate accelerates fetching a single large file over HTTP by
//! splitting it into byte ranges that are downloaded concurrently, and
//! keeps enough state next to the file to resume an interrupted transfer.
//!
//! ```no_run
//! # async fn run() -> Result<(), ufd_core::DownloadError> {
//! let mut engine = ufd_core::DownloadEngine::new("https://example.com/big.iso", 8, None).await?;
//! let mut events = engine.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! });
//! engine.init().await?;
//! engine.start().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod destination;
pub mod engine;
mod error;

pub use config::*;
pub use destination::*;
pub use engine::{
    plan_segments, probe_url, DownloadEngine, RemoteInfo, SegmentOutcome, SegmentProgress,
    SegmentWorker, StateStore,
};
pub use error::*;

pub use ufd_types::{DownloadDescriptor, EngineEvent, Segment, SegmentStatus};
