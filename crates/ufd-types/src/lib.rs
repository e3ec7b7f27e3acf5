//! Shared types for UFD
//!
//! This crate contains the data structures exchanged between the
//! download engine and whatever presents it (CLI, TUI, ...).
//! The serialized form of [`DownloadDescriptor`] is also the on-disk
//! resume document, so field names here are part of the file format.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Segment Types
// ============================================================================

/// Status of a single segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    #[default]
    Pending,
    Downloading,
    Completed,
    Failed,
}

/// A contiguous byte range of the remote resource, owned by one worker.
///
/// `end` is inclusive, so a segment always covers at least one byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: u32,
    pub start: u64,
    pub end: u64,
    /// Bytes already written for this segment
    pub current: u64,
    /// `end - start + 1`
    pub total: u64,
    pub status: SegmentStatus,
}

impl Segment {
    pub fn new(id: u32, start: u64, end: u64) -> Self {
        Self {
            id,
            start,
            end,
            current: 0,
            total: end - start + 1,
            status: SegmentStatus::Pending,
        }
    }

    /// First byte that still has to be fetched
    pub fn resume_offset(&self) -> u64 {
        self.start + self.current
    }

    pub fn is_complete(&self) -> bool {
        self.status == SegmentStatus::Completed
    }
}

// ============================================================================
// Download Types
// ============================================================================

/// The complete record of a download's progress.
///
/// `segments` is empty exactly while `total_size` is 0 (size not yet
/// discovered). Once populated, the segments partition `[0, total_size - 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDescriptor {
    pub url: String,
    pub destination_path: PathBuf,
    pub total_size: u64,
    pub segments: Vec<Segment>,
    /// Requested number of connections
    pub connections: u32,
    pub is_paused: bool,
}

impl DownloadDescriptor {
    pub fn new(url: String, destination_path: PathBuf, connections: u32) -> Self {
        Self {
            url,
            destination_path,
            total_size: 0,
            segments: Vec::new(),
            connections,
            is_paused: false,
        }
    }

    /// Whether size discovery and segmentation already happened
    pub fn is_planned(&self) -> bool {
        self.total_size > 0
    }

    /// Sum of bytes written across all segments
    pub fn downloaded(&self) -> u64 {
        self.segments.iter().map(|s| s.current).sum()
    }

    pub fn is_complete(&self) -> bool {
        !self.segments.is_empty() && self.segments.iter().all(Segment::is_complete)
    }

    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.downloaded() as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Whether the segments describe a usable plan for `total_size`.
    ///
    /// An unplanned descriptor has no segments. A planned one has segments
    /// with distinct ids that partition `[0, total_size - 1]` in order, each
    /// with `total == end - start + 1` and `current <= total`, and a
    /// `completed` segment has all of its bytes.
    pub fn is_consistent(&self) -> bool {
        if self.total_size == 0 {
            return self.segments.is_empty();
        }
        if self.segments.is_empty() {
            return false;
        }

        let mut next_start = 0;
        let mut ids = std::collections::HashSet::new();
        for segment in &self.segments {
            if segment.start != next_start
                || segment.end < segment.start
                || segment.total != segment.end - segment.start + 1
                || segment.current > segment.total
                || (segment.is_complete() && segment.current != segment.total)
                || !ids.insert(segment.id)
            {
                return false;
            }
            next_start = segment.end.saturating_add(1);
        }
        next_start == self.total_size
    }

    pub fn segment_mut(&mut self, id: u32) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id == id)
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by the engine to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    Initialized { descriptor: DownloadDescriptor },
    Progress { descriptor: DownloadDescriptor },
    Completed { descriptor: DownloadDescriptor },
    /// Workers were stopped on request; resume state was kept
    Paused { descriptor: DownloadDescriptor },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_new_computes_total() {
        let segment = Segment::new(2, 500, 749);
        assert_eq!(segment.total, 250);
        assert_eq!(segment.current, 0);
        assert_eq!(segment.status, SegmentStatus::Pending);
        assert_eq!(segment.resume_offset(), 500);
    }

    #[test]
    fn test_descriptor_wire_names() {
        let mut descriptor = DownloadDescriptor::new(
            "https://example.com/file.iso".to_string(),
            PathBuf::from("/tmp/file.iso"),
            4,
        );
        descriptor.total_size = 10;
        descriptor.segments.push(Segment::new(0, 0, 9));

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["destinationPath"], "/tmp/file.iso");
        assert_eq!(value["totalSize"], 10);
        assert_eq!(value["isPaused"], false);
        assert_eq!(value["segments"][0]["status"], "pending");
        assert_eq!(value["segments"][0]["total"], 10);
    }

    #[test]
    fn test_descriptor_progress() {
        let mut descriptor =
            DownloadDescriptor::new("http://x/y".into(), PathBuf::from("y"), 2);
        assert!(!descriptor.is_planned());
        assert!(!descriptor.is_complete());

        descriptor.total_size = 200;
        descriptor.segments = vec![Segment::new(0, 0, 99), Segment::new(1, 100, 199)];
        descriptor.segments[0].current = 100;
        descriptor.segments[0].status = SegmentStatus::Completed;
        descriptor.segments[1].current = 50;

        assert_eq!(descriptor.downloaded(), 150);
        assert!((descriptor.progress() - 75.0).abs() < f64::EPSILON);
        assert!(!descriptor.is_complete());
    }

    fn planned(total_size: u64, ranges: &[(u64, u64)]) -> DownloadDescriptor {
        let mut descriptor =
            DownloadDescriptor::new("http://x/y".into(), PathBuf::from("y"), 2);
        descriptor.total_size = total_size;
        descriptor.segments = ranges
            .iter()
            .enumerate()
            .map(|(i, &(start, end))| Segment::new(i as u32, start, end))
            .collect();
        descriptor
    }

    #[test]
    fn test_consistent_plans() {
        assert!(DownloadDescriptor::new("http://x/y".into(), PathBuf::from("y"), 2).is_consistent());
        assert!(planned(10, &[(0, 9)]).is_consistent());
        assert!(planned(200, &[(0, 99), (100, 199)]).is_consistent());
    }

    #[test]
    fn test_inconsistent_plans() {
        // Sized but never segmented
        assert!(!planned(10, &[]).is_consistent());
        // Gap, overlap, short coverage
        assert!(!planned(200, &[(0, 98), (100, 199)]).is_consistent());
        assert!(!planned(200, &[(0, 100), (100, 199)]).is_consistent());
        assert!(!planned(300, &[(0, 99), (100, 199)]).is_consistent());

        let mut bad_total = planned(10, &[(0, 9)]);
        bad_total.segments[0].total = 5;
        assert!(!bad_total.is_consistent());

        let mut overrun = planned(10, &[(0, 9)]);
        overrun.segments[0].current = 11;
        assert!(!overrun.is_consistent());

        let mut hollow = planned(10, &[(0, 9)]);
        hollow.segments[0].status = SegmentStatus::Completed;
        assert!(!hollow.is_consistent());

        let mut duplicate = planned(200, &[(0, 99), (100, 199)]);
        duplicate.segments[1].id = 0;
        assert!(!duplicate.is_consistent());
    }
}
