//! Subtitle timeline
//!
//! Holds the ordered subtitle segments for one video and locates the
//! segment a given playhead position falls into (or the next one ahead of
//! it). Segments are immutable once fetched; the sequence may contain
//! small gaps of silence but no overlaps.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One subtitle-aligned unit of source text and its time slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// Position in the timeline, assigned after sorting
    pub index: usize,
    /// Slot start on the video timeline (seconds)
    pub start_sec: f64,
    /// Slot end on the video timeline (seconds)
    pub end_sec: f64,
    /// Translated text to synthesize
    pub text: String,
}

impl SubtitleSegment {
    /// Duration of the slot this segment occupies (seconds)
    pub fn slot_duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Sorted subtitle timeline for a single video
///
/// Entries are sorted by `start_sec` ascending and re-indexed; segments
/// with a non-positive duration are discarded.
#[derive(Debug, Clone, Default)]
pub struct SubtitleTimeline {
    segments: Vec<SubtitleSegment>,
}

impl SubtitleTimeline {
    /// Build a timeline: segments are sorted by start and re-indexed,
    /// non-positive durations discarded
    pub fn new(mut segments: Vec<SubtitleSegment>) -> Self {
        segments.retain(|s| {
            if s.end_sec <= s.start_sec {
                warn!("Discarding subtitle {} with non-positive duration", s.index);
                false
            } else {
                true
            }
        });
        segments.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.index = i;
        }
        Self { segments }
    }

    /// Locate the seek target: the first segment whose `end_sec` exceeds
    /// `position`.
    ///
    /// Returns index 0 when the position precedes the first segment, and
    /// `None` when the position is past the last segment's end.
    pub fn seek_index(&self, position: f64) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| s.end_sec > position)
    }

    /// Segment at `index`
    pub fn get(&self, index: usize) -> Option<&SubtitleSegment> {
        self.segments.get(index)
    }

    /// All segments in timeline order
    pub fn segments(&self) -> &[SubtitleSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the timeline has no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
