//! Segment cache
//!
//! Id-keyed store of synthesized clips, scoped to one video. Survives
//! seeks within that video so already-synthesized lines replay from cache;
//! cleared in full when the active video changes. There is no per-entry
//! eviction: the cache is bounded by video length, not victim selection.

use crate::playback::clip::SynthesizedClip;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-video store of synthesized clips
#[derive(Debug, Default)]
pub struct SegmentCache {
    clips: HashMap<usize, Arc<SynthesizedClip>>,
}

impl SegmentCache {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
        }
    }

    /// Insert a clip, replacing any previous clip with the same id
    pub fn insert(&mut self, clip: Arc<SynthesizedClip>) {
        self.clips.insert(clip.id, clip);
    }

    /// Look up a clip by segment id
    pub fn get(&self, id: usize) -> Option<Arc<SynthesizedClip>> {
        self.clips.get(&id).cloned()
    }

    /// Drop every cached clip (video change)
    pub fn clear(&mut self) {
        self.clips.clear();
    }

    /// Number of cached clips
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
