//! Playback queue
//!
//! Ordered sequence of synthesized clips awaiting playback, always kept
//! sorted by ascending segment id. Network responses merge into the sorted
//! order, so playback is strictly id-ordered regardless of arrival order.
//! Elements leave the queue exactly once: consumed, dropped by catch-up,
//! or cleared by a seek.

use crate::playback::clip::SynthesizedClip;
use std::sync::Arc;

/// Sorted queue of clips awaiting playback
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    clips: Vec<Arc<SynthesizedClip>>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self { clips: Vec::new() }
    }

    /// Insert a clip in id order; a duplicate id is a no-op
    pub fn insert(&mut self, clip: Arc<SynthesizedClip>) {
        match self.clips.binary_search_by_key(&clip.id, |c| c.id) {
            Ok(_) => {} // already queued
            Err(pos) => self.clips.insert(pos, clip),
        }
    }

    /// Head of the queue (lowest id) without removing it
    pub fn peek(&self) -> Option<&Arc<SynthesizedClip>> {
        self.clips.first()
    }

    /// Remove and return the head of the queue
    pub fn pop(&mut self) -> Option<Arc<SynthesizedClip>> {
        if self.clips.is_empty() {
            None
        } else {
            Some(self.clips.remove(0))
        }
    }

    /// Queued ids in playback order
    pub fn ids(&self) -> Vec<usize> {
        self.clips.iter().map(|c| c.id).collect()
    }

    pub fn clear(&mut self) {
        self.clips.clear();
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Verify the strictly-ascending-id invariant
    pub fn is_strictly_sorted(&self) -> bool {
        self.clips.windows(2).all(|w| w[0].id < w[1].id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::clip::DecodedAudio;

    fn clip(id: usize, slot_start: f64, slot_end: f64) -> Arc<SynthesizedClip> {
        Arc::new(SynthesizedClip {
            id,
            slot_start,
            slot_end,
            audio: DecodedAudio {
                channels: 1,
                sample_rate: 8000,
                samples: vec![0; 800],
            },
        })
    }

    #[test]
    fn test_insert_keeps_ascending_id_order() {
        let mut queue = PlaybackQueue::new();
        queue.insert(clip(5, 10.0, 12.0));
        queue.insert(clip(1, 2.0, 4.0));
        queue.insert(clip(3, 6.0, 8.0));

        assert!(queue.is_strictly_sorted());
        assert_eq!(queue.pop().unwrap().id, 1);
        assert_eq!(queue.pop().unwrap().id, 3);
        assert_eq!(queue.pop().unwrap().id, 5);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_duplicate_id_is_noop() {
        let mut queue = PlaybackQueue::new();
        queue.insert(clip(2, 4.0, 6.0));
        queue.insert(clip(2, 4.0, 6.0));

        assert_eq!(queue.len(), 1);
        assert!(queue.is_strictly_sorted());
    }

    #[test]
    fn test_clear() {
        let mut queue = PlaybackQueue::new();
        queue.insert(clip(0, 0.0, 2.0));
        queue.clear();
        assert!(queue.is_empty());
    }
}
