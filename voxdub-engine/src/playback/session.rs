//! Dubbing session state
//!
//! All mutable synchronization state lives inside one explicit
//! [`DubSession`] guarded by a single `RwLock`. Every asynchronous
//! callback carries the generation tag it was spawned under and checks it
//! before applying results; a reset bumps the generation, so late network
//! replies and timer ticks from a dead session are discarded instead of
//! corrupting the new one.

use crate::playback::cache::SegmentCache;
use crate::playback::prefetch::BufferCursor;
use crate::playback::queue::PlaybackQueue;
use crate::timeline::SubtitleTimeline;
use voxdub_common::events::PlaybackState;

/// State for one dubbing attempt on one video
///
/// Lifetime is strictly one attempt: created by `start_dubbing`, destroyed
/// by `stop_dubbing` or a video change. A seek mutates the session but
/// does not replace it (cached audio stays valid within a video).
#[derive(Debug)]
pub struct DubSession {
    /// Addressable id of the video being dubbed
    pub video_id: String,
    /// Staleness tag; unique per session within the engine's lifetime
    pub generation: u64,

    /// TTS voice for synthesis requests
    pub voice: String,
    /// Target language for translation/synthesis
    pub target_language: String,
    /// Source-language hint, None = server auto-detect
    pub translate_source: Option<String>,

    /// Subtitle timeline for the video
    pub timeline: SubtitleTimeline,
    /// Synthesized clips, id-keyed, video-scoped
    pub cache: SegmentCache,
    /// Clips awaiting playback, sorted by id
    pub queue: PlaybackQueue,
    /// Prefetch progress through the timeline
    pub cursor: BufferCursor,

    /// True while no clip is available for the playhead and a batch is
    /// pending
    pub is_buffering: bool,
    /// Last observed video clock position (seconds)
    pub last_position: f64,
    /// Mirrored video transport state
    pub video_state: PlaybackState,

    /// Dub speech channel gain (0.0-1.0)
    pub dub_volume: f32,
    /// Attenuated source-video gain (0.0-1.0)
    pub original_volume: f32,
}

impl DubSession {
    pub fn new(video_id: String, generation: u64) -> Self {
        Self {
            video_id,
            generation,
            voice: String::new(),
            target_language: String::new(),
            translate_source: None,
            timeline: SubtitleTimeline::default(),
            cache: SegmentCache::new(),
            queue: PlaybackQueue::new(),
            cursor: BufferCursor::new(),
            is_buffering: false,
            last_position: 0.0,
            video_state: PlaybackState::Playing,
            dub_volume: 1.0,
            original_volume: 0.3,
        }
    }
}
